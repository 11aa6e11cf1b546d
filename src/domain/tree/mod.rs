use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;

use super::error::BuildError;
use super::hash::{sha256::Sha256d, Hash256, HashMethod};
use super::proof::{root::RootCalculator, MerkleProof, NodeSlot, Subject, Target};

/// Tuning for tree construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeOptions {
    /// Levels with at least this many nodes are hashed on the rayon pool.
    pub parallel_threshold: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            parallel_threshold: 4096,
        }
    }
}

/// Root and proofs produced by [`TreeBuilder::finalize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeOutput {
    pub root: Hash256,
    /// One proof per registered leaf, in registration order.
    pub proofs: Vec<MerkleProof>,
}

struct Interest {
    leaf: Hash256,
    position: Option<usize>,
}

/// Single-use builder: computes a tree root and extracts inclusion proofs for
/// the leaves registered with [`register_interest`](Self::register_interest).
///
/// Leaves are matched by value when fed; the first equal leaf wins. Odd levels
/// pair their last node with itself.
pub struct TreeBuilder<Method: HashMethod = Sha256d> {
    options: TreeOptions,
    leaves: Vec<Hash256>,
    interests: Vec<Interest>,
    /// Registered leaves not yet fed, mapped to their slot in `interests`.
    pending: HashMap<Hash256, usize>,
    registered: HashSet<Hash256>,
    finalized: bool,
    method: PhantomData<Method>,
}

impl TreeBuilder<Sha256d> {
    pub fn new() -> Self {
        Self::with_options(TreeOptions::default())
    }
}

impl Default for TreeBuilder<Sha256d> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Method: HashMethod> TreeBuilder<Method> {
    pub fn with_options(options: TreeOptions) -> Self {
        Self {
            options,
            leaves: Vec::new(),
            interests: Vec::new(),
            pending: HashMap::new(),
            registered: HashSet::new(),
            finalized: false,
            method: PhantomData,
        }
    }

    /// Ask for a proof of the next fed leaf equal to `leaf`.
    pub fn register_interest(&mut self, leaf: Hash256) -> Result<(), BuildError> {
        self.ensure_open()?;
        if !self.registered.insert(leaf) {
            return Err(BuildError::DuplicateInterest(leaf));
        }
        self.pending.insert(leaf, self.interests.len());
        self.interests.push(Interest {
            leaf,
            position: None,
        });
        Ok(())
    }

    /// Append the next leaf.
    pub fn feed(&mut self, leaf: Hash256) -> Result<(), BuildError> {
        self.ensure_open()?;
        if let Some(slot) = self.pending.remove(&leaf) {
            self.interests[slot].position = Some(self.leaves.len());
        }
        self.leaves.push(leaf);
        Ok(())
    }

    pub fn feed_all<I>(&mut self, leaves: I) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = Hash256>,
    {
        leaves.into_iter().try_for_each(|leaf| self.feed(leaf))
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Build the tree and hand out the proofs. The builder cannot be used afterwards.
    pub fn finalize(&mut self) -> Result<TreeOutput, BuildError> {
        self.ensure_open()?;
        self.finalized = true;

        if self.leaves.is_empty() {
            return Err(BuildError::EmptyTree);
        }
        if !self.pending.is_empty() {
            let missing = self
                .interests
                .iter()
                .filter(|interest| interest.position.is_none())
                .map(|interest| interest.leaf)
                .collect();
            return Err(BuildError::UnresolvedInterests(missing));
        }

        let total_start = Instant::now();
        let leaf_count = self.leaves.len();

        // (current position, path so far) per interest
        let mut paths: Vec<(usize, Vec<NodeSlot>)> = self
            .interests
            .iter()
            .map(|interest| (interest.position.unwrap_or_default(), Vec::new()))
            .collect();

        let mut level = std::mem::take(&mut self.leaves);
        let mut height = 0;
        while level.len() > 1 {
            for (position, nodes) in paths.iter_mut() {
                let sibling = if *position % 2 == 0 {
                    level
                        .get(*position + 1)
                        .map_or(NodeSlot::Duplicated, |hash| NodeSlot::Value(*hash))
                } else {
                    NodeSlot::Value(level[*position - 1])
                };
                nodes.push(sibling);
                *position /= 2;
            }

            let level_start = Instant::now();
            level = self.next_level(&level);
            height += 1;
            debug!(
                "Level {} ({} nodes) took {:?}",
                height,
                level.len(),
                level_start.elapsed()
            );
        }
        let root = level[0];

        let interests = std::mem::take(&mut self.interests);
        self.registered.clear();
        let proofs: Vec<MerkleProof> = interests
            .into_iter()
            .zip(paths)
            .map(|(interest, (_, nodes))| {
                MerkleProof::new(
                    interest.position.unwrap_or_default() as u64,
                    Subject::Id(interest.leaf),
                    Target::MerkleRoot(root),
                    nodes,
                )
            })
            .collect();

        debug_assert!(proofs
            .iter()
            .all(|proof| RootCalculator::<Method>::calculate(proof) == Ok(root)));

        info!(
            "Merkle tree of {} leaves (height {}) with {} proofs built in {:?}",
            leaf_count,
            height,
            proofs.len(),
            total_start.elapsed()
        );

        Ok(TreeOutput { root, proofs })
    }

    fn next_level(&self, level: &[Hash256]) -> Vec<Hash256> {
        if level.len() >= self.options.parallel_threshold {
            level.par_chunks(2).map(Self::hash_pair).collect()
        } else {
            level.chunks(2).map(Self::hash_pair).collect()
        }
    }

    fn hash_pair(pair: &[Hash256]) -> Hash256 {
        let left = &pair[0];
        let right = pair.get(1).unwrap_or(left);
        Method::hash_nodes(left, right)
    }

    fn ensure_open(&self) -> Result<(), BuildError> {
        if self.finalized {
            Err(BuildError::AlreadyFinalized)
        } else {
            Ok(())
        }
    }
}

/// Root of the tree over `leaves`, without extracting any proof.
pub fn merkle_root(leaves: &[Hash256]) -> Result<Hash256, BuildError> {
    let mut builder = TreeBuilder::new();
    builder.feed_all(leaves.iter().copied())?;
    builder.finalize().map(|output| output.root)
}
