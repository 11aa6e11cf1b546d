use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::{DecodeError, ProofError};
use super::hash::{sha256::Sha256d, Hash256, HashMethod};
use super::header::{BlockHeader, HeaderExt, ReferenceRoot};

pub mod binary;
pub mod json;
pub mod root;
pub mod verify;

use self::json::ProofJson;
use self::root::RootCalculator;

/// One level of a proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeSlot {
    /// Explicit sibling hash.
    Value(Hash256),
    /// The branch was the last node of an odd level and is paired with itself.
    Duplicated,
    /// The recipient already holds this sibling; it is supplied at verification time.
    KnownByRecipient,
}

/// The leaf being proven.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Subject {
    /// Transaction id, the leaf hash itself.
    Id(Hash256),
    /// Full transaction pre-image; its leaf hash is computed on demand.
    Transaction(RawTransaction),
}

impl Subject {
    /// A raw transaction subject. Empty and 32-byte payloads are rejected,
    /// their text form would read back as a transaction id.
    pub fn transaction(bytes: Vec<u8>) -> Result<Self, DecodeError> {
        RawTransaction::new(bytes).map(Subject::Transaction)
    }

    pub fn leaf_hash<M: HashMethod>(&self) -> Hash256 {
        match self {
            Subject::Id(id) => *id,
            Subject::Transaction(tx) => M::hash_leaf(tx.as_bytes()),
        }
    }
}

/// Serialized transaction whose length cannot be mistaken for an id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RawTransaction(Vec<u8>);

impl RawTransaction {
    pub fn new(bytes: Vec<u8>) -> Result<Self, DecodeError> {
        match bytes.len() {
            0 | Hash256::LEN => Err(DecodeError::AmbiguousTransaction(bytes.len())),
            _ => Ok(Self(bytes)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// What the proof claims to lead to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    MerkleRoot(Hash256),
    Header(BlockHeader),
    /// A block hash; the root is only reachable through a header lookup.
    BlockHash(Hash256),
}

impl ReferenceRoot for Target {
    fn merkle_root(&self) -> Option<Hash256> {
        match self {
            Target::MerkleRoot(root) => Some(*root),
            Target::Header(header) => Some(header.root_hash()),
            Target::BlockHash(_) => None,
        }
    }
}

/// An inclusion proof for a single leaf.
///
/// `nodes[0]` is the leaf's immediate sibling and the last entry is the
/// sibling one level below the root, so `nodes.len()` is the tree height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProofJson", into = "ProofJson")]
pub struct MerkleProof {
    pub index: u64,
    pub subject: Subject,
    pub target: Target,
    pub nodes: Vec<NodeSlot>,
}

impl MerkleProof {
    pub fn new(index: u64, subject: Subject, target: Target, nodes: Vec<NodeSlot>) -> Self {
        Self {
            index,
            subject,
            target,
            nodes,
        }
    }

    /// Replay the node list from the subject up to the root.
    pub fn calculate_root(&self) -> Result<Hash256, ProofError> {
        RootCalculator::<Sha256d>::calculate(self)
    }

    /// Like [`calculate_root`](Self::calculate_root), taking one value per
    /// `KnownByRecipient` slot in path order.
    pub fn calculate_root_with_known(&self, known: &[Hash256]) -> Result<Hash256, ProofError> {
        RootCalculator::<Sha256d>::calculate_with_known(self, known)
    }

    /// Replace every explicit sibling the recipient already holds with
    /// `KnownByRecipient`, shrinking the encoded proof.
    pub fn elide_known(&self, held: &HashSet<Hash256>) -> MerkleProof {
        let nodes = self
            .nodes
            .iter()
            .map(|slot| match slot {
                NodeSlot::Value(hash) if held.contains(hash) => NodeSlot::KnownByRecipient,
                other => *other,
            })
            .collect();
        MerkleProof {
            nodes,
            ..self.clone()
        }
    }

    /// Explicit sibling values, skipping slots that carry none.
    pub fn proof_hashes(&self) -> Vec<Hash256> {
        self.nodes
            .iter()
            .filter_map(|slot| match slot {
                NodeSlot::Value(hash) => Some(*hash),
                NodeSlot::Duplicated | NodeSlot::KnownByRecipient => None,
            })
            .collect()
    }
}
