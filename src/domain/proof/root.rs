use std::marker::PhantomData;

use crate::domain::error::ProofError;
use crate::domain::hash::{sha256::Sha256d, Hash256, HashMethod};

use super::{MerkleProof, NodeSlot};

/// Rebuilds a root from a proof's sibling path.
///
/// At level `l` the branch is a left child when bit `l` of the index is clear:
/// `parent = H(current ++ sibling)`, and `H(sibling ++ current)` otherwise.
pub struct RootCalculator<Method: HashMethod = Sha256d> {
    method: PhantomData<Method>,
}

impl<Method: HashMethod> RootCalculator<Method> {
    pub fn calculate(proof: &MerkleProof) -> Result<Hash256, ProofError> {
        Self::calculate_with_known(proof, &[])
    }

    pub fn calculate_with_known(
        proof: &MerkleProof,
        known: &[Hash256],
    ) -> Result<Hash256, ProofError> {
        let height = proof.nodes.len();
        if height < u64::BITS as usize && proof.index >> height != 0 {
            return Err(ProofError::IndexOutOfRange {
                index: proof.index,
                height,
            });
        }

        let supplied = known.len();
        let mut known = known.iter();
        let mut used = 0;
        let mut current = proof.subject.leaf_hash::<Method>();

        for (level, slot) in proof.nodes.iter().enumerate() {
            let is_right = level < u64::BITS as usize && (proof.index >> level) & 1 == 1;
            let sibling = match slot {
                NodeSlot::Value(hash) => *hash,
                NodeSlot::Duplicated if is_right => {
                    return Err(ProofError::DuplicateOnRight { level })
                }
                NodeSlot::Duplicated => current,
                NodeSlot::KnownByRecipient => {
                    used += 1;
                    *known.next().ok_or(ProofError::UnresolvedNode { level })?
                }
            };
            current = if is_right {
                Method::hash_nodes(&sibling, &current)
            } else {
                Method::hash_nodes(&current, &sibling)
            };
        }

        if used != supplied {
            return Err(ProofError::UnusedKnownValues { supplied, used });
        }
        Ok(current)
    }
}
