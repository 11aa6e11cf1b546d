use super::{Hash256, HashMethod};
use sha2::{digest::FixedOutput, Digest, Sha256};

/// Bitcoin's double SHA-256, used for transaction ids, block hashes and
/// every internal merkle node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sha256d;

impl Sha256d {
    pub fn digest(parts: &[&[u8]]) -> Hash256 {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        let once = hasher.finalize_fixed();

        let mut hasher = Sha256::new();
        hasher.update(once);
        Hash256::from_bytes(hasher.finalize_fixed().into())
    }
}

impl HashMethod for Sha256d {
    fn hash_leaf(data: &[u8]) -> Hash256 {
        Self::digest(&[data])
    }

    fn hash_nodes(left: &Hash256, right: &Hash256) -> Hash256 {
        Self::digest(&[left.as_bytes(), right.as_bytes()])
    }
}
