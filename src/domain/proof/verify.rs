use log::{debug, warn};
use rayon::prelude::*;

use crate::domain::error::{MerkleError, VerifyError};
use crate::domain::hash::Hash256;
use crate::domain::header::{HeaderExt, HeaderSource, ReferenceRoot};

use super::{MerkleProof, Target};

impl MerkleProof {
    /// Check the proof against the root carried by its own target.
    pub fn verify(&self) -> Result<(), VerifyError> {
        self.verify_against(&self.target)
    }

    /// Check the proof against a root supplied by the verifying party.
    pub fn verify_against<R: ReferenceRoot + ?Sized>(&self, reference: &R) -> Result<(), VerifyError> {
        let expected = reference
            .merkle_root()
            .ok_or(VerifyError::MissingReferenceRoot)?;
        self.check_root(expected, &[])
    }

    /// Like [`verify`](Self::verify), resolving a block-hash target through `headers`.
    pub fn verify_with_headers<H: HeaderSource + ?Sized>(&self, headers: &H) -> Result<(), VerifyError> {
        let Target::BlockHash(block_hash) = &self.target else {
            return self.verify();
        };
        let header = headers
            .header(block_hash)
            .filter(|header| header.block_id() == *block_hash)
            .ok_or(VerifyError::UnknownBlock(*block_hash))?;
        self.verify_against(&header)
    }

    /// Check against `expected`, filling `KnownByRecipient` slots from `known`.
    pub fn verify_with_known(&self, expected: Hash256, known: &[Hash256]) -> Result<(), VerifyError> {
        self.check_root(expected, known)
    }

    fn check_root(&self, expected: Hash256, known: &[Hash256]) -> Result<(), VerifyError> {
        let calculated = self.calculate_root_with_known(known)?;
        if calculated != expected {
            warn!(
                "Merkle proof for index {} does not match root {}",
                self.index, expected
            );
            return Err(VerifyError::RootMismatch {
                expected,
                calculated,
            });
        }
        debug!("Merkle proof for index {} verified", self.index);
        Ok(())
    }
}

/// Verify many proofs against one reference root in parallel.
/// Results are returned in input order.
pub fn verify_batch<R>(proofs: &[MerkleProof], reference: &R) -> Vec<Result<(), VerifyError>>
where
    R: ReferenceRoot + Sync + ?Sized,
{
    proofs
        .par_iter()
        .map(|proof| proof.verify_against(reference))
        .collect()
}

/// Decode a binary proof and verify it against its own target.
pub fn verify_encoded(bytes: &[u8]) -> Result<MerkleProof, MerkleError> {
    let proof = MerkleProof::from_bytes(bytes)?;
    proof.verify()?;
    Ok(proof)
}
