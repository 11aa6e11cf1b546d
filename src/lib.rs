#![deny(clippy::all)]

//! Merkle inclusion proofs for Bitcoin-style transaction trees.
//!
//! A [`TreeBuilder`] computes a tree root and, in the same pass, an inclusion
//! [`MerkleProof`] for every leaf the caller registered interest in. Proofs
//! travel in a fixed binary form or an equivalent JSON form and are checked by
//! replaying their sibling path against a trusted reference root.

pub mod domain;
pub mod interfaces;

pub use domain::error::{BuildError, DecodeError, MerkleError, ProofError, VerifyError};
pub use domain::hash::{sha256::Sha256d, Hash256, HashMethod};
pub use domain::header::{
    build_header, header_from_bytes, header_from_hex, BlockHeader, HeaderExt, HeaderSource,
    ReferenceRoot,
};
pub use domain::proof::{
    root::RootCalculator, verify::verify_batch, verify::verify_encoded, MerkleProof, NodeSlot,
    RawTransaction, Subject, Target,
};
pub use domain::tree::{merkle_root, TreeBuilder, TreeOptions, TreeOutput};
