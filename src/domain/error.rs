use itertools::Itertools;
use thiserror::Error;

use super::hash::Hash256;

/// Failures while building a tree and extracting proofs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("cannot build a merkle tree without leaves")]
    EmptyTree,
    #[error("interest in leaf {0} is already registered")]
    DuplicateInterest(Hash256),
    #[error("registered leaves were never fed: {}", .0.iter().join(", "))]
    UnresolvedInterests(Vec<Hash256>),
    #[error("tree builder has already been finalized")]
    AlreadyFinalized,
}

/// Failures while decoding the binary or JSON form of a proof.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input reading {field}: need {needed} bytes, {remaining} left")]
    UnexpectedEof {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
    #[error("{remaining} trailing bytes after proof")]
    TrailingBytes { remaining: usize },
    #[error("unsupported flags 0x{0:02x}")]
    UnsupportedFlags(u8),
    #[error("unknown tag 0x{tag:02x} for node {position}")]
    UnknownNodeTag { tag: u8, position: usize },
    #[error("unknown node {value:?} at position {position}")]
    UnknownNode { value: String, position: usize },
    #[error("non-canonical compact size for {field}")]
    NonCanonicalCompactSize { field: &'static str },
    #[error("{field} is {value}, limit is {limit}")]
    LimitExceeded {
        field: &'static str,
        value: u64,
        limit: u64,
    },
    #[error("{field} must be {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },
    #[error("transaction subject of {0} bytes cannot be told apart from a transaction id")]
    AmbiguousTransaction(usize),
    #[error("unknown target type {0:?}")]
    UnknownTargetType(String),
    #[error("unsupported proof type {0:?}")]
    UnsupportedProofType(String),
    #[error("composite proofs are not supported")]
    CompositeUnsupported,
    #[error("malformed json: {0}")]
    Json(String),
    #[error("invalid {field}: {reason}")]
    Consensus { field: &'static str, reason: String },
}

impl DecodeError {
    pub(crate) fn invalid_hex(field: &'static str, err: hex::FromHexError) -> Self {
        DecodeError::InvalidHex {
            field,
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err.to_string())
    }
}

/// A proof whose node list cannot be replayed into a root.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("index {index} does not fit a tree of height {height}")]
    IndexOutOfRange { index: u64, height: usize },
    #[error("node {level} is marked duplicated but the branch is a right child")]
    DuplicateOnRight { level: usize },
    #[error("node {level} is known by the recipient but no value was supplied")]
    UnresolvedNode { level: usize },
    #[error("{supplied} known values supplied but only {used} used")]
    UnusedKnownValues { supplied: usize, used: usize },
}

/// Failures while checking a proof against its reference root.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("proof target does not carry a merkle root")]
    MissingReferenceRoot,
    #[error("no header known for block {0}")]
    UnknownBlock(Hash256),
    #[error("cannot calculate root: {0}")]
    Malformed(#[from] ProofError),
    #[error("root mismatch: expected {expected}, calculated {calculated}")]
    RootMismatch {
        expected: Hash256,
        calculated: Hash256,
    },
}

/// Any failure of the proof engine, grouped by stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("build failed: {0}")]
    Build(#[from] BuildError),
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),
}

impl From<ProofError> for MerkleError {
    fn from(err: ProofError) -> Self {
        MerkleError::Verify(err.into())
    }
}
