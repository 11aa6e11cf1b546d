use std::collections::HashMap;

use bitcoin::block::Version;
use bitcoin::consensus::{deserialize, serialize};
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, CompactTarget, TxMerkleNode};

use super::error::DecodeError;
use super::hash::Hash256;

/// An 80-byte Bitcoin block header in consensus encoding.
pub use bitcoin::block::Header as BlockHeader;

pub const HEADER_SIZE: usize = 80;

/// Anything a proof can be checked against: a bare root or a structure that
/// commits to one.
pub trait ReferenceRoot {
    fn merkle_root(&self) -> Option<Hash256>;
}

impl ReferenceRoot for Hash256 {
    fn merkle_root(&self) -> Option<Hash256> {
        Some(*self)
    }
}

impl ReferenceRoot for BlockHeader {
    fn merkle_root(&self) -> Option<Hash256> {
        Some(self.root_hash())
    }
}

/// Looks up block headers by block hash, e.g. a local header chain.
pub trait HeaderSource {
    fn header(&self, block_hash: &Hash256) -> Option<BlockHeader>;
}

impl HeaderSource for HashMap<Hash256, BlockHeader> {
    fn header(&self, block_hash: &Hash256) -> Option<BlockHeader> {
        self.get(block_hash).copied()
    }
}

/// Header fields in this crate's hash type.
pub trait HeaderExt {
    /// The committed transaction merkle root, wire order.
    fn root_hash(&self) -> Hash256;
    /// The block hash, wire order.
    fn block_id(&self) -> Hash256;
    fn to_bytes(&self) -> Vec<u8>;
    /// Consensus serialization as hex, not byte-reversed.
    fn to_hex(&self) -> String;
}

impl HeaderExt for BlockHeader {
    fn root_hash(&self) -> Hash256 {
        Hash256::from_bytes(self.merkle_root.to_byte_array())
    }

    fn block_id(&self) -> Hash256 {
        Hash256::from_bytes(self.block_hash().to_byte_array())
    }

    fn to_bytes(&self) -> Vec<u8> {
        serialize(self)
    }

    fn to_hex(&self) -> String {
        hex::encode(serialize(self))
    }
}

pub fn build_header(
    version: i32,
    prev_block: Hash256,
    merkle_root: Hash256,
    time: u32,
    bits: u32,
    nonce: u32,
) -> BlockHeader {
    BlockHeader {
        version: Version::from_consensus(version),
        prev_blockhash: BlockHash::from_byte_array(prev_block.to_bytes()),
        merkle_root: TxMerkleNode::from_byte_array(merkle_root.to_bytes()),
        time,
        bits: CompactTarget::from_consensus(bits),
        nonce,
    }
}

pub fn header_from_bytes(bytes: &[u8]) -> Result<BlockHeader, DecodeError> {
    if bytes.len() != HEADER_SIZE {
        return Err(DecodeError::InvalidLength {
            field: "header",
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    deserialize(bytes).map_err(|e| DecodeError::Consensus {
        field: "header",
        reason: e.to_string(),
    })
}

pub fn header_from_hex(s: &str) -> Result<BlockHeader, DecodeError> {
    let bytes = hex::decode(s).map_err(|e| DecodeError::invalid_hex("header", e))?;
    header_from_bytes(&bytes)
}
