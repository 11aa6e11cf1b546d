//! Binary wire form of a [`MerkleProof`].
//!
//! ```text
//! flags:u8 | index:compact | subject | target | count:compact | (tag:u8 [hash:32])*
//! ```
//!
//! Hashes are written in wire order. The flags byte selects the subject form
//! (bit 0) and the target form (bits 1-2); every other bit is rejected.

use bitcoin::consensus::encode::{self, VarInt};
use bitcoin::consensus::{deserialize_partial, serialize};

use crate::domain::error::DecodeError;
use crate::domain::hash::Hash256;
use crate::domain::header::{header_from_bytes, HeaderExt, HEADER_SIZE};

use super::{MerkleProof, NodeSlot, RawTransaction, Subject, Target};

pub const FLAG_TRANSACTION: u8 = 0x01;
pub const TARGET_MASK: u8 = 0x06;
pub const TARGET_MERKLE_ROOT: u8 = 0x00;
pub const TARGET_HEADER: u8 = 0x02;
pub const TARGET_BLOCK_HASH: u8 = 0x04;
const KNOWN_FLAGS: u8 = FLAG_TRANSACTION | TARGET_MASK;

pub const TAG_VALUE: u8 = 0x00;
pub const TAG_DUPLICATED: u8 = 0x01;
pub const TAG_KNOWN_BY_RECIPIENT: u8 = 0x02;

/// A `u64` index addresses at most 2^64 leaves.
pub const MAX_NODES: u64 = 64;

impl MerkleProof {
    pub fn flags(&self) -> u8 {
        let subject = match self.subject {
            Subject::Id(_) => 0,
            Subject::Transaction(_) => FLAG_TRANSACTION,
        };
        let target = match self.target {
            Target::MerkleRoot(_) => TARGET_MERKLE_ROOT,
            Target::Header(_) => TARGET_HEADER,
            Target::BlockHash(_) => TARGET_BLOCK_HASH,
        };
        subject | target
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 9 + 32 + 80 + 9 + self.nodes.len() * 33);
        out.push(self.flags());
        write_compact_size(&mut out, self.index);

        match &self.subject {
            Subject::Id(id) => out.extend_from_slice(id.as_bytes()),
            Subject::Transaction(tx) => {
                write_compact_size(&mut out, tx.as_bytes().len() as u64);
                out.extend_from_slice(tx.as_bytes());
            }
        }

        match &self.target {
            Target::MerkleRoot(hash) | Target::BlockHash(hash) => {
                out.extend_from_slice(hash.as_bytes())
            }
            Target::Header(header) => out.extend_from_slice(&header.to_bytes()),
        }

        write_compact_size(&mut out, self.nodes.len() as u64);
        for slot in &self.nodes {
            match slot {
                NodeSlot::Value(hash) => {
                    out.push(TAG_VALUE);
                    out.extend_from_slice(hash.as_bytes());
                }
                NodeSlot::Duplicated => out.push(TAG_DUPLICATED),
                NodeSlot::KnownByRecipient => out.push(TAG_KNOWN_BY_RECIPIENT),
            }
        }
        out
    }

    /// Decode a complete buffer; trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(bytes);

        let flags = reader.read_u8("flags")?;
        if flags & !KNOWN_FLAGS != 0 || flags & TARGET_MASK == TARGET_MASK {
            return Err(DecodeError::UnsupportedFlags(flags));
        }

        let index = read_compact_size(&mut reader, "index")?;

        let subject = if flags & FLAG_TRANSACTION != 0 {
            let len = read_compact_size(&mut reader, "transaction length")?;
            let len = reader.check_len(len, "transaction")?;
            let tx = RawTransaction::new(reader.read_exact(len, "transaction")?.to_vec())?;
            Subject::Transaction(tx)
        } else {
            Subject::Id(reader.read_hash("subject")?)
        };

        let target = match flags & TARGET_MASK {
            TARGET_HEADER => {
                Target::Header(header_from_bytes(
                    reader.read_exact(HEADER_SIZE, "header")?,
                )?)
            }
            TARGET_BLOCK_HASH => Target::BlockHash(reader.read_hash("target")?),
            _ => Target::MerkleRoot(reader.read_hash("target")?),
        };

        let count = read_compact_size(&mut reader, "node count")?;
        if count > MAX_NODES {
            return Err(DecodeError::LimitExceeded {
                field: "node count",
                value: count,
                limit: MAX_NODES,
            });
        }
        let mut nodes = Vec::with_capacity(count as usize);
        for position in 0..count as usize {
            let slot = match reader.read_u8("node tag")? {
                TAG_VALUE => NodeSlot::Value(reader.read_hash("node")?),
                TAG_DUPLICATED => NodeSlot::Duplicated,
                TAG_KNOWN_BY_RECIPIENT => NodeSlot::KnownByRecipient,
                tag => return Err(DecodeError::UnknownNodeTag { tag, position }),
            };
            nodes.push(slot);
        }

        if reader.remaining() != 0 {
            return Err(DecodeError::TrailingBytes {
                remaining: reader.remaining(),
            });
        }

        Ok(MerkleProof {
            index,
            subject,
            target,
            nodes,
        })
    }

    /// Binary form as plain (not byte-reversed) hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| DecodeError::invalid_hex("proof", e))?;
        Self::from_bytes(&bytes)
    }
}

/// Bitcoin CompactSize.
pub fn write_compact_size(out: &mut Vec<u8>, value: u64) {
    out.extend(serialize(&VarInt(value)));
}

/// Read a CompactSize, rejecting encodings longer than necessary.
pub fn read_compact_size(
    reader: &mut ByteReader<'_>,
    field: &'static str,
) -> Result<u64, DecodeError> {
    let rest = reader.rest();
    match deserialize_partial::<VarInt>(rest) {
        Ok((VarInt(value), consumed)) => {
            reader.read_exact(consumed, field)?;
            Ok(value)
        }
        Err(encode::Error::NonMinimalVarInt) => {
            Err(DecodeError::NonCanonicalCompactSize { field })
        }
        Err(_) => Err(DecodeError::UnexpectedEof {
            field,
            needed: match rest.first() {
                Some(0xfd) => 3,
                Some(0xfe) => 5,
                Some(0xff) => 9,
                _ => 1,
            },
            remaining: rest.len(),
        }),
    }
}

/// Cursor over a byte slice with field-named errors.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Unread bytes, without consuming them.
    pub fn rest(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }

    pub fn read_exact(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::UnexpectedEof {
                field,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.bytes[start..start + len])
    }

    pub fn read_array<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N, field)?);
        Ok(out)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>(field)?[0])
    }

    pub fn read_hash(&mut self, field: &'static str) -> Result<Hash256, DecodeError> {
        self.read_array::<32>(field).map(Hash256::from_bytes)
    }

    /// Convert a length prefix to `usize`, failing early if the buffer cannot hold it.
    fn check_len(&self, len: u64, field: &'static str) -> Result<usize, DecodeError> {
        match usize::try_from(len) {
            Ok(len) if len <= self.remaining() => Ok(len),
            _ => Err(DecodeError::UnexpectedEof {
                field,
                needed: usize::try_from(len).unwrap_or(usize::MAX),
                remaining: self.remaining(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::header::build_header;

    const FIXTURE_HEX: &str = "000cef65a4611570303539143dabd6aa64dbd0f41ed89074406dc0e7cd251cf1efff69f17b44cfe9c2a23285168fe05084e1254daa5305311ed8cd95b19ea6b0ed7505008e66d81026ddb2dae0bd88082632790fc6921b299ca798088bef5325a607efb9004d104f378654a25e35dbd6a539505a1e3ddbba7f92420414387bb5b12fc1c10f00472581a20a043cee55edee1c65dd6677e09903f22992062d8fd4b8d55de7b06000a5cfcdbdb0d2a33f8d3b37aa55edc06dd9a30855a030b450206c3646dadbd8c000f2d6c0b9a7e5383b2dfc0657eeb2f9d0d3e7d99f3191763f948a9d41b3621e39";

    fn sample(subject: Subject, target: Target, nodes: Vec<NodeSlot>) -> MerkleProof {
        MerkleProof::new(300, subject, target, nodes)
    }

    #[test]
    fn test_fixture_round_trip() {
        let proof = MerkleProof::from_hex(FIXTURE_HEX).expect("Fixture must decode");
        assert_eq!(proof.index, 12);
        assert_eq!(proof.flags(), 0);
        assert_eq!(
            proof.subject,
            Subject::Id(
                "ffeff11c25cde7c06d407490d81ef4d0db64aad6ab3d14393530701561a465ef"
                    .parse()
                    .unwrap()
            )
        );
        assert_eq!(
            proof.target,
            Target::MerkleRoot(
                "75edb0a69eb195cdd81e310553aa4d25e18450e08f168532a2c2e9cf447bf169"
                    .parse()
                    .unwrap()
            )
        );
        assert_eq!(proof.nodes.len(), 5);
        assert_eq!(proof.to_hex(), FIXTURE_HEX, "Re-encoding must reproduce the fixture");
    }

    #[test]
    fn test_every_truncation_is_rejected() {
        let bytes = hex::decode(FIXTURE_HEX).unwrap();
        for len in 0..bytes.len() {
            let result = MerkleProof::from_bytes(&bytes[..len]);
            assert!(
                matches!(result, Err(DecodeError::UnexpectedEof { .. })),
                "Truncation to {len} bytes must be an EOF error, got {result:?}"
            );
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = hex::decode(FIXTURE_HEX).unwrap();
        bytes.push(0);
        assert_eq!(
            MerkleProof::from_bytes(&bytes),
            Err(DecodeError::TrailingBytes { remaining: 1 })
        );
    }

    #[test]
    fn test_unknown_node_tag() {
        let mut bytes = hex::decode(FIXTURE_HEX).unwrap();
        // flags, index, subject, target, count: the first node tag follows
        bytes[1 + 1 + 32 + 32 + 1] = 0x07;
        assert_eq!(
            MerkleProof::from_bytes(&bytes),
            Err(DecodeError::UnknownNodeTag {
                tag: 0x07,
                position: 0
            })
        );
    }

    #[test]
    fn test_unsupported_flags() {
        let mut bytes = hex::decode(FIXTURE_HEX).unwrap();
        for flags in [0x06, 0x08, 0x10, 0x80] {
            bytes[0] = flags;
            assert_eq!(
                MerkleProof::from_bytes(&bytes),
                Err(DecodeError::UnsupportedFlags(flags)),
                "Flags 0x{flags:02x} must be rejected"
            );
        }
    }

    #[test]
    fn test_node_slots_round_trip() {
        let hash = Hash256::from_bytes([0x11; 32]);
        let proof = sample(
            Subject::Id(hash),
            Target::BlockHash(hash),
            vec![
                NodeSlot::Duplicated,
                NodeSlot::Value(hash),
                NodeSlot::KnownByRecipient,
            ],
        );
        let bytes = proof.to_bytes();
        assert_eq!(bytes[0], TARGET_BLOCK_HASH);
        // 1 flag + 3 index + 32 + 32 + 1 count + (1) + (33) + (1)
        assert_eq!(bytes.len(), 1 + 3 + 32 + 32 + 1 + 1 + 33 + 1);
        assert_eq!(MerkleProof::from_bytes(&bytes), Ok(proof));
    }

    #[test]
    fn test_transaction_and_header_forms() {
        let header = build_header(
            2,
            Hash256::from_bytes([1; 32]),
            Hash256::from_bytes([2; 32]),
            1_600_000_000,
            0x1d00ffff,
            42,
        );
        let subject = Subject::transaction(vec![0x5a; 250]).unwrap();
        let proof = sample(subject, Target::Header(header), vec![]);
        let bytes = proof.to_bytes();
        assert_eq!(bytes[0], FLAG_TRANSACTION | TARGET_HEADER);
        assert_eq!(bytes.len(), 1 + 3 + 1 + 250 + 80 + 1);
        assert_eq!(MerkleProof::from_bytes(&bytes), Ok(proof));
    }

    #[test]
    fn test_ambiguous_transaction_length() {
        for len in [0usize, 32] {
            // flags, index, transaction length, payload, target, node count
            let mut bytes = vec![FLAG_TRANSACTION, 0x00, len as u8];
            bytes.extend(vec![0u8; len]);
            bytes.extend_from_slice(&[0u8; 32]);
            bytes.push(0);
            assert_eq!(
                MerkleProof::from_bytes(&bytes),
                Err(DecodeError::AmbiguousTransaction(len))
            );
        }
    }

    #[test]
    fn test_node_count_limit() {
        let mut bytes = vec![0x00, 0x00];
        bytes.extend_from_slice(&[0u8; 64]);
        bytes.push(65);
        assert!(matches!(
            MerkleProof::from_bytes(&bytes),
            Err(DecodeError::LimitExceeded { value: 65, .. })
        ));
    }

    #[test]
    fn test_compact_size_boundaries() {
        for (value, len) in [
            (0u64, 1),
            (252, 1),
            (253, 3),
            (0xffff, 3),
            (0x1_0000, 5),
            (0xffff_ffff, 5),
            (0x1_0000_0000, 9),
            (u64::MAX, 9),
        ] {
            let mut out = Vec::new();
            write_compact_size(&mut out, value);
            assert_eq!(out.len(), len, "Encoded length of {value}");
            let mut reader = ByteReader::new(&out);
            assert_eq!(read_compact_size(&mut reader, "value"), Ok(value));
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn test_compact_size_must_be_minimal() {
        for bytes in [
            &[0xfd, 0x0c, 0x00][..],
            &[0xfe, 0xff, 0xff, 0x00, 0x00][..],
            &[0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00][..],
        ] {
            let mut reader = ByteReader::new(bytes);
            assert_eq!(
                read_compact_size(&mut reader, "index"),
                Err(DecodeError::NonCanonicalCompactSize { field: "index" }),
                "{} must be rejected",
                hex::encode(bytes)
            );
        }
    }

    #[test]
    fn test_compact_size_truncated() {
        let mut reader = ByteReader::new(&[0xfe, 0x00, 0x00]);
        assert_eq!(
            read_compact_size(&mut reader, "index"),
            Err(DecodeError::UnexpectedEof {
                field: "index",
                needed: 5,
                remaining: 3
            })
        );
        assert_eq!(reader.remaining(), 3, "A failed read must not consume input");
    }

    #[test]
    fn test_header_target_decodes_through_consensus_encoding() {
        let genesis = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";
        let mut bytes = vec![TARGET_HEADER, 0x00];
        bytes.extend_from_slice(&[0x33; 32]);
        bytes.extend(hex::decode(genesis).unwrap());
        bytes.push(0);
        let proof = MerkleProof::from_bytes(&bytes).unwrap();
        let Target::Header(header) = proof.target else {
            panic!("Flags 0x02 must decode a header target");
        };
        assert_eq!(
            header.block_id().to_hex(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert_eq!(proof.to_bytes(), bytes);
    }
}
