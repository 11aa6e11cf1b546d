use serde::{Deserialize, Serialize};

use crate::domain::error::DecodeError;
use crate::domain::hash::Hash256;
use crate::domain::header::{header_from_hex, HeaderExt};

use super::binary::MAX_NODES;
use super::{MerkleProof, NodeSlot, Subject, Target};

pub const DUPLICATED_NODE: &str = "*";
pub const KNOWN_NODE: &str = "~";

const TARGET_TYPE_HEADER: &str = "header";
const TARGET_TYPE_HASH: &str = "hash";
const PROOF_TYPE_BRANCH: &str = "branch";

/// JSON shape of a proof. Field order here is the emitted order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProofJson {
    pub index: u64,
    pub tx_or_id: String,
    pub target: String,
    pub nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<bool>,
}

impl From<MerkleProof> for ProofJson {
    fn from(proof: MerkleProof) -> Self {
        ProofJson::from(&proof)
    }
}

impl From<&MerkleProof> for ProofJson {
    fn from(proof: &MerkleProof) -> Self {
        let tx_or_id = match &proof.subject {
            Subject::Id(id) => id.to_hex(),
            Subject::Transaction(tx) => hex::encode(tx.as_bytes()),
        };
        let (target, target_type) = match &proof.target {
            Target::MerkleRoot(root) => (root.to_hex(), None),
            Target::Header(header) => (header.to_hex(), Some(TARGET_TYPE_HEADER.to_string())),
            Target::BlockHash(hash) => (hash.to_hex(), Some(TARGET_TYPE_HASH.to_string())),
        };
        let nodes = proof
            .nodes
            .iter()
            .map(|slot| match slot {
                NodeSlot::Value(hash) => hash.to_hex(),
                NodeSlot::Duplicated => DUPLICATED_NODE.to_string(),
                NodeSlot::KnownByRecipient => KNOWN_NODE.to_string(),
            })
            .collect();

        ProofJson {
            index: proof.index,
            tx_or_id,
            target,
            nodes,
            target_type,
            proof_type: None,
            composite: None,
        }
    }
}

impl TryFrom<ProofJson> for MerkleProof {
    type Error = DecodeError;

    fn try_from(json: ProofJson) -> Result<Self, Self::Error> {
        if let Some(proof_type) = json.proof_type {
            if proof_type != PROOF_TYPE_BRANCH {
                return Err(DecodeError::UnsupportedProofType(proof_type));
            }
        }
        if json.composite == Some(true) {
            return Err(DecodeError::CompositeUnsupported);
        }

        let subject = if json.tx_or_id.len() == Hash256::LEN * 2 {
            Subject::Id(Hash256::parse_field(&json.tx_or_id, "txOrId")?)
        } else {
            let tx = hex::decode(&json.tx_or_id)
                .map_err(|e| DecodeError::invalid_hex("txOrId", e))?;
            Subject::transaction(tx)?
        };

        let target = match json.target_type.as_deref() {
            None => Target::MerkleRoot(Hash256::parse_field(&json.target, "target")?),
            Some(TARGET_TYPE_HASH) => {
                Target::BlockHash(Hash256::parse_field(&json.target, "target")?)
            }
            Some(TARGET_TYPE_HEADER) => Target::Header(header_from_hex(&json.target)?),
            Some(other) => return Err(DecodeError::UnknownTargetType(other.to_string())),
        };

        if json.nodes.len() as u64 > MAX_NODES {
            return Err(DecodeError::LimitExceeded {
                field: "node count",
                value: json.nodes.len() as u64,
                limit: MAX_NODES,
            });
        }
        let nodes = json
            .nodes
            .iter()
            .enumerate()
            .map(|(position, node)| match node.as_str() {
                DUPLICATED_NODE => Ok(NodeSlot::Duplicated),
                KNOWN_NODE => Ok(NodeSlot::KnownByRecipient),
                value if value.len() == Hash256::LEN * 2 => {
                    Hash256::parse_field(value, "node").map(NodeSlot::Value)
                }
                other => Err(DecodeError::UnknownNode {
                    value: other.to_string(),
                    position,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MerkleProof {
            index: json.index,
            subject,
            target,
            nodes,
        })
    }
}

impl MerkleProof {
    /// Compact JSON, fields in canonical order.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ProofJson::from(self))
    }

    /// Parse JSON, keeping the precise error for invalid field values.
    pub fn from_json(s: &str) -> Result<Self, DecodeError> {
        let json: ProofJson = serde_json::from_str(s)?;
        MerkleProof::try_from(json)
    }
}
