//! Block types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{hex::Hex, serde_as};

use super::discriminated::{self, Discriminated, Probe, VariantDecoder, variant};
use super::{BalanceUpdate, BigInt, NodeErrors, Operation};

// ============================================================================
// Headers
// ============================================================================

/// Block summary streamed by the heads monitor.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockInfo {
    pub hash: String,
    pub level: i32,
    pub proto: u8,
    pub predecessor: String,
    pub timestamp: DateTime<Utc>,
    pub validation_pass: u8,
    pub operations_hash: String,
    #[serde_as(as = "Vec<Hex>")]
    pub fitness: Vec<Vec<u8>>,
    pub context: String,
    pub protocol_data: String,
}

/// Shell and protocol header fields of a block.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBlockHeader {
    pub level: i32,
    pub proto: u8,
    pub predecessor: String,
    pub timestamp: DateTime<Utc>,
    pub validation_pass: u8,
    pub operations_hash: String,
    #[serde_as(as = "Vec<Hex>")]
    pub fitness: Vec<Vec<u8>>,
    pub context: String,
    pub priority: i32,
    #[serde_as(as = "Hex")]
    pub proof_of_work_nonce: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_nonce_hash: Option<String>,
    pub signature: String,
}

// ============================================================================
// Test chain status
// ============================================================================

/// Fields shared by every test chain status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericTestChainStatus {
    pub status: String,
}

impl Probe for GenericTestChainStatus {
    fn tag(&self) -> &str {
        &self.status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotRunningTestChainStatus {
    #[serde(flatten)]
    pub generic: GenericTestChainStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkingTestChainStatus {
    #[serde(flatten)]
    pub generic: GenericTestChainStatus,
    pub protocol: String,
    pub expiration: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningTestChainStatus {
    #[serde(flatten)]
    pub generic: GenericTestChainStatus,
    pub chain_id: String,
    pub genesis: String,
    pub protocol: String,
    pub expiration: DateTime<Utc>,
}

/// State of the test chain, selected by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TestChainStatus {
    NotRunning(NotRunningTestChainStatus),
    Forking(ForkingTestChainStatus),
    Running(RunningTestChainStatus),
    /// A status this crate does not know about.
    Other(GenericTestChainStatus),
}

impl TestChainStatus {
    pub fn generic(&self) -> &GenericTestChainStatus {
        match self {
            TestChainStatus::NotRunning(s) => &s.generic,
            TestChainStatus::Forking(s) => &s.generic,
            TestChainStatus::Running(s) => &s.generic,
            TestChainStatus::Other(g) => g,
        }
    }

    /// The raw `status` value.
    pub fn status(&self) -> &str {
        &self.generic().status
    }
}

impl Discriminated for TestChainStatus {
    type Generic = GenericTestChainStatus;

    const VARIANTS: &'static [(&'static str, VariantDecoder<Self>)] = &[
        ("not_running", |v| variant(v, TestChainStatus::NotRunning)),
        ("forking", |v| variant(v, TestChainStatus::Forking)),
        ("running", |v| variant(v, TestChainStatus::Running)),
    ];

    fn fallback(generic: GenericTestChainStatus) -> Self {
        TestChainStatus::Other(generic)
    }
}

impl<'de> Deserialize<'de> for TestChainStatus {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        discriminated::deserialize(d)
    }
}

// ============================================================================
// Metadata
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxOperationListLength {
    pub max_size: u32,
    pub max_op: u32,
}

/// Position of a block within cycles and voting periods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockHeaderMetadataLevel {
    pub level: i32,
    pub level_position: i32,
    pub cycle: i32,
    pub cycle_position: i32,
    pub voting_period: i32,
    pub voting_period_position: i32,
    pub expected_commitment: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockHeaderMetadata {
    pub protocol: String,
    pub next_protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_chain_status: Option<TestChainStatus>,
    pub max_operations_ttl: i32,
    pub max_operation_data_length: i32,
    pub max_block_header_length: i32,
    pub max_operation_list_length: Vec<MaxOperationListLength>,
    pub baker: String,
    pub level: BlockHeaderMetadataLevel,
    pub voting_period_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_gas: Option<BigInt>,
    pub deactivated: Vec<String>,
    #[serde(deserialize_with = "discriminated::deserialize_list")]
    pub balance_updates: Vec<BalanceUpdate>,
}

// ============================================================================
// Blocks
// ============================================================================

/// A full block as returned by `/chains/{chain}/blocks/{block}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Block {
    pub protocol: String,
    pub chain_id: String,
    pub hash: String,
    pub header: RawBlockHeader,
    pub metadata: BlockHeaderMetadata,
    /// Operations grouped by validation pass.
    pub operations: Vec<Vec<Operation>>,
}

/// A block the node refused, with the reasons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvalidBlock {
    pub block: String,
    pub level: i32,
    pub error: NodeErrors,
}
