//! Operations and balance updates.
//!
//! Operation contents and balance updates are discriminated by `kind`; see
//! [`discriminated`](super::discriminated) for how unknown kinds are handled.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{DisplayFromStr, serde_as};

use super::discriminated::{self, Discriminated, Probe, VariantDecoder, variant};
use super::heterogeneous::{Keyed, keyed_list};
use super::{BigInt, NodeErrors, RawBlockHeader};

// ============================================================================
// Balance updates
// ============================================================================

/// Fields shared by every balance update.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericBalanceUpdate {
    pub kind: String,
    /// Signed amount in mutez.
    #[serde_as(as = "DisplayFromStr")]
    pub change: i64,
}

impl Probe for GenericBalanceUpdate {
    fn tag(&self) -> &str {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractBalanceUpdate {
    #[serde(flatten)]
    pub generic: GenericBalanceUpdate,
    pub contract: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezerBalanceUpdate {
    #[serde(flatten)]
    pub generic: GenericBalanceUpdate,
    pub category: String,
    pub delegate: String,
    pub level: i32,
}

/// A change to a contract or frozen balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BalanceUpdate {
    Contract(ContractBalanceUpdate),
    Freezer(FreezerBalanceUpdate),
    Other(GenericBalanceUpdate),
}

impl BalanceUpdate {
    pub fn generic(&self) -> &GenericBalanceUpdate {
        match self {
            BalanceUpdate::Contract(u) => &u.generic,
            BalanceUpdate::Freezer(u) => &u.generic,
            BalanceUpdate::Other(g) => g,
        }
    }

    pub fn kind(&self) -> &str {
        &self.generic().kind
    }

    pub fn change(&self) -> i64 {
        self.generic().change
    }
}

impl Discriminated for BalanceUpdate {
    type Generic = GenericBalanceUpdate;

    const VARIANTS: &'static [(&'static str, VariantDecoder<Self>)] = &[
        ("contract", |v| variant(v, BalanceUpdate::Contract)),
        ("freezer", |v| variant(v, BalanceUpdate::Freezer)),
    ];

    fn fallback(generic: GenericBalanceUpdate) -> Self {
        BalanceUpdate::Other(generic)
    }
}

impl<'de> Deserialize<'de> for BalanceUpdate {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        discriminated::deserialize(d)
    }
}

// ============================================================================
// Operation metadata
// ============================================================================

/// Metadata carrying only balance updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceUpdatesMetadata {
    #[serde(deserialize_with = "discriminated::deserialize_list")]
    pub balance_updates: Vec<BalanceUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndorsementMetadata {
    #[serde(deserialize_with = "discriminated::deserialize_list")]
    pub balance_updates: Vec<BalanceUpdate>,
    pub delegate: String,
    pub slots: Vec<u16>,
}

/// Result of applying a manager operation.
///
/// Fields other than `status` are only present for the kinds and outcomes
/// that produce them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerOperationResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<Value>,
    #[serde(
        deserialize_with = "discriminated::deserialize_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub balance_updates: Vec<BalanceUpdate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub originated_contracts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_gas: Option<BigInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<BigInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_storage_size_diff: Option<BigInt>,
    #[serde(skip_serializing_if = "NodeErrors::is_empty")]
    pub errors: NodeErrors,
}

impl ManagerOperationResult {
    /// Returns true if the operation was applied.
    pub fn is_applied(&self) -> bool {
        self.status == "applied"
    }
}

/// Metadata of a manager operation (transaction, reveal, origination, delegation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerOperationMetadata {
    #[serde(deserialize_with = "discriminated::deserialize_list")]
    pub balance_updates: Vec<BalanceUpdate>,
    pub operation_result: ManagerOperationResult,
}

// ============================================================================
// Operation elements
// ============================================================================

/// Fields shared by every operation element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericOperationElem {
    pub kind: String,
}

impl Probe for GenericOperationElem {
    fn tag(&self) -> &str {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndorsementOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub level: i32,
    #[serde(default)]
    pub metadata: EndorsementMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub source: String,
    #[serde(default)]
    pub fee: Option<BigInt>,
    #[serde(default)]
    pub counter: Option<BigInt>,
    #[serde(default)]
    pub gas_limit: Option<BigInt>,
    #[serde(default)]
    pub storage_limit: Option<BigInt>,
    pub amount: BigInt,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub metadata: ManagerOperationMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub source: String,
    pub period: i32,
    pub proposal: String,
    pub ballot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalsOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub source: String,
    pub period: i32,
    pub proposals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedNonceRevelationOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub level: i32,
    pub nonce: String,
    #[serde(default)]
    pub metadata: BalanceUpdatesMetadata,
}

/// An endorsement embedded in double endorsement evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlinedEndorsement {
    pub branch: String,
    pub operations: InlinedEndorsementContents,
    pub signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlinedEndorsementContents {
    pub kind: String,
    pub level: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleEndorsementEvidenceOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub op1: InlinedEndorsement,
    pub op2: InlinedEndorsement,
    #[serde(default)]
    pub metadata: BalanceUpdatesMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleBakingEvidenceOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub bh1: RawBlockHeader,
    pub bh2: RawBlockHeader,
    #[serde(default)]
    pub metadata: BalanceUpdatesMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivateAccountOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub pkh: String,
    pub secret: String,
    #[serde(default)]
    pub metadata: BalanceUpdatesMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub source: String,
    #[serde(default)]
    pub fee: Option<BigInt>,
    #[serde(default)]
    pub counter: Option<BigInt>,
    #[serde(default)]
    pub gas_limit: Option<BigInt>,
    #[serde(default)]
    pub storage_limit: Option<BigInt>,
    pub public_key: String,
    #[serde(default)]
    pub metadata: ManagerOperationMetadata,
}

/// Code and initial storage of an originated contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedContracts {
    pub code: Value,
    pub storage: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginationOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub source: String,
    #[serde(default)]
    pub fee: Option<BigInt>,
    #[serde(default)]
    pub counter: Option<BigInt>,
    #[serde(default)]
    pub gas_limit: Option<BigInt>,
    #[serde(default)]
    pub storage_limit: Option<BigInt>,
    #[serde(rename = "managerPubkey", default, skip_serializing_if = "Option::is_none")]
    pub manager_pubkey: Option<String>,
    pub balance: BigInt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spendable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegatable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptedContracts>,
    #[serde(default)]
    pub metadata: ManagerOperationMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationOperationElem {
    #[serde(flatten)]
    pub generic: GenericOperationElem,
    pub source: String,
    #[serde(default)]
    pub fee: Option<BigInt>,
    #[serde(default)]
    pub counter: Option<BigInt>,
    #[serde(default)]
    pub gas_limit: Option<BigInt>,
    #[serde(default)]
    pub storage_limit: Option<BigInt>,
    /// New delegate; absent when the delegation is withdrawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate: Option<String>,
    #[serde(default)]
    pub metadata: ManagerOperationMetadata,
}

/// One element of an operation's `contents`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationElem {
    Endorsement(EndorsementOperationElem),
    Transaction(TransactionOperationElem),
    Ballot(BallotOperationElem),
    Proposals(ProposalsOperationElem),
    SeedNonceRevelation(SeedNonceRevelationOperationElem),
    DoubleEndorsementEvidence(DoubleEndorsementEvidenceOperationElem),
    DoubleBakingEvidence(DoubleBakingEvidenceOperationElem),
    ActivateAccount(ActivateAccountOperationElem),
    Reveal(RevealOperationElem),
    Origination(OriginationOperationElem),
    Delegation(DelegationOperationElem),
    /// A kind this crate does not know about.
    Other(GenericOperationElem),
}

impl OperationElem {
    pub fn generic(&self) -> &GenericOperationElem {
        match self {
            OperationElem::Endorsement(e) => &e.generic,
            OperationElem::Transaction(e) => &e.generic,
            OperationElem::Ballot(e) => &e.generic,
            OperationElem::Proposals(e) => &e.generic,
            OperationElem::SeedNonceRevelation(e) => &e.generic,
            OperationElem::DoubleEndorsementEvidence(e) => &e.generic,
            OperationElem::DoubleBakingEvidence(e) => &e.generic,
            OperationElem::ActivateAccount(e) => &e.generic,
            OperationElem::Reveal(e) => &e.generic,
            OperationElem::Origination(e) => &e.generic,
            OperationElem::Delegation(e) => &e.generic,
            OperationElem::Other(g) => g,
        }
    }

    pub fn kind(&self) -> &str {
        &self.generic().kind
    }

    /// Balance updates from the element metadata.
    ///
    /// `None` for kinds whose metadata carries no balance updates.
    pub fn balance_updates(&self) -> Option<&[BalanceUpdate]> {
        match self {
            OperationElem::Endorsement(e) => Some(&e.metadata.balance_updates),
            OperationElem::Transaction(e) => Some(&e.metadata.balance_updates),
            OperationElem::SeedNonceRevelation(e) => Some(&e.metadata.balance_updates),
            OperationElem::DoubleEndorsementEvidence(e) => Some(&e.metadata.balance_updates),
            OperationElem::DoubleBakingEvidence(e) => Some(&e.metadata.balance_updates),
            OperationElem::ActivateAccount(e) => Some(&e.metadata.balance_updates),
            OperationElem::Reveal(e) => Some(&e.metadata.balance_updates),
            OperationElem::Origination(e) => Some(&e.metadata.balance_updates),
            OperationElem::Delegation(e) => Some(&e.metadata.balance_updates),
            OperationElem::Ballot(_) | OperationElem::Proposals(_) | OperationElem::Other(_) => {
                None
            }
        }
    }

    /// Fee paid by a manager operation; an absent fee reads as zero.
    ///
    /// `None` for kinds that carry no fee.
    pub fn fee(&self) -> Option<BigInt> {
        let fee = match self {
            OperationElem::Transaction(e) => e.fee,
            OperationElem::Reveal(e) => e.fee,
            OperationElem::Origination(e) => e.fee,
            OperationElem::Delegation(e) => e.fee,
            _ => return None,
        };
        Some(fee.unwrap_or(BigInt::ZERO))
    }
}

impl Discriminated for OperationElem {
    type Generic = GenericOperationElem;

    const VARIANTS: &'static [(&'static str, VariantDecoder<Self>)] = &[
        ("endorsement", |v| variant(v, OperationElem::Endorsement)),
        ("transaction", |v| variant(v, OperationElem::Transaction)),
        ("ballot", |v| variant(v, OperationElem::Ballot)),
        ("proposals", |v| variant(v, OperationElem::Proposals)),
        ("seed_nonce_revelation", |v| {
            variant(v, OperationElem::SeedNonceRevelation)
        }),
        ("double_endorsement_evidence", |v| {
            variant(v, OperationElem::DoubleEndorsementEvidence)
        }),
        ("double_baking_evidence", |v| {
            variant(v, OperationElem::DoubleBakingEvidence)
        }),
        ("activate_account", |v| variant(v, OperationElem::ActivateAccount)),
        ("reveal", |v| variant(v, OperationElem::Reveal)),
        ("origination", |v| variant(v, OperationElem::Origination)),
        ("delegation", |v| variant(v, OperationElem::Delegation)),
    ];

    fn fallback(generic: GenericOperationElem) -> Self {
        OperationElem::Other(generic)
    }
}

impl<'de> Deserialize<'de> for OperationElem {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        discriminated::deserialize(d)
    }
}

// ============================================================================
// Operations
// ============================================================================

/// A signed operation, as included in a block or held by the mempool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Operation {
    pub protocol: String,
    pub chain_id: String,
    pub hash: String,
    pub branch: String,
    #[serde(deserialize_with = "discriminated::deserialize_list")]
    pub contents: Vec<OperationElem>,
    pub signature: String,
}

impl Operation {
    /// Sum of the fees of every element that pays one.
    pub fn total_fee(&self) -> BigInt {
        self.contents.iter().filter_map(OperationElem::fee).sum()
    }
}

impl Keyed for Operation {
    type Key = String;

    fn set_key(&mut self, hash: String) {
        self.hash = hash;
    }
}

/// An operation the mempool rejected or postponed, with the reasons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationWithError {
    #[serde(flatten)]
    pub operation: Operation,
    #[serde(default)]
    pub error: NodeErrors,
}

impl Keyed for OperationWithError {
    type Key = String;

    fn set_key(&mut self, hash: String) {
        self.operation.hash = hash;
    }
}

/// Operations known to the mempool, grouped by classification.
///
/// Apart from `applied`, every list is encoded as `[hash, operation]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MempoolOperations {
    pub applied: Vec<Operation>,
    #[serde(deserialize_with = "keyed_list")]
    pub refused: Vec<OperationWithError>,
    #[serde(deserialize_with = "keyed_list")]
    pub branch_refused: Vec<OperationWithError>,
    #[serde(deserialize_with = "keyed_list")]
    pub branch_delayed: Vec<OperationWithError>,
    #[serde(deserialize_with = "keyed_list")]
    pub unprocessed: Vec<Operation>,
}

impl MempoolOperations {
    /// Number of operations across every pool.
    pub fn len(&self) -> usize {
        self.applied.len()
            + self.refused.len()
            + self.branch_refused.len()
            + self.branch_delayed.len()
            + self.unprocessed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
