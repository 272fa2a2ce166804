//! Tezos RPC data model.
//!
//! Hand-written types for the subset of the node RPC this crate covers,
//! plus the two decoding adapters the node's encodings require.

mod block;
pub mod discriminated;
mod error;
pub mod heterogeneous;
mod network;
mod numeric;
mod operation;
mod votes;

pub use block::{
    Block, BlockHeaderMetadata, BlockHeaderMetadataLevel, BlockInfo, ForkingTestChainStatus,
    GenericTestChainStatus, InvalidBlock, MaxOperationListLength, NotRunningTestChainStatus,
    RawBlockHeader, RunningTestChainStatus, TestChainStatus,
};
pub use discriminated::{Discriminated, Probe, VariantDecoder};
pub use error::{ErrorKind, NodeError, NodeErrors};
pub use heterogeneous::leading_pair;
pub use network::{
    BootstrappedBlock, BootstrappedStatus, IdTimestamp, NetworkAddress, NetworkConnection,
    NetworkConnectionTimestamp, NetworkMetadata, NetworkPeer, NetworkPeerLogEntry, NetworkPoint,
    NetworkPointLogEntry, NetworkPointState, NetworkStats, NetworkVersion, SyncState,
};
pub use numeric::BigInt;
pub use operation::{
    ActivateAccountOperationElem, BalanceUpdate, BalanceUpdatesMetadata, BallotOperationElem,
    ContractBalanceUpdate, DelegationOperationElem, DoubleBakingEvidenceOperationElem,
    DoubleEndorsementEvidenceOperationElem, EndorsementMetadata, EndorsementOperationElem,
    FreezerBalanceUpdate, GenericBalanceUpdate, GenericOperationElem, InlinedEndorsement,
    InlinedEndorsementContents, ManagerOperationMetadata, ManagerOperationResult,
    MempoolOperations, Operation, OperationElem, OperationWithError, OriginationOperationElem,
    ProposalsOperationElem, RevealOperationElem, ScriptedContracts,
    SeedNonceRevelationOperationElem, TransactionOperationElem,
};
pub use votes::{Ballot, BallotListing, Ballots, PeriodKind, Proposal};
