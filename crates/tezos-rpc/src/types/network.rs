//! P2P layer and bootstrap status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_with::{DisplayFromStr, serde_as};

use super::heterogeneous::{Keyed, leading_pair};

// ============================================================================
// Statistics and connections
// ============================================================================

/// Global network statistics, or the statistics of one peer.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NetworkStats {
    #[serde(rename = "total_sent")]
    #[serde_as(as = "DisplayFromStr")]
    pub total_bytes_sent: i64,
    #[serde(rename = "total_recv")]
    #[serde_as(as = "DisplayFromStr")]
    pub total_bytes_recv: i64,
    /// Bytes per second.
    pub current_inflow: i64,
    /// Bytes per second.
    pub current_outflow: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NetworkAddress {
    pub addr: String,
    #[serde(default)]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkVersion {
    pub name: String,
    pub major: u16,
    pub minor: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NetworkMetadata {
    pub disable_mempool: bool,
    pub private_node: bool,
}

/// An open P2P connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkConnection {
    pub incoming: bool,
    pub peer_id: String,
    pub id_point: NetworkAddress,
    pub remote_socket_port: u16,
    #[serde(default)]
    pub versions: Vec<NetworkVersion>,
    #[serde(default)]
    pub private: bool,
    pub local_metadata: NetworkMetadata,
    pub remote_metadata: NetworkMetadata,
}

// ============================================================================
// Peers
// ============================================================================

/// Peer address with the time of an event, encoded as `[{addr, port}, timestamp]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConnectionTimestamp {
    pub address: NetworkAddress,
    pub timestamp: DateTime<Utc>,
}

impl<'de> Deserialize<'de> for NetworkConnectionTimestamp {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let (address, timestamp) = leading_pair(d)?;
        Ok(Self { address, timestamp })
    }
}

/// What the node knows about a peer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkPeer {
    /// Filled from the request or from the leading array element.
    #[serde(skip)]
    pub peer_id: String,
    pub score: f64,
    pub trusted: bool,
    pub conn_metadata: Option<NetworkMetadata>,
    /// `accepted`, `running` or `disconnected`.
    pub state: String,
    pub reachable_at: Option<NetworkAddress>,
    pub stat: NetworkStats,
    pub last_established_connection: Option<NetworkConnectionTimestamp>,
    pub last_seen: Option<NetworkConnectionTimestamp>,
    pub last_failed_connection: Option<NetworkConnectionTimestamp>,
    pub last_rejected_connection: Option<NetworkConnectionTimestamp>,
    pub last_disconnection: Option<NetworkConnectionTimestamp>,
    pub last_miss: Option<NetworkConnectionTimestamp>,
}

impl Keyed for NetworkPeer {
    type Key = String;

    fn set_key(&mut self, peer_id: String) {
        self.peer_id = peer_id;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkPeerLogEntry {
    #[serde(flatten)]
    pub address: NetworkAddress,
    pub kind: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Points
// ============================================================================

/// Peer ID with the time of an event, encoded as `[id, timestamp]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTimestamp {
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

impl<'de> Deserialize<'de> for IdTimestamp {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let (id, timestamp) = leading_pair(d)?;
        Ok(Self { id, timestamp })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NetworkPointState {
    pub event_kind: String,
    #[serde(default)]
    pub p2p_peer_id: Option<String>,
}

/// What the node knows about an `IP:port` point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkPoint {
    /// Filled from the request or from the leading array element.
    #[serde(skip)]
    pub address: String,
    pub trusted: bool,
    pub greylisted_until: Option<DateTime<Utc>>,
    pub state: NetworkPointState,
    pub p2p_peer_id: Option<String>,
    pub last_failed_connection: Option<DateTime<Utc>>,
    pub last_rejected_connection: Option<IdTimestamp>,
    pub last_established_connection: Option<IdTimestamp>,
    pub last_disconnection: Option<IdTimestamp>,
    pub last_seen: Option<IdTimestamp>,
    pub last_miss: Option<DateTime<Utc>>,
}

impl Keyed for NetworkPoint {
    type Key = String;

    fn set_key(&mut self, address: String) {
        self.address = address;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkPointLogEntry {
    pub kind: NetworkPointState,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Bootstrap
// ============================================================================

/// Element of the bootstrapped monitor stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BootstrappedBlock {
    pub block: String,
    pub timestamp: DateTime<Utc>,
}

/// Chain synchronisation state as reported by `is_bootstrapped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Synced,
    Unsynced,
    Stuck,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BootstrappedStatus {
    pub bootstrapped: bool,
    pub sync_state: SyncState,
}

impl BootstrappedStatus {
    /// Bootstrapped and in sync with the network.
    pub fn is_healthy(&self) -> bool {
        self.bootstrapped && self.sync_state == SyncState::Synced
    }
}
