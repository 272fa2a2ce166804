//! Typed endpoints.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::rpc::{RpcClient, RpcRequest};
use super::stream::with_deadline;
use crate::error::Error;
use crate::types::heterogeneous::KeyedEntry;
use crate::types::{
    Ballot, BallotListing, Ballots, BigInt, Block, BlockInfo, BootstrappedBlock,
    BootstrappedStatus, InvalidBlock, MempoolOperations, NetworkConnection, NetworkPeer,
    NetworkPeerLogEntry, NetworkPoint, NetworkPointLogEntry, NetworkStats, Operation, PeriodKind,
    Proposal,
};

/// Typed access to the node RPC.
///
/// Cheap to clone; clones share one [`RpcClient`].
///
/// Monitor methods run until the stream ends, `cancel` fires, or the
/// receiving half of `sink` is dropped. Values are delivered in the order
/// the node writes them.
///
/// # Example
///
/// ```rust,no_run
/// use tezos_rpc::{RpcClient, Service};
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), tezos_rpc::Error> {
/// let service = Service::new(RpcClient::new("http://localhost:8732")?);
/// let cancel = CancellationToken::new();
/// let (tx, mut rx) = mpsc::channel(16);
///
/// let heads = service.clone();
/// let token = cancel.clone();
/// tokio::spawn(async move { heads.monitor_heads("main", &tx, &token).await });
///
/// while let Some(head) = rx.recv().await {
///     println!("{} at level {}", head.hash, head.level);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Service {
    client: Arc<RpcClient>,
}

impl Service {
    pub fn new(client: RpcClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Wrap an already shared client.
    pub fn from_shared(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Single-value request; a 204 is an error since there is nothing to return.
    async fn get<R: DeserializeOwned>(&self, req: RpcRequest) -> Result<R, Error> {
        let path = req.path().to_string();
        self.client.call(req).await?.ok_or(Error::NoContent(path))
    }

    // ========================================================================
    // Network
    // ========================================================================

    /// Global network statistics.
    pub async fn network_stats(&self) -> Result<NetworkStats, Error> {
        self.get(RpcRequest::get("/network/stat")).await
    }

    /// Open connections.
    pub async fn network_connections(&self) -> Result<Vec<NetworkConnection>, Error> {
        self.get(RpcRequest::get("/network/connections")).await
    }

    /// Every peer the node ever met, optionally filtered by state
    /// (`accepted`, `running`, `disconnected`).
    pub async fn network_peers(&self, filter: Option<&str>) -> Result<Vec<NetworkPeer>, Error> {
        let mut req = RpcRequest::get("/network/peers");
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            req = req.query("filter", filter);
        }
        let peers: Vec<KeyedEntry<NetworkPeer>> = self.get(req).await?;
        Ok(peers.into_iter().map(|p| p.0).collect())
    }

    pub async fn network_peer(&self, peer_id: &str) -> Result<NetworkPeer, Error> {
        let mut peer: NetworkPeer = self
            .get(RpcRequest::get(format!("/network/peers/{}", peer_id)))
            .await?;
        peer.peer_id = peer_id.to_string();
        Ok(peer)
    }

    /// Blacklist a peer and close connections to it.
    pub async fn ban_network_peer(&self, peer_id: &str) -> Result<(), Error> {
        self.client
            .execute(RpcRequest::get(format!("/network/peers/{}/ban", peer_id)))
            .await
    }

    /// Whitelist a peer.
    pub async fn trust_network_peer(&self, peer_id: &str) -> Result<(), Error> {
        self.client
            .execute(RpcRequest::get(format!("/network/peers/{}/trust", peer_id)))
            .await
    }

    pub async fn network_peer_banned(&self, peer_id: &str) -> Result<bool, Error> {
        self.get(RpcRequest::get(format!("/network/peers/{}/banned", peer_id)))
            .await
    }

    pub async fn network_peer_log(&self, peer_id: &str) -> Result<Vec<NetworkPeerLogEntry>, Error> {
        self.get(RpcRequest::get(format!("/network/peers/{}/log", peer_id)))
            .await
    }

    /// Stream a peer's log. Each element is one batch of entries.
    pub async fn monitor_network_peer_log(
        &self,
        peer_id: &str,
        sink: &mpsc::Sender<Vec<NetworkPeerLogEntry>>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let req = RpcRequest::get(format!("/network/peers/{}/log", peer_id)).flag("monitor");
        self.client.stream(req, sink, cancel).await
    }

    /// Known `IP:port` points, optionally filtered by state
    /// (`requested`, `accepted`, `running`, `disconnected`).
    pub async fn network_points(&self, filter: Option<&str>) -> Result<Vec<NetworkPoint>, Error> {
        let mut req = RpcRequest::get("/network/points");
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            req = req.query("filter", filter);
        }
        let points: Vec<KeyedEntry<NetworkPoint>> = self.get(req).await?;
        Ok(points.into_iter().map(|p| p.0).collect())
    }

    pub async fn network_point(&self, address: &str) -> Result<NetworkPoint, Error> {
        let mut point: NetworkPoint = self
            .get(RpcRequest::get(format!("/network/points/{}", address)))
            .await?;
        point.address = address.to_string();
        Ok(point)
    }

    /// Connect to a point, waiting at most `timeout` on the node side.
    pub async fn connect_to_network_point(
        &self,
        address: &str,
        timeout: Option<Duration>,
    ) -> Result<(), Error> {
        let mut req = RpcRequest::put(format!("/network/points/{}", address))
            .json(&serde_json::json!({}))?;
        if let Some(timeout) = timeout.filter(|t| !t.is_zero()) {
            req = req.query("timeout", format!("{:.6}", timeout.as_secs_f64()));
        }
        self.client.execute(req).await
    }

    pub async fn ban_network_point(&self, address: &str) -> Result<(), Error> {
        self.client
            .execute(RpcRequest::get(format!("/network/points/{}/ban", address)))
            .await
    }

    pub async fn trust_network_point(&self, address: &str) -> Result<(), Error> {
        self.client
            .execute(RpcRequest::get(format!("/network/points/{}/trust", address)))
            .await
    }

    pub async fn network_point_banned(&self, address: &str) -> Result<bool, Error> {
        self.get(RpcRequest::get(format!("/network/points/{}/banned", address)))
            .await
    }

    pub async fn network_point_log(
        &self,
        address: &str,
    ) -> Result<Vec<NetworkPointLogEntry>, Error> {
        self.get(RpcRequest::get(format!("/network/points/{}/log", address)))
            .await
    }

    /// Stream a point's log. Each element is one batch of entries.
    pub async fn monitor_network_point_log(
        &self,
        address: &str,
        sink: &mpsc::Sender<Vec<NetworkPointLogEntry>>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let req = RpcRequest::get(format!("/network/points/{}/log", address)).flag("monitor");
        self.client.stream(req, sink, cancel).await
    }

    // ========================================================================
    // Balances
    // ========================================================================

    /// Full balance of a delegate, in mutez.
    pub async fn delegate_balance(
        &self,
        chain: &str,
        block: &str,
        pkh: &str,
    ) -> Result<BigInt, Error> {
        let path = format!(
            "/chains/{}/blocks/{}/context/delegates/{}/balance",
            chain, block, pkh
        );
        self.get(RpcRequest::get(path)).await
    }

    /// Spendable balance of a contract, in mutez.
    pub async fn contract_balance(
        &self,
        chain: &str,
        block: &str,
        contract: &str,
    ) -> Result<BigInt, Error> {
        let path = format!(
            "/chains/{}/blocks/{}/context/contracts/{}/balance",
            chain, block, contract
        );
        self.get(RpcRequest::get(path)).await
    }

    // ========================================================================
    // Chain status
    // ========================================================================

    /// Stream the blocks the node considers itself bootstrapped at.
    pub async fn monitor_bootstrapped(
        &self,
        sink: &mpsc::Sender<BootstrappedBlock>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        self.client
            .stream(RpcRequest::get("/monitor/bootstrapped"), sink, cancel)
            .await
    }

    /// Bootstrap and synchronisation status of a chain.
    pub async fn is_bootstrapped(&self, chain: &str) -> Result<BootstrappedStatus, Error> {
        self.get(RpcRequest::get(format!("/chains/{}/is_bootstrapped", chain)))
            .await
    }

    /// First block of the bootstrapped monitor, if one arrives within `wait`.
    ///
    /// Returns `Ok(None)` when the deadline passes first; that means "not
    /// bootstrapped yet", not a failure. Cancelling `cancel` still reports
    /// [`Error::Cancelled`].
    pub async fn bootstrapped_within(
        &self,
        wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<BootstrappedBlock>, Error> {
        let deadline = with_deadline(cancel, wait);
        let (tx, mut rx) = mpsc::channel(1);

        let monitor = self.monitor_bootstrapped(&tx, &deadline);
        tokio::pin!(monitor);

        let outcome = tokio::select! {
            block = rx.recv() => Ok(block),
            ended = &mut monitor => match ended {
                Ok(()) => Ok(rx.try_recv().ok()),
                Err(Error::Cancelled) if !cancel.is_cancelled() => {
                    debug!(
                        wait_ms = wait.as_millis() as u64,
                        "No bootstrapped block before deadline"
                    );
                    Ok(rx.try_recv().ok())
                }
                Err(e) => Err(e),
            },
        };

        // Stops the timer task
        deadline.cancel();
        outcome
    }

    // ========================================================================
    // Mempool and blocks
    // ========================================================================

    pub async fn mempool_pending_operations(
        &self,
        chain: &str,
    ) -> Result<MempoolOperations, Error> {
        self.get(RpcRequest::get(format!("/chains/{}/mempool/pending_operations", chain)))
            .await
    }

    /// Stream mempool operations as they arrive, in batches.
    ///
    /// `pool` restricts the stream to one classification, e.g. `applied`
    /// or `branch_delayed`.
    pub async fn monitor_mempool_operations(
        &self,
        chain: &str,
        pool: Option<&str>,
        sink: &mpsc::Sender<Vec<Operation>>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let mut req = RpcRequest::get(format!("/chains/{}/mempool/monitor_operations", chain));
        if let Some(pool) = pool.filter(|p| !p.is_empty()) {
            req = req.query(pool, "true");
        }
        self.client.stream(req, sink, cancel).await
    }

    pub async fn invalid_blocks(&self, chain: &str) -> Result<Vec<InvalidBlock>, Error> {
        self.get(RpcRequest::get(format!("/chains/{}/invalid_blocks", chain)))
            .await
    }

    pub async fn block(&self, chain: &str, block: &str) -> Result<Block, Error> {
        self.get(RpcRequest::get(format!("/chains/{}/blocks/{}", chain, block)))
            .await
    }

    /// Stream new heads of a chain.
    pub async fn monitor_heads(
        &self,
        chain: &str,
        sink: &mpsc::Sender<BlockInfo>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        self.client
            .stream(RpcRequest::get(format!("/monitor/heads/{}", chain)), sink, cancel)
            .await
    }

    // ========================================================================
    // Votes
    // ========================================================================

    fn votes(chain: &str, block: &str, what: &str) -> RpcRequest {
        RpcRequest::get(format!("/chains/{}/blocks/{}/votes/{}", chain, block, what))
    }

    /// Ballots cast so far in the current voting period.
    pub async fn ballot_list(&self, chain: &str, block: &str) -> Result<Vec<Ballot>, Error> {
        self.get(Self::votes(chain, block, "ballot_list")).await
    }

    /// Ballot totals of the current voting period.
    pub async fn ballots(&self, chain: &str, block: &str) -> Result<Ballots, Error> {
        self.get(Self::votes(chain, block, "ballots")).await
    }

    /// Delegates with their voting weight in rolls.
    pub async fn ballot_listings(
        &self,
        chain: &str,
        block: &str,
    ) -> Result<Vec<BallotListing>, Error> {
        self.get(Self::votes(chain, block, "listings")).await
    }

    pub async fn proposals(&self, chain: &str, block: &str) -> Result<Vec<Proposal>, Error> {
        self.get(Self::votes(chain, block, "proposals")).await
    }

    /// Proposal under evaluation; `None` outside of voting.
    pub async fn current_proposal(
        &self,
        chain: &str,
        block: &str,
    ) -> Result<Option<String>, Error> {
        self.get(Self::votes(chain, block, "current_proposal")).await
    }

    /// Current expected quorum, in hundredths of a percent.
    pub async fn current_quorum(&self, chain: &str, block: &str) -> Result<i64, Error> {
        self.get(Self::votes(chain, block, "current_quorum")).await
    }

    pub async fn current_period_kind(&self, chain: &str, block: &str) -> Result<PeriodKind, Error> {
        self.get(Self::votes(chain, block, "current_period_kind")).await
    }
}
