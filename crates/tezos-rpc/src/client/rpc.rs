//! Low-level HTTP transport for the Tezos node RPC.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use super::stream::JsonStream;
use crate::error::{Error, MEDIA_TYPE, RpcError};

/// Node URL used when none is configured.
pub const DEFAULT_URL: &str = "http://localhost:8732";

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("tezos-rpc/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Requests
// ============================================================================

/// A request against one RPC path.
///
/// # Example
///
/// ```rust
/// use tezos_rpc::RpcRequest;
///
/// let req = RpcRequest::get("/network/peers/idrnHcGMrFxiYsmxf5Cqd6NhUTUU8X/log").flag("monitor");
/// assert_eq!(req.path(), "/network/peers/idrnHcGMrFxiYsmxf5Cqd6NhUTUU8X/log");
/// ```
#[derive(Debug, Clone)]
pub struct RpcRequest {
    method: Method,
    path: String,
    query: Vec<(String, Option<String>)>,
    body: Option<serde_json::Value>,
}

impl RpcRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Append a `key=value` query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), Some(value.into())));
        self
    }

    /// Append a key-only query parameter such as `monitor`.
    pub fn flag(mut self, key: impl Into<String>) -> Self {
        self.query.push((key.into(), None));
        self
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        self.body = Some(serde_json::to_value(body).map_err(Error::Encode)?);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Identity of one dispatched request, handed to [`RpcObserver`] hooks.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub id: u64,
    pub method: Method,
    pub url: Url,
}

/// Hooks for timing and counting requests.
///
/// Both methods default to no-ops. `on_headers` fires once the response
/// status is known; `on_complete` fires when the request is fully done,
/// which for a stream is when the stream ends.
pub trait RpcObserver: Send + Sync {
    fn on_headers(&self, request: &RequestInfo, status: StatusCode, elapsed: Duration) {
        let _ = (request, status, elapsed);
    }

    fn on_complete(&self, request: &RequestInfo, elapsed: Duration, outcome: Result<(), &Error>) {
        let _ = (request, elapsed, outcome);
    }
}

// ============================================================================
// Client
// ============================================================================

/// Builder for [`RpcClient`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tezos_rpc::RpcClient;
///
/// # fn example() -> Result<(), tezos_rpc::Error> {
/// let client = RpcClient::builder("http://localhost:8732")
///     .user_agent("tezos_exporter/1.0")
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RpcClientBuilder {
    url: String,
    user_agent: String,
    timeout: Option<Duration>,
    http_client: Option<reqwest::Client>,
    observer: Option<Arc<dyn RpcObserver>>,
}

impl RpcClientBuilder {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            http_client: None,
            observer: None,
        }
    }

    /// Set the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set a timeout for single-shot requests.
    ///
    /// Streams are not subject to it; bound them with a cancellation token.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, connection pool).
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Install request hooks.
    pub fn observer(mut self, observer: impl RpcObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or is not http(s).
    pub fn build(self) -> Result<RpcClient, Error> {
        let base = Url::parse(&self.url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported URL scheme {:?} in {}",
                base.scheme(),
                self.url
            )));
        }

        Ok(RpcClient {
            base,
            user_agent: self.user_agent,
            timeout: self.timeout,
            client: self.http_client.unwrap_or_default(),
            observer: self.observer,
            request_id: Arc::new(AtomicU64::new(0)),
        })
    }
}

/// HTTP transport for the node RPC.
///
/// Responses are handled by status: 204 carries no value, other 2xx bodies
/// are decoded by the chosen entry point ([`call`](Self::call),
/// [`execute`](Self::execute) or [`stream`](Self::stream)), anything else
/// becomes an [`RpcError`].
pub struct RpcClient {
    base: Url,
    user_agent: String,
    timeout: Option<Duration>,
    client: reqwest::Client,
    observer: Option<Arc<dyn RpcObserver>>,
    // Shared with clones so ids stay unique across handles
    request_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Create a client with default settings.
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        Self::builder(url).build()
    }

    pub fn builder(url: impl Into<String>) -> RpcClientBuilder {
        RpcClientBuilder::new(url)
    }

    /// Create a client configured from environment variables.
    ///
    /// - `TEZOS_RPC_URL`: node URL, defaults to `http://localhost:8732`
    /// - `TEZOS_RPC_USER_AGENT` (optional): `User-Agent` header
    /// - `TEZOS_RPC_TIMEOUT_MS` (optional): timeout for single-shot requests
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the timeout is not an integer.
    pub fn from_env() -> Result<Self, Error> {
        let url = std::env::var("TEZOS_RPC_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let mut builder = Self::builder(url);

        if let Ok(user_agent) = std::env::var("TEZOS_RPC_USER_AGENT") {
            builder = builder.user_agent(user_agent);
        }

        if let Ok(timeout) = std::env::var("TEZOS_RPC_TIMEOUT_MS") {
            let ms: u64 = timeout.trim().parse().map_err(|_| {
                Error::Config(format!("TEZOS_RPC_TIMEOUT_MS is not a number: {:?}", timeout))
            })?;
            builder = builder.timeout(Duration::from_millis(ms));
        }

        builder.build()
    }

    /// Base URL of the node.
    pub fn url(&self) -> &Url {
        &self.base
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Send a request and decode exactly one JSON value.
    ///
    /// Returns `Ok(None)` on 204 No Content without touching the body.
    pub async fn call<R: DeserializeOwned>(&self, req: RpcRequest) -> Result<Option<R>, Error> {
        let info = self.begin(&req)?;
        let started = Instant::now();

        let outcome = self.decode_one(&info, &req, started).await;

        self.complete(&info, started, outcome.as_ref().map(|_| ()));
        outcome
    }

    /// Send a request whose response body is of no interest.
    pub async fn execute(&self, req: RpcRequest) -> Result<(), Error> {
        let info = self.begin(&req)?;
        let started = Instant::now();

        let outcome = self.open(&info, &req, true, started).await.map(drop);

        self.complete(&info, started, outcome.as_ref().copied());
        outcome
    }

    /// Send a request and deliver each JSON value of the response body to `sink`.
    ///
    /// Runs until the body ends (`Ok(())`), a value fails to decode, or the
    /// consumer withdraws interest. Every body read and every delivery is
    /// raced against `cancel`; if both are ready, cancellation wins. A closed
    /// `sink` counts as cancellation. In all cases the response is dropped,
    /// releasing the connection, before this returns.
    pub async fn stream<T>(
        &self,
        req: RpcRequest,
        sink: &mpsc::Sender<T>,
        cancel: &CancellationToken,
    ) -> Result<(), Error>
    where
        T: DeserializeOwned + fmt::Debug,
    {
        let info = self.begin(&req)?;
        let started = Instant::now();

        let outcome = self.deliver(&info, &req, sink, cancel, started).await;

        self.complete(&info, started, outcome.as_ref().copied());
        outcome
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    async fn decode_one<R: DeserializeOwned>(
        &self,
        info: &RequestInfo,
        req: &RpcRequest,
        started: Instant,
    ) -> Result<Option<R>, Error> {
        let Some(response) = self.open(info, req, true, started).await? else {
            return Ok(None);
        };
        let body = response.bytes().await?;
        trace!(request_id = info.id, body = %String::from_utf8_lossy(&body), "RPC response body");
        serde_json::from_slice(&body).map(Some).map_err(Error::Decode)
    }

    async fn deliver<T>(
        &self,
        info: &RequestInfo,
        req: &RpcRequest,
        sink: &mpsc::Sender<T>,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<(), Error>
    where
        T: DeserializeOwned + fmt::Debug,
    {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.open(info, req, false, started) => response?,
        };
        let Some(response) = response else {
            return Ok(());
        };

        let mut values = JsonStream::new(Box::pin(response.bytes_stream()));
        let mut delivered = 0u64;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = values.next_value() => next?,
            };
            let Some(value) = next else {
                debug!(request_id = info.id, delivered, "Stream ended");
                return Ok(());
            };

            trace!(request_id = info.id, ?value, "Stream element");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                sent = sink.send(value) => sent.map_err(|_| Error::Cancelled)?,
            }
            delivered += 1;
        }
    }

    fn begin(&self, req: &RpcRequest) -> Result<RequestInfo, Error> {
        let url = self.resolve(req)?;
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        debug!(request_id = id, method = %req.method, url = %url, "RPC request");
        Ok(RequestInfo {
            id,
            method: req.method.clone(),
            url,
        })
    }

    fn resolve(&self, req: &RpcRequest) -> Result<Url, Error> {
        let mut url = self.base.join(&req.path)?;
        if !req.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &req.query {
                match value {
                    Some(value) => pairs.append_pair(key, value),
                    None => pairs.append_key_only(key),
                };
            }
        }
        Ok(url)
    }

    /// Send the request and sort the response by status.
    ///
    /// `Ok(None)` is a 204; `Ok(Some(_))` is a 2xx response with its body unread.
    async fn open(
        &self,
        info: &RequestInfo,
        req: &RpcRequest,
        single: bool,
        started: Instant,
    ) -> Result<Option<Response>, Error> {
        let mut builder = self
            .client
            .request(info.method.clone(), info.url.clone())
            .header(ACCEPT, MEDIA_TYPE)
            .header(USER_AGENT, &self.user_agent);

        if let Some(body) = &req.body {
            let bytes = serde_json::to_vec(body).map_err(Error::Encode)?;
            trace!(
                request_id = info.id,
                body = %String::from_utf8_lossy(&bytes),
                "RPC request body"
            );
            builder = builder.header(CONTENT_TYPE, MEDIA_TYPE).body(bytes);
        }

        if single {
            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }
        }

        let response = builder.send().await?;
        let status = response.status();
        let elapsed = started.elapsed();

        debug!(
            request_id = info.id,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "RPC response"
        );
        if let Some(observer) = &self.observer {
            observer.on_headers(info, status, elapsed);
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if status.is_success() {
            return Ok(Some(response));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;
        trace!(request_id = info.id, body = %String::from_utf8_lossy(&body), "RPC error body");

        Err(RpcError::classify(status, content_type.as_deref(), body.to_vec()).into())
    }

    fn complete(&self, info: &RequestInfo, started: Instant, outcome: Result<(), &Error>) {
        let elapsed = started.elapsed();
        match outcome {
            Ok(()) => debug!(
                request_id = info.id,
                elapsed_ms = elapsed.as_millis() as u64,
                "RPC complete"
            ),
            Err(e) if e.is_cancelled() => debug!(request_id = info.id, "RPC cancelled"),
            Err(e) => debug!(request_id = info.id, error = %e, "RPC failed"),
        }
        if let Some(observer) = &self.observer {
            observer.on_complete(info, elapsed, outcome);
        }
    }
}

impl Clone for RpcClient {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            user_agent: self.user_agent.clone(),
            timeout: self.timeout,
            client: self.client.clone(),
            observer: self.observer.clone(),
            request_id: self.request_id.clone(),
        }
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.base.as_str())
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
