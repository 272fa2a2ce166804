//! Error types for tezos-rpc.
//!
//! # Error Hierarchy
//!
//! - [`Error`](enum@Error): main error type, returned by every client operation
//!   - [`RpcError`]: a non-2xx response, classified by status and content type
//!
//! Every request ends in exactly one of: a value, [`Error::Decode`],
//! [`Error::Rpc`], [`Error::Cancelled`], or one of the transport-level
//! variants. Cancellation is not a fault; check it with
//! [`Error::is_cancelled`] before logging.
//!
//! # Example
//!
//! ```rust,no_run
//! use tezos_rpc::{Error, RpcClient, RpcError, Service};
//!
//! # async fn example() -> Result<(), Error> {
//! let service = Service::new(RpcClient::new("http://localhost:8732")?);
//!
//! match service.network_stats().await {
//!     Ok(stats) => println!("sent {} bytes", stats.total_bytes_sent),
//!     Err(Error::Rpc(RpcError::Node { errors, .. })) => {
//!         for e in &errors {
//!             println!("node error {} ({})", e.id, e.kind);
//!         }
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use reqwest::StatusCode;
use thiserror::Error;

use crate::types::{NodeError, NodeErrors};

/// Media type used for request and response bodies.
pub(crate) const MEDIA_TYPE: &str = "application/json";

/// Main error type.
#[derive(Debug, Error)]
pub enum Error {
    // ─── Configuration ───
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Error encoding request body: {0}")]
    Encode(#[source] serde_json::Error),

    // ─── Transport ───
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Error reading response body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    // ─── Decoding ───
    #[error("Error decoding response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("No content returned for {0}")]
    NoContent(String),

    // ─── Consumer ───
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Returns true if the consumer withdrew interest (cancellation or deadline).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns true for malformed or schema-mismatched JSON.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    /// The classified RPC error, if this is one.
    pub fn as_rpc(&self) -> Option<&RpcError> {
        match self {
            Error::Rpc(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// RPC Errors
// ============================================================================

/// A non-2xx response from the node.
///
/// All variants keep the HTTP status and the raw body for diagnostics.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Not a 5xx, or not JSON: the body is opaque (usually a human readable string).
    #[error("HTTP status {}", status.as_u16())]
    Http { status: StatusCode, body: Vec<u8> },

    /// 5xx JSON response carrying one or more error records.
    #[error("{}", format_records(errors))]
    Node {
        status: StatusCode,
        body: Vec<u8>,
        errors: Vec<NodeError>,
    },

    /// 5xx JSON response that parsed but held no records.
    #[error("Empty RPC error response")]
    Empty { status: StatusCode, body: Vec<u8> },

    /// 5xx JSON response whose error records could not be decoded.
    #[error("Error decoding RPC error: {message}")]
    Malformed {
        status: StatusCode,
        body: Vec<u8>,
        message: String,
    },
}

impl RpcError {
    /// HTTP status of the failed response.
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::Http { status, .. }
            | RpcError::Node { status, .. }
            | RpcError::Empty { status, .. }
            | RpcError::Malformed { status, .. } => *status,
        }
    }

    /// Raw response body.
    pub fn body(&self) -> &[u8] {
        match self {
            RpcError::Http { body, .. }
            | RpcError::Node { body, .. }
            | RpcError::Empty { body, .. }
            | RpcError::Malformed { body, .. } => body,
        }
    }

    /// Structured error records; empty unless this is [`RpcError::Node`].
    pub fn errors(&self) -> &[NodeError] {
        match self {
            RpcError::Node { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Classify a non-2xx response.
    ///
    /// Only a 5xx response with a JSON content type is parsed; anything else
    /// is returned as [`RpcError::Http`].
    pub fn classify(status: StatusCode, content_type: Option<&str>, body: Vec<u8>) -> Self {
        let is_json = content_type.is_some_and(|ct| ct.contains(MEDIA_TYPE));
        if !status.is_server_error() || !is_json {
            return RpcError::Http { status, body };
        }

        match serde_json::from_slice::<NodeErrors>(&body) {
            Err(e) => RpcError::Malformed {
                status,
                body,
                message: e.to_string(),
            },
            Ok(errors) if errors.is_empty() => RpcError::Empty { status, body },
            Ok(errors) => RpcError::Node {
                status,
                body,
                errors: errors.into_inner(),
            },
        }
    }
}

fn format_records(errors: &[NodeError]) -> String {
    errors
        .iter()
        .map(NodeError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
