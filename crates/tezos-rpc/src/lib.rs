//! Client for the Tezos node JSON RPC.
//!
//! **tezos-rpc** decodes the node's polymorphic and tuple-shaped encodings
//! into typed values and follows its long-lived monitor streams.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tezos_rpc::{RpcClient, Service};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tezos_rpc::Error> {
//!     let service = Service::new(RpcClient::from_env()?);
//!
//!     let status = service.is_bootstrapped("main").await?;
//!     println!("healthy: {}", status.is_healthy());
//!
//!     let block = service.block("main", "head").await?;
//!     for op in block.operations.iter().flatten() {
//!         println!("{} pays {}", op.hash, op.total_fee());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Decoding
//!
//! - Kind-tagged objects (operation contents, balance updates, test chain
//!   status) decode through [`Discriminated`]: the tag picks a variant and
//!   unknown tags keep their common fields.
//! - Arrays that carry a key ahead of an object, like `["oo…", {...}]`,
//!   decode through [`leading_pair`].
//!
//! # Errors
//!
//! Every operation returns [`Error`]. Non-success responses surface as
//! [`RpcError`], which separates node error records from plain HTTP failures.

pub mod client;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{Error, RpcError};
pub use types::*;

// Re-export client types
pub use client::{
    ChunkError, JsonStream, RequestInfo, RpcClient, RpcClientBuilder, RpcObserver, RpcRequest,
    Service, with_deadline,
};
