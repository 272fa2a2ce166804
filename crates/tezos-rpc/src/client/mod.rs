//! Client module for talking to a Tezos node.
//!
//! - [`Service`]: typed endpoints, the usual entry point
//! - [`RpcClient`]: HTTP transport with single-value, fire-and-forget and
//!   streaming entry points
//! - [`JsonStream`]: incremental decoder for monitor response bodies
//!
//! # Streaming
//!
//! Monitor endpoints deliver values into a [`tokio::sync::mpsc::Sender`]
//! until the node ends the stream or a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) fires. Use
//! [`with_deadline`] to bound a monitor in time.

mod rpc;
mod service;
mod stream;

pub use rpc::{
    DEFAULT_URL, DEFAULT_USER_AGENT, RequestInfo, RpcClient, RpcClientBuilder, RpcObserver,
    RpcRequest,
};
pub use service::Service;
pub use stream::{ChunkError, JsonStream, with_deadline};
