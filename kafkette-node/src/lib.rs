//! kafkette-node - line-delimited JSON node serving the kafkette log
//!
//! This crate provides the request adapter around [`kafkette_log`]: the wire
//! protocol, the node runtime that reads requests and writes replies, and a
//! KV client that reaches the external `lin-kv` and `seq-kv` services through
//! the same node.

mod config;
mod error;
pub mod handler;
pub mod kv_client;
pub mod node;
pub mod protocol;

use std::sync::Arc;

use kafkette_log::{LogConfig, LogService};

pub use config::NodeConfig;
pub use error::NodeError;
pub use handler::LogHandler;
pub use kv_client::RemoteKv;
pub use node::{Handler, Node};
pub use protocol::{Body, ErrorCode, Message, Request, Response};

/// Where the log keeps its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// External `lin-kv` / `seq-kv` services reached through the node
    Remote,
    /// Process-local maps; single node, nothing survives a restart
    Memory,
}

/// Build a node and the log service behind it
pub fn build(
    mode: StoreMode,
    node_config: &NodeConfig,
    log_config: LogConfig,
) -> (Node, Arc<LogService>) {
    let node = Node::new(node_config.rpc_timeout);
    let service = match mode {
        StoreMode::Remote => LogService::new(
            Arc::new(RemoteKv::new(node.clone(), &node_config.lin_kv_service)),
            Arc::new(RemoteKv::new(node.clone(), &node_config.seq_kv_service)),
            log_config,
        ),
        StoreMode::Memory => LogService::in_memory(log_config),
    };
    (node, Arc::new(service))
}

/// Serve requests from `reader`, writing to `writer`, until input ends
pub async fn serve<R, W>(
    mode: StoreMode,
    node_config: &NodeConfig,
    log_config: LogConfig,
    reader: R,
    writer: W,
) -> Result<(), NodeError>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (node, service) = build(mode, node_config, log_config);
    tracing::info!(?mode, "kafkette node starting");
    node.run(reader, writer, Arc::new(LogHandler::new(service)))
        .await
}
