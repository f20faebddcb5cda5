//! Node error types

use thiserror::Error;

/// Errors that can occur in the node runtime
#[derive(Debug, Error)]
pub enum NodeError {
    /// Reading input or writing output failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be encoded or decoded
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    /// No reply to an RPC arrived in time
    #[error("rpc {msg_id} to {dest} timed out")]
    Timeout { dest: String, msg_id: u64 },

    /// The runtime stopped before the RPC completed
    #[error("node is shutting down")]
    Shutdown,

    /// `run` was called twice on the same node
    #[error("node is already running")]
    AlreadyRunning,

    /// A background task panicked or was cancelled
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
