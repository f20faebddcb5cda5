//! Node runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the node runtime and its KV clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// How long to wait for a reply to an outbound RPC.
    #[serde(default = "default_rpc_timeout", with = "humantime_serde")]
    pub rpc_timeout: Duration,

    /// Linearizable KV service holding log bodies.
    #[serde(default = "default_lin_kv_service")]
    pub lin_kv_service: String,

    /// Sequentially-consistent KV service holding committed offsets.
    #[serde(default = "default_seq_kv_service")]
    pub seq_kv_service: String,
}

fn default_rpc_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_lin_kv_service() -> String {
    "lin-kv".to_string()
}

fn default_seq_kv_service() -> String {
    "seq-kv".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: default_rpc_timeout(),
            lin_kv_service: default_lin_kv_service(),
            seq_kv_service: default_seq_kv_service(),
        }
    }
}

impl NodeConfig {
    /// Set the RPC timeout.
    #[must_use]
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Set the names of the log and offset KV services.
    #[must_use]
    pub fn with_services(mut self, lin_kv: impl Into<String>, seq_kv: impl Into<String>) -> Self {
        self.lin_kv_service = lin_kv.into();
        self.seq_kv_service = seq_kv.into();
        self
    }
}
