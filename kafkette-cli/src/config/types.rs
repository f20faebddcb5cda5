use std::time::Duration;

use clap::ValueEnum;
use kafkette_log::{LogConfig, OffsetConfig, PollConfig, RegressionPolicy, RetryConfig};
use kafkette_node::{NodeConfig, StoreMode};
use serde::{Deserialize, Serialize};

/// Backing store selected for `kafkette serve`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// External lin-kv / seq-kv services
    #[default]
    Remote,
    /// In-process maps, single node only
    Memory,
}

impl From<StoreKind> for StoreMode {
    fn from(kind: StoreKind) -> Self {
        match kind {
            StoreKind::Remote => StoreMode::Remote,
            StoreKind::Memory => StoreMode::Memory,
        }
    }
}

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawKafketteConfig {
    pub store: Option<StoreKind>,

    #[serde(default)]
    pub log: RawLogConfig,

    #[serde(default)]
    pub node: RawNodeConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawLogConfig {
    #[serde(default)]
    pub append: RawRetryConfig,

    #[serde(default)]
    pub offsets: RawOffsetConfig,

    #[serde(default)]
    pub poll: RawPollConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawRetryConfig {
    pub max_attempts: Option<u32>,

    #[serde(default, with = "humantime_serde")]
    pub initial_backoff: Option<Duration>,

    #[serde(default, with = "humantime_serde")]
    pub max_backoff: Option<Duration>,

    pub multiplier: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawOffsetConfig {
    pub regression: Option<RegressionPolicy>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawPollConfig {
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawNodeConfig {
    #[serde(default, with = "humantime_serde")]
    pub rpc_timeout: Option<Duration>,

    pub lin_kv_service: Option<String>,

    pub seq_kv_service: Option<String>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct KafketteConfig {
    pub store: StoreKind,
    pub log: LogConfig,
    pub node: NodeConfig,
}

impl RawKafketteConfig {
    /// Apply defaults to every field left unset
    pub fn finalize(self) -> KafketteConfig {
        let append = RetryConfig::default();
        let node = NodeConfig::default();

        KafketteConfig {
            store: self.store.unwrap_or_default(),
            log: LogConfig {
                append: RetryConfig {
                    max_attempts: self.log.append.max_attempts.unwrap_or(append.max_attempts),
                    initial_backoff: self
                        .log
                        .append
                        .initial_backoff
                        .unwrap_or(append.initial_backoff),
                    max_backoff: self.log.append.max_backoff.unwrap_or(append.max_backoff),
                    multiplier: self.log.append.multiplier.unwrap_or(append.multiplier),
                },
                offsets: OffsetConfig {
                    regression: self.log.offsets.regression.unwrap_or_default(),
                },
                poll: PollConfig {
                    max_entries: self.log.poll.max_entries,
                },
            },
            node: NodeConfig {
                rpc_timeout: self.node.rpc_timeout.unwrap_or(node.rpc_timeout),
                lin_kv_service: self.node.lin_kv_service.unwrap_or(node.lin_kv_service),
                seq_kv_service: self.node.seq_kv_service.unwrap_or(node.seq_kv_service),
            },
        }
    }
}
