use super::types::{
    KafketteConfig, RawKafketteConfig, RawLogConfig, RawNodeConfig, RawOffsetConfig,
    RawPollConfig, RawRetryConfig,
};
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + explicit file)
    pub fn load(explicit: Option<&Path>) -> Result<KafketteConfig> {
        let user_path = Self::user_config_path();
        Self::load_layers(
            user_path.as_deref(),
            &Self::project_config_path(),
            explicit,
        )
    }

    fn load_layers(
        user: Option<&Path>,
        project: &Path,
        explicit: Option<&Path>,
    ) -> Result<KafketteConfig> {
        let mut raw = RawKafketteConfig::default();

        // Layer 1: User config
        if let Some(user_path) = user
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(user_path)?);
        }

        // Layer 2: Project config
        if project.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(project)?);
        }

        // Layer 3: --config, which must exist
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            raw = Self::merge_raw(raw, Self::read_raw(path)?);
        }

        Ok(raw.finalize())
    }

    fn read_raw(path: &Path) -> Result<RawKafketteConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "kafkette").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with KAFKETTE_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("KAFKETTE_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".kafkette/config.toml")
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawKafketteConfig, overlay: RawKafketteConfig) -> RawKafketteConfig {
        RawKafketteConfig {
            store: overlay.store.or(base.store),
            log: RawLogConfig {
                append: RawRetryConfig {
                    max_attempts: overlay
                        .log
                        .append
                        .max_attempts
                        .or(base.log.append.max_attempts),
                    initial_backoff: overlay
                        .log
                        .append
                        .initial_backoff
                        .or(base.log.append.initial_backoff),
                    max_backoff: overlay
                        .log
                        .append
                        .max_backoff
                        .or(base.log.append.max_backoff),
                    multiplier: overlay.log.append.multiplier.or(base.log.append.multiplier),
                },
                offsets: RawOffsetConfig {
                    regression: overlay
                        .log
                        .offsets
                        .regression
                        .or(base.log.offsets.regression),
                },
                poll: RawPollConfig {
                    max_entries: overlay.log.poll.max_entries.or(base.log.poll.max_entries),
                },
            },
            node: RawNodeConfig {
                rpc_timeout: overlay.node.rpc_timeout.or(base.node.rpc_timeout),
                lin_kv_service: overlay.node.lin_kv_service.or(base.node.lin_kv_service),
                seq_kv_service: overlay.node.seq_kv_service.or(base.node.seq_kv_service),
            },
        }
    }
}
