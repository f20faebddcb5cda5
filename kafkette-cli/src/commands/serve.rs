//! Serve command: run a kafkette node on stdin/stdout
//!
//! Requests arrive one JSON envelope per line on stdin and replies leave on
//! stdout, so all logging goes to stderr.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::config::{ConfigLoader, KafketteConfig, StoreKind};

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Backing store for logs and offsets
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// Config file layered over the user and project configs
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Append attempts before a send fails with a conflict
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the loaded config
    fn apply(&self, mut config: KafketteConfig) -> KafketteConfig {
        if let Some(store) = self.store {
            config.store = store;
        }
        if let Some(attempts) = self.max_attempts {
            config.log.append.max_attempts = attempts;
        }
        config
    }
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = args.apply(ConfigLoader::load(args.config.as_deref())?);

    info!(
        store = ?config.store,
        max_attempts = config.log.append.max_attempts,
        rpc_timeout = ?config.node.rpc_timeout,
        "starting kafkette node on stdio"
    );

    kafkette_node::serve(
        config.store.into(),
        &config.node,
        config.log,
        tokio::io::stdin(),
        tokio::io::stdout(),
    )
    .await?;

    info!("input closed, node stopped");
    Ok(())
}
