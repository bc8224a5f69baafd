//! Weft CLI entry point.

#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use weft_cache::CacheBackend;
use weft_cli::commands::{self, SearchArgs};
use weft_cli::{Cli, Command};
use weft_core::EngineConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if cli.verbose { "debug" } else { "info" })
        }))
        .with_writer(std::io::stderr)
        .init();

    let cache = match &cli.command {
        Command::Config { .. } => None,
        _ => cache_backend(&cli).await?,
    };
    if let Command::Config { action } = cli.command {
        weft_cli::config::handle_config_command(cli.config.as_deref(), action)?;
        return Ok(());
    }

    let config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let engine = commands::build_engine(config, &cli.corpus, cache)
        .await
        .with_context(|| format!("building engine over {}", cli.corpus.display()))?;
    tracing::debug!(?engine, "Engine ready");

    let output = match cli.command {
        Command::Search {
            query,
            strategy,
            limit,
            quality_threshold,
            json,
            repeat,
        } => {
            let args = SearchArgs {
                strategy,
                limit,
                quality_threshold,
                json,
                repeat,
            };
            commands::cmd_search(&engine, &query, &args).await?
        }
        Command::Suggest { partial } => commands::cmd_suggest(&engine, &partial),
        Command::Analyze { query } => commands::cmd_analyze(&engine, &query).await?,
        Command::Config { .. } => String::new(),
    };
    print!("{output}");
    Ok(())
}

#[cfg(feature = "redis")]
async fn cache_backend(cli: &Cli) -> Result<Option<Arc<dyn CacheBackend>>> {
    match &cli.redis_url {
        Some(url) => {
            let backend = weft_cache::RedisCacheBackend::connect(url).await?;
            Ok(Some(Arc::new(backend)))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "redis"))]
async fn cache_backend(_cli: &Cli) -> Result<Option<Arc<dyn CacheBackend>>> {
    Ok(None)
}
