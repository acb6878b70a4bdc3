//! llmbench - Concurrent load generator for chat-completion APIs

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use llmbench_core::{Aggregator, DispatcherBuilder};
use llmbench_storage::LocalStorage;
use llmbench_vendors::{ChatClient, HttpClientPool, HttpConfig};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let config = cli.into_config();
    config.validate().context("invalid configuration")?;

    tracing::info!(
        style = %config.style,
        model = %config.model,
        base_url = %config.base_url,
        runs = config.runs,
        concurrency = config.effective_concurrency(),
        stream = config.stream,
        "llmbench starting"
    );

    let http = HttpConfig::default().with_pool_max_idle(config.effective_concurrency());
    let pool = HttpClientPool::new(&http).context("failed to build HTTP client")?;

    let mut client = ChatClient::new(pool, &config);
    if config.store_data {
        if let Some(dir) = &config.data_dir {
            client = client.with_sink(Arc::new(LocalStorage::new(dir)));
        }
    }
    let client = Arc::new(client);

    let (dispatcher, results_rx) = DispatcherBuilder::new()
        .client(client.clone())
        .concurrency(config.concurrency)
        .build()?;

    let aggregator = tokio::spawn(Aggregator::new(config.runs).collect(results_rx));
    let stats = dispatcher
        .run_with_signal_handling(config.run_requests())
        .await?;
    let summary = aggregator.await.context("aggregator task failed")?;

    if stats.cancelled > 0 || stats.not_started() > 0 {
        tracing::warn!(
            cancelled = stats.cancelled,
            not_started = stats.not_started(),
            "Session interrupted before all runs completed"
        );
    }

    print!("{}", summary);

    if config.should_unload() {
        client.unload_model().await?;
        tracing::info!(model = %config.model, "Model unloaded");
    }

    Ok(())
}
