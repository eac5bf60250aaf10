mod config;

use anyhow::{Context, Result};
use meraki_api::{MerakiApi, MerakiClient, Retry};
use meraki_collector::{CheckRegistry, Fetcher};
use meraki_common::config::{Asset, AssetConfig};
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinSet;
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;

/// One check scheduled against one asset every cycle.
struct Job {
    asset: Asset,
    config: AssetConfig,
    check: String,
}

async fn run_job(registry: Arc<CheckRegistry>, fetcher: Arc<Fetcher>, job: Arc<Job>) {
    match registry
        .run(&job.check, &fetcher, &job.asset, &job.config)
        .await
    {
        Ok(state) => {
            tracing::info!(
                asset = %job.asset,
                check = %job.check,
                records = state.record_count(),
                "Check completed"
            );
            match serde_json::to_string(&state) {
                Ok(json) => tracing::debug!(asset = %job.asset, check = %job.check, state = %json),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize state"),
            }
        }
        Err(e) => tracing::warn!(
            asset = %job.asset,
            check = %job.check,
            severity = %e.severity(),
            error = %e,
            "Check failed"
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("meraki=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/probe.toml".to_string());

    let config = config::ProbeConfig::load(&config_path)
        .with_context(|| format!("failed to load {config_path}"))?;
    tracing::info!(assets = config.assets.len(), "meraki-probe starting");

    let limiter = config.request_limiter();
    let mut client = MerakiClient::new(limiter.clone())?;
    if let Some(url) = &config.api_url {
        client = client.with_base_url(url);
    }
    let api: Arc<dyn MerakiApi> = Arc::new(client);

    let mut fetcher = Fetcher::new(
        api,
        Retry::new(config.retry.light()),
        Retry::new(config.retry.critical()),
    );
    for (key, policy) in &config.failure_policy {
        fetcher = fetcher.with_failure_policy(key, *policy);
    }
    let fetcher = Arc::new(fetcher);
    let registry = Arc::new(CheckRegistry::new());

    let jobs: Vec<Arc<Job>> = config
        .assets
        .iter()
        .flat_map(|entry| {
            entry.checks.iter().map(|check| {
                Arc::new(Job {
                    asset: entry.asset(),
                    config: entry.config.clone(),
                    check: check.clone(),
                })
            })
        })
        .collect();

    let mut tick = interval(Duration::from_secs(config.poll_interval_secs));
    let mut running = JoinSet::new();

    tracing::info!(
        interval_secs = config.poll_interval_secs,
        max_requests = limiter.capacity(),
        jobs = jobs.len(),
        "Starting poll loop"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if !running.is_empty() {
                    tracing::warn!(pending = running.len(), "Previous cycle still running");
                }
                for job in &jobs {
                    running.spawn(run_job(registry.clone(), fetcher.clone(), job.clone()));
                }
            }
            Some(joined) = running.join_next() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Check task panicked");
                }
            }
            _ = signal::ctrl_c() => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    limiter.close();
    running.shutdown().await;
    Ok(())
}
