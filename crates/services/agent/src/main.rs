//! Agent binary
//!
//! Replays recorded telemetry against a running store API until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roadwatch_agent::{run_agent, Config, RoadStateClassifier};
use roadwatch_core::StreamSource;
use roadwatch_http::StoreApiAdapter;

/// Roadwatch telemetry replay agent
#[derive(Parser)]
#[command(name = "agent")]
#[command(author, version)]
#[command(about = "Replay recorded road telemetry to the store API")]
struct Args {
    /// TOML configuration file (environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many batches
    #[arg(long)]
    batches: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_ref())?;

    tracing::info!(
        store = %config.store.base_url,
        accelerometer = %config.source.accelerometer_path.display(),
        gps = %config.source.gps_path.display(),
        batch_size = config.source.batch_size,
        delay_ms = config.source.delay_ms,
        "Starting Roadwatch agent"
    );

    let gateway = StoreApiAdapter::with_timeout(&config.store.base_url, config.store.timeout())
        .context("creating store API client")?;
    let source = StreamSource::new(config.source_config());
    let classifier = RoadStateClassifier::new(config.classifier.bump_threshold);

    tokio::select! {
        result = run_agent(source, classifier, &gateway, args.batches) => {
            let stats = result?;
            tracing::info!(delivered = stats.delivered, failed = stats.failed, "Agent finished");
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping agent");
        }
    }

    Ok(())
}
