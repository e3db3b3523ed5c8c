//! Roadwatch agent
//!
//! Replays recorded accelerometer/GPS data, labels every sample with a road
//! state and ships each batch to the store API.
//!
//! The replay source blocks (file reads plus the per-sample delay), so every
//! call into it runs on tokio's blocking pool. Delivery failures are logged
//! and the loop moves on to the next batch.

pub mod classifier;
pub mod config;

use roadwatch_core::{Batch, StreamSource};
use roadwatch_http::StoreGateway;

pub use classifier::RoadStateClassifier;
pub use config::Config;

/// Undecodable passes over the data tolerated in a row before giving up
///
/// Each retry waits one sample delay, then reads the files afresh.
pub const MAX_CONSECUTIVE_DECODE_FAILURES: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Source(#[from] roadwatch_core::Error),

    #[error("Replay task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Counters for one agent run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentStats {
    /// Batches acknowledged by the store
    pub delivered: u64,

    /// Batches the store did not acknowledge
    pub failed: u64,
}

/// Replay loop
///
/// Opens `source`, then reads, labels and delivers batches until `max_batches`
/// have been attempted (forever when `None`) or the source fails for good.
/// The source is closed before returning.
pub async fn run_agent<G>(
    source: StreamSource,
    classifier: RoadStateClassifier,
    gateway: &G,
    max_batches: Option<u64>,
) -> Result<AgentStats, AgentError>
where
    G: StoreGateway + ?Sized,
{
    let (mut source, opened) = blocking(source, StreamSource::open).await?;
    opened?;

    let mut stats = AgentStats::default();
    let mut decode_failures = 0;

    let outcome = loop {
        if max_batches.is_some_and(|max| stats.delivered + stats.failed >= max) {
            break Ok(stats);
        }

        let (returned, read) = blocking(source, StreamSource::read).await?;
        source = returned;

        let batch: Batch = match read {
            Ok(batch) => {
                decode_failures = 0;
                batch
            }
            Err(e) if e.is_recoverable() && decode_failures + 1 < MAX_CONSECUTIVE_DECODE_FAILURES => {
                decode_failures += 1;
                tracing::warn!(error = %e, attempt = decode_failures, "Recorded data unreadable, retrying");
                // The source rereads the files on the next call
                tokio::time::sleep(source.config().sample_delay).await;
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "Recorded data source failed");
                break Err(e.into());
            }
        };

        let labelled = classifier.classify(batch);
        let records = labelled.len();
        if gateway.save_data(labelled).await {
            stats.delivered += 1;
        } else {
            stats.failed += 1;
        }

        tracing::info!(
            records,
            delivered = stats.delivered,
            failed = stats.failed,
            "Batch processed"
        );
    };

    source.close();
    outcome
}

/// Run `f` against `source` on the blocking pool and hand the source back
async fn blocking<T, F>(mut source: StreamSource, f: F) -> Result<(StreamSource, T), AgentError>
where
    F: FnOnce(&mut StreamSource) -> T + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        let out = f(&mut source);
        (source, out)
    })
    .await?;
    Ok(result)
}
