//! Ingestion: persist a batch, then fan it out to live subscribers
//!
//! Records are written one at a time, in order. The first failed write ends
//! the call with [`GatewayError::Persistence`]; records written before it stay
//! written and nothing is broadcast. A fully persisted batch is broadcast to
//! the [`SubscriptionHub`] exactly as it was received.

use std::sync::Arc;

use roadwatch_core::{ProcessedAgentData, ProcessedRecord};

use crate::hub::{BroadcastReport, SubscriptionHub};
use crate::storage::{RecordStore, StorageError};

/// Ingestion and record access errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A write failed part way through a batch; `written` records were kept
    #[error("Failed to persist record {index}: {source}")]
    Persistence {
        index: usize,
        written: usize,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of a successful ingestion
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Persisted records, in the order received
    pub records: Vec<ProcessedRecord>,

    pub broadcast: BroadcastReport,
}

/// Owner of the record store and the subscriber hub
pub struct IngestionGateway {
    store: Arc<dyn RecordStore>,
    hub: Arc<SubscriptionHub>,
}

impl IngestionGateway {
    pub fn new(store: Arc<dyn RecordStore>, hub: Arc<SubscriptionHub>) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &Arc<SubscriptionHub> {
        &self.hub
    }

    /// Persist every record of `batch`, then broadcast it
    pub async fn ingest(
        &self,
        batch: Vec<ProcessedAgentData>,
    ) -> Result<IngestOutcome, GatewayError> {
        let mut records = Vec::with_capacity(batch.len());

        for (index, data) in batch.iter().enumerate() {
            match self.store.create(data).await {
                Ok(record) => records.push(record),
                Err(source) => {
                    tracing::error!(
                        index,
                        written = records.len(),
                        error = %source,
                        "Failed to persist record, ingestion aborted"
                    );
                    return Err(GatewayError::Persistence {
                        index,
                        written: records.len(),
                        source,
                    });
                }
            }
        }

        let broadcast = if batch.is_empty() {
            BroadcastReport::default()
        } else {
            // Serializing plain data structs does not fail in practice; a
            // failure here must not undo the writes above.
            self.hub.broadcast(&batch).await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to serialize batch for subscribers");
                BroadcastReport::default()
            })
        };

        tracing::info!(
            records = records.len(),
            subscribers = broadcast.delivered,
            "Batch ingested"
        );

        Ok(IngestOutcome { records, broadcast })
    }

    pub async fn fetch(&self, id: i64) -> Result<Option<ProcessedRecord>, GatewayError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<ProcessedRecord>, GatewayError> {
        Ok(self.store.list().await?)
    }

    pub async fn update(
        &self,
        id: i64,
        data: &ProcessedAgentData,
    ) -> Result<Option<ProcessedRecord>, GatewayError> {
        Ok(self.store.update(id, data).await?)
    }

    /// `Ok(false)` if no record has this id
    pub async fn delete(&self, id: i64) -> Result<bool, GatewayError> {
        Ok(self.store.delete(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SqliteRecordStore, StorageResult};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use roadwatch_core::{AggregatedSample, MotionSample, PositionSample};

    /// Store whose writes fail for one road state
    struct FlakyStore {
        inner: SqliteRecordStore,
        failing_state: &'static str,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn create(&self, data: &ProcessedAgentData) -> StorageResult<ProcessedRecord> {
            if data.road_state == self.failing_state {
                return Err(StorageError::Unavailable("disk full".to_string()));
            }
            self.inner.create(data).await
        }

        async fn get(&self, id: i64) -> StorageResult<Option<ProcessedRecord>> {
            self.inner.get(id).await
        }

        async fn list(&self) -> StorageResult<Vec<ProcessedRecord>> {
            self.inner.list().await
        }

        async fn update(
            &self,
            id: i64,
            data: &ProcessedAgentData,
        ) -> StorageResult<Option<ProcessedRecord>> {
            self.inner.update(id, data).await
        }

        async fn delete(&self, id: i64) -> StorageResult<bool> {
            self.inner.delete(id).await
        }
    }

    fn data(road_state: &str, x: i32) -> ProcessedAgentData {
        ProcessedAgentData::new(
            road_state,
            AggregatedSample {
                accelerometer: MotionSample { x, y: 0, z: 16000 },
                gps: PositionSample {
                    latitude: 50.45,
                    longitude: 30.52,
                },
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            },
        )
    }

    fn gateway(store: Arc<dyn RecordStore>) -> IngestionGateway {
        IngestionGateway::new(store, Arc::new(SubscriptionHub::default()))
    }

    fn flaky_gateway() -> IngestionGateway {
        gateway(Arc::new(FlakyStore {
            inner: SqliteRecordStore::in_memory().unwrap(),
            failing_state: "fail",
        }))
    }

    #[tokio::test]
    async fn test_ingest_persists_and_broadcasts() {
        let gateway = gateway(Arc::new(SqliteRecordStore::in_memory().unwrap()));
        let mut observer = gateway.hub().subscribe();
        let batch = vec![data("normal", 1), data("pothole", 2)];

        let outcome = gateway.ingest(batch.clone()).await.unwrap();

        assert_eq!(
            outcome.records.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(outcome.broadcast.delivered, 1);

        let payload = observer.try_recv().unwrap();
        let received: Vec<ProcessedAgentData> = serde_json::from_str(&payload).unwrap();
        assert_eq!(received, batch);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_earlier_records() {
        let gateway = flaky_gateway();
        let mut observer = gateway.hub().subscribe();

        let err = gateway
            .ingest(vec![data("normal", 1), data("fail", 2), data("normal", 3)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Persistence {
                index: 1,
                written: 1,
                ..
            }
        ));
        assert!(err.to_string().contains("disk full"));

        // No rollback of the first record, nothing after the failure
        let kept = gateway.fetch(1).await.unwrap().unwrap();
        assert_eq!(kept.x, 1);
        assert_eq!(gateway.list().await.unwrap().len(), 1);

        // No broadcast for a failed ingestion
        assert!(observer.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_empty_batch_is_accepted() {
        let gateway = gateway(Arc::new(SqliteRecordStore::in_memory().unwrap()));
        let mut observer = gateway.hub().subscribe();

        let outcome = gateway.ingest(Vec::new()).await.unwrap();

        assert!(outcome.records.is_empty());
        assert!(observer.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_not_found() {
        let gateway = flaky_gateway();
        assert!(!gateway.delete(999).await.unwrap());
        assert!(gateway.fetch(999).await.unwrap().is_none());
        assert!(gateway.update(999, &data("normal", 1)).await.unwrap().is_none());
    }
}
