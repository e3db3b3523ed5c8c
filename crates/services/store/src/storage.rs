//! Keyed record storage
//!
//! `RecordStore` is the persistence boundary of the store API. Lookups on an
//! id that does not exist are not errors: `get`/`update` return `None` and
//! `delete` returns `false`.

use async_trait::async_trait;
use parking_lot::Mutex;
use roadwatch_core::{ProcessedAgentData, ProcessedRecord};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS processed_agent_data (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    road_state TEXT    NOT NULL,
    x          INTEGER NOT NULL,
    y          INTEGER NOT NULL,
    z          INTEGER NOT NULL,
    latitude   REAL    NOT NULL,
    longitude  REAL    NOT NULL,
    timestamp  TEXT    NOT NULL
);
";

const COLUMNS: &str = "id, road_state, x, y, z, latitude, longitude, timestamp";

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence operations over [`ProcessedRecord`]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record and return it with its assigned id
    async fn create(&self, data: &ProcessedAgentData) -> StorageResult<ProcessedRecord>;

    async fn get(&self, id: i64) -> StorageResult<Option<ProcessedRecord>>;

    /// All records in id order
    async fn list(&self) -> StorageResult<Vec<ProcessedRecord>>;

    /// Replace every field but the id; `None` if the id is absent
    async fn update(
        &self,
        id: i64,
        data: &ProcessedAgentData,
    ) -> StorageResult<Option<ProcessedRecord>>;

    /// `false` if the id is absent
    async fn delete(&self, id: i64) -> StorageResult<bool>;
}

/// SQLite-backed record store
///
/// Statements run on tokio's blocking pool, one at a time on a shared
/// connection.
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Create or open the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            StorageError::Unavailable(format!(
                "Failed to open database {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::with_connection(conn)
    }

    /// Private, non-persistent database
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let result = tokio::task::spawn_blocking(move || f(&*conn.lock()))
            .await
            .map_err(|e| StorageError::Unavailable(format!("Storage task failed: {}", e)))?;
        Ok(result?)
    }
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<ProcessedRecord> {
    Ok(ProcessedRecord {
        id: row.get(0)?,
        road_state: row.get(1)?,
        x: row.get(2)?,
        y: row.get(3)?,
        z: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        timestamp: row.get(7)?,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, data: &ProcessedAgentData) -> StorageResult<ProcessedRecord> {
        let data = data.clone();
        self.run(move |conn| {
            let sample = &data.agent_data;
            conn.execute(
                "INSERT INTO processed_agent_data
                    (road_state, x, y, z, latitude, longitude, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    data.road_state,
                    sample.accelerometer.x,
                    sample.accelerometer.y,
                    sample.accelerometer.z,
                    sample.gps.latitude,
                    sample.gps.longitude,
                    sample.timestamp,
                ],
            )?;
            Ok(ProcessedRecord::from_data(conn.last_insert_rowid(), &data))
        })
        .await
    }

    async fn get(&self, id: i64) -> StorageResult<Option<ProcessedRecord>> {
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM processed_agent_data WHERE id = ?1", COLUMNS),
                params![id],
                read_record,
            )
            .optional()
        })
        .await
    }

    async fn list(&self) -> StorageResult<Vec<ProcessedRecord>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM processed_agent_data ORDER BY id",
                COLUMNS
            ))?;
            let records = stmt
                .query_map([], read_record)?
                .collect::<rusqlite::Result<Vec<_>>>();
            records
        })
        .await
    }

    async fn update(
        &self,
        id: i64,
        data: &ProcessedAgentData,
    ) -> StorageResult<Option<ProcessedRecord>> {
        let data = data.clone();
        self.run(move |conn| {
            let sample = &data.agent_data;
            let changed = conn.execute(
                "UPDATE processed_agent_data
                 SET road_state = ?1, x = ?2, y = ?3, z = ?4,
                     latitude = ?5, longitude = ?6, timestamp = ?7
                 WHERE id = ?8",
                params![
                    data.road_state,
                    sample.accelerometer.x,
                    sample.accelerometer.y,
                    sample.accelerometer.z,
                    sample.gps.latitude,
                    sample.gps.longitude,
                    sample.timestamp,
                    id,
                ],
            )?;
            Ok((changed > 0).then(|| ProcessedRecord::from_data(id, &data)))
        })
        .await
    }

    async fn delete(&self, id: i64) -> StorageResult<bool> {
        self.run(move |conn| {
            let changed = conn.execute(
                "DELETE FROM processed_agent_data WHERE id = ?1",
                params![id],
            )?;
            Ok(changed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use roadwatch_core::{AggregatedSample, MotionSample, PositionSample};

    fn data(road_state: &str, x: i32) -> ProcessedAgentData {
        ProcessedAgentData::new(
            road_state,
            AggregatedSample {
                accelerometer: MotionSample { x, y: 2, z: 16500 },
                gps: PositionSample {
                    latitude: 50.4501,
                    longitude: 30.5234,
                },
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            },
        )
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = SqliteRecordStore::in_memory().unwrap();

        let first = store.create(&data("normal", 1)).await.unwrap();
        let second = store.create(&data("pothole", 2)).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.road_state, "pothole");
    }

    #[tokio::test]
    async fn test_get_round_trips_fields() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let created = store.create(&data("normal", 7)).await.unwrap();

        let fetched = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.timestamp, data("normal", 7).agent_data.timestamp);
    }

    #[tokio::test]
    async fn test_list_in_id_order() {
        let store = SqliteRecordStore::in_memory().unwrap();
        for x in 1..=3 {
            store.create(&data("normal", x)).await.unwrap();
        }

        let xs: Vec<i32> = store.list().await.unwrap().iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_update_existing_and_missing() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let created = store.create(&data("normal", 1)).await.unwrap();

        let updated = store
            .update(created.id, &data("pothole", 9))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.x, 9);
        assert_eq!(store.get(created.id).await.unwrap().unwrap().road_state, "pothole");

        assert!(store.update(404, &data("normal", 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = SqliteRecordStore::in_memory().unwrap();
        assert!(!store.delete(12345).await.unwrap());

        let created = store.create(&data("normal", 1)).await.unwrap();
        assert!(store.delete(created.id).await.unwrap());
        assert!(!store.delete(created.id).await.unwrap());
        assert!(store.get(created.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_creates_get_distinct_ids() {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());

        let tasks: Vec<_> = (0..16)
            .map(|x| {
                let store = store.clone();
                tokio::spawn(async move { store.create(&data("normal", x)).await.unwrap().id })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort_unstable();

        assert_eq!(ids, (1..=16).collect::<Vec<i64>>());
        assert_eq!(store.list().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("roadwatch.db");

        {
            let store = SqliteRecordStore::open(&path).unwrap();
            store.create(&data("normal", 1)).await.unwrap();
        }

        let store = SqliteRecordStore::open(&path).unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
