//! Roadwatch store API
//!
//! Receives labelled telemetry batches over HTTP, persists them record by
//! record, and pushes every successfully stored batch to the WebSocket
//! observers connected at that moment.
//!
//! # Architecture
//!
//! ```text
//! agent --POST /processed_agent_data/--> api --> IngestionGateway --> RecordStore (SQLite)
//!                                                      |
//!                                                      v
//!                                               SubscriptionHub --> /ws/ observers
//! ```

pub mod api;
pub mod config;
pub mod gateway;
pub mod hub;
pub mod storage;

pub use config::Config;
pub use gateway::{GatewayError, IngestOutcome, IngestionGateway};
pub use hub::{BroadcastReport, HubConfig, ObserverHandle, SubscriptionHub};
pub use storage::{RecordStore, SqliteRecordStore, StorageError};
