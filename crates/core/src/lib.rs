//! Roadwatch core
//!
//! Shared data model and the recorded-data replay source for the Roadwatch
//! road-condition telemetry pipeline:
//!
//! ```text
//! StreamSource ──▶ StoreApiAdapter ──HTTP──▶ IngestionGateway ──▶ SubscriptionHub ──WS──▶ observers
//! (this crate)     (roadwatch-http)          (roadwatch-store)
//! ```

pub mod clock;
pub mod error;
pub mod model;
pub mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use model::{
    AggregatedSample, Batch, MotionSample, PositionSample, ProcessedAgentData, ProcessedRecord,
};
pub use source::{SourceConfig, SourceState, StreamSource};
