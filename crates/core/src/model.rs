//! Telemetry data model
//!
//! The same structs are used for the recorded-data replay, the wire format
//! between the agent and the store API, and the WebSocket broadcast, so the
//! serde field names follow the JSON shape:
//!
//! ```json
//! {
//!   "road_state": "normal",
//!   "agent_data": {
//!     "accelerometer": {"x": 1, "y": 2, "z": 16500},
//!     "gps": {"latitude": 50.45, "longitude": 30.52},
//!     "timestamp": "2024-03-01T12:00:00Z"
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accelerometer reading (raw axis counts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// One GPS fix in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
}

/// A motion/position pair stamped with its batch capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSample {
    pub accelerometer: MotionSample,
    pub gps: PositionSample,
    /// Shared by every sample of the batch this sample was read in
    pub timestamp: DateTime<Utc>,
}

/// Fixed-size group of samples produced by one `StreamSource::read` call
pub type Batch = Vec<AggregatedSample>;

/// A sample paired with its road-state label, as sent to the store API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedAgentData {
    pub road_state: String,
    pub agent_data: AggregatedSample,
}

impl ProcessedAgentData {
    pub fn new(road_state: impl Into<String>, agent_data: AggregatedSample) -> Self {
        Self {
            road_state: road_state.into(),
            agent_data,
        }
    }
}

/// Flat, persisted form of [`ProcessedAgentData`]
///
/// `id` is assigned by the store on insert and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub id: i64,
    pub road_state: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl ProcessedRecord {
    /// Flatten `data` into a record with the given identity
    pub fn from_data(id: i64, data: &ProcessedAgentData) -> Self {
        let sample = &data.agent_data;
        Self {
            id,
            road_state: data.road_state.clone(),
            x: sample.accelerometer.x,
            y: sample.accelerometer.y,
            z: sample.accelerometer.z,
            latitude: sample.gps.latitude,
            longitude: sample.gps.longitude,
            timestamp: sample.timestamp,
        }
    }

    /// Rebuild the nested wire form
    pub fn to_data(&self) -> ProcessedAgentData {
        ProcessedAgentData {
            road_state: self.road_state.clone(),
            agent_data: AggregatedSample {
                accelerometer: MotionSample {
                    x: self.x,
                    y: self.y,
                    z: self.z,
                },
                gps: PositionSample {
                    latitude: self.latitude,
                    longitude: self.longitude,
                },
                timestamp: self.timestamp,
            },
        }
    }
}
