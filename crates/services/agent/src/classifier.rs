//! Road state labelling
//!
//! A threshold on the vertical accelerometer axis: a sample whose `z` strays
//! from the resting reading by more than `bump_threshold` is labelled
//! [`POTHOLE`], everything else [`NORMAL`].

use roadwatch_core::{AggregatedSample, Batch, ProcessedAgentData};

pub const NORMAL: &str = "normal";
pub const POTHOLE: &str = "pothole";

/// Raw `z` reading of a device at rest (1 g at the ±2 g, 16-bit scale)
pub const GRAVITY_BASELINE: i32 = 16384;

pub const DEFAULT_BUMP_THRESHOLD: i32 = 4000;

#[derive(Debug, Clone, Copy)]
pub struct RoadStateClassifier {
    bump_threshold: i32,
}

impl RoadStateClassifier {
    pub fn new(bump_threshold: i32) -> Self {
        Self {
            bump_threshold: bump_threshold.max(0),
        }
    }

    pub fn label(&self, sample: &AggregatedSample) -> &'static str {
        let deviation = (i64::from(sample.accelerometer.z) - i64::from(GRAVITY_BASELINE)).abs();
        if deviation > i64::from(self.bump_threshold) {
            POTHOLE
        } else {
            NORMAL
        }
    }

    /// Label every sample of a batch, keeping its order
    pub fn classify(&self, batch: Batch) -> Vec<ProcessedAgentData> {
        batch
            .into_iter()
            .map(|sample| ProcessedAgentData::new(self.label(&sample), sample))
            .collect()
    }
}

impl Default for RoadStateClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_BUMP_THRESHOLD)
    }
}
