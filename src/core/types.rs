//! Input message and frame types.

use serde::{Deserialize, Serialize};

/// A single angular range profile from a 2D lidar.
///
/// The direct ingestion path copies `ranges` verbatim into the bank, so
/// its length must match the bank's configured points-per-scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeScan {
    /// Sensor frame the ranges are expressed in
    pub frame_id: String,
    /// Acquisition time in microseconds since epoch
    pub timestamp_us: u64,
    /// Start angle in radians
    pub angle_min: f32,
    /// End angle in radians
    pub angle_max: f32,
    /// Angular resolution (radians between consecutive readings)
    pub angle_increment: f32,
    /// Minimum valid range in meters
    pub range_min: f32,
    /// Maximum valid range in meters
    pub range_max: f32,
    /// Range measurements in meters
    pub ranges: Vec<f32>,
}

impl RangeScan {
    /// Number of range measurements.
    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if scan is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Reference frames an object estimate can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// The sensor's own frame
    Sensor,
    /// Global map frame
    Map,
    /// Fixed odometry frame
    Fixed,
    /// Robot base frame
    Base,
}
