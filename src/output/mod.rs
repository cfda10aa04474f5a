//! Detection reports and derived visualization products.
//!
//! One [`DetectionReport`] is assembled per detection cycle and handed to
//! whatever [`OutputSink`] the application wires up. The derived profiles
//! and markers are attached only when enabled in the output configuration.

use crate::core::math::Vec3;
use crate::core::types::FrameKind;
use serde::{Deserialize, Serialize};

/// Position and motion of one object expressed in a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameEstimate {
    /// Object position at the newest timestamp
    pub position: Vec3,
    /// Velocity between the oldest and newest timestamps
    pub velocity: Vec3,
    /// Euclidean norm of the velocity
    pub speed: f32,
    /// Velocity direction; the zero vector when speed is zero
    pub velocity_normalized: Vec3,
    /// Closest point of the object at the newest timestamp
    pub closest_point: Vec3,
}

/// One moving object accepted by a detection cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingObject {
    /// Newest-slot timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// Sensor frame the raw measurements came from
    pub frame_id: String,
    /// Apparent width of the object in meters (law of cosines)
    pub seen_width: f32,
    /// Angle of the object's first point, radians
    pub angle_begin: f32,
    /// Angle of the object's last point, radians
    pub angle_end: f32,
    /// Range at `angle_begin`
    pub range_at_angle_begin: f32,
    /// Range at `angle_end`
    pub range_at_angle_end: f32,
    /// Mean range over the object
    pub distance: f32,
    /// Smallest range over the object
    pub closest_distance: f32,
    /// Angle at which `closest_distance` was seen
    pub closest_angle: f32,
    /// Estimate in the sensor frame
    pub sensor: FrameEstimate,
    /// Estimate in the map frame (sensor coordinates when lookups failed)
    pub map: FrameEstimate,
    /// Estimate in the fixed frame
    pub fixed: FrameEstimate,
    /// Estimate in the base frame
    pub base: FrameEstimate,
    /// Clamped confidence in [0, 1]
    pub confidence: f32,
}

impl MovingObject {
    /// Estimate for the given frame.
    pub fn estimate(&self, frame: FrameKind) -> &FrameEstimate {
        match frame {
            FrameKind::Sensor => &self.sensor,
            FrameKind::Map => &self.map,
            FrameKind::Fixed => &self.fixed,
            FrameKind::Base => &self.base,
        }
    }

    /// Highest speed over the four frames.
    pub fn max_speed(&self) -> f32 {
        self.sensor
            .speed
            .max(self.map.speed)
            .max(self.fixed.speed)
            .max(self.base.speed)
    }
}

/// Smoothed newest profile with reported object spans highlighted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmaProfile {
    /// Sensor frame
    pub frame_id: String,
    /// Newest-slot timestamp
    pub timestamp_us: u64,
    /// Start angle in radians
    pub angle_min: f32,
    /// Angular resolution in radians
    pub angle_increment: f32,
    /// Smoothed ranges
    pub ranges: Vec<f32>,
    /// Object mask: spans of reported objects carry a non-zero intensity
    pub intensities: Vec<f32>,
}

/// Angular profile marking each reported object's closest point.
///
/// Unmarked bins hold a sentinel range beyond the sensor maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosestPointProfile {
    /// Sensor frame
    pub frame_id: String,
    /// Newest-slot timestamp
    pub timestamp_us: u64,
    /// Start angle in radians
    pub angle_min: f32,
    /// Angular resolution in radians
    pub angle_increment: f32,
    /// Sentinel everywhere except at closest-point bins
    pub ranges: Vec<f32>,
    /// Non-zero at closest-point bins
    pub intensities: Vec<f32>,
}

/// Arrow from an object's position to position + velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityArrow {
    /// Index of the object within the report
    pub id: usize,
    /// Frame the points are expressed in
    pub frame_id: String,
    /// Gray shade derived from confidence, in [0, 1]
    pub shade: f32,
    /// Arrow tail (position) and tip (position + velocity)
    pub points: [Vec3; 2],
}

/// Line from an object's old position to its new position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaPositionLine {
    /// Index of the object within the report
    pub id: usize,
    /// Frame the points are expressed in
    pub frame_id: String,
    /// Old and new positions
    pub points: [Vec3; 2],
}

/// Everything one detection cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Monotonically increasing cycle number
    pub seq: u64,
    /// Newest-slot timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// Sensor frame
    pub frame_id: String,
    /// Accepted objects in angular order
    pub objects: Vec<MovingObject>,
    /// Present when `publish_ema` is enabled
    pub ema: Option<EmaProfile>,
    /// Present when `publish_closest_points` is enabled
    pub closest_points: Option<ClosestPointProfile>,
    /// One arrow per object when `publish_velocity_arrows` is enabled
    pub velocity_arrows: Vec<VelocityArrow>,
    /// One line per object when `publish_delta_lines` is enabled
    pub delta_lines: Vec<DeltaPositionLine>,
}

/// Consumer of detection reports.
pub trait OutputSink {
    /// Hand over one cycle's report.
    fn publish(&mut self, report: &DetectionReport);
}

/// Sink forwarding reports over a crossbeam channel.
pub struct ChannelSink {
    tx: crossbeam_channel::Sender<DetectionReport>,
}

impl ChannelSink {
    /// Wrap a sender.
    pub fn new(tx: crossbeam_channel::Sender<DetectionReport>) -> Self {
        Self { tx }
    }
}

impl OutputSink for ChannelSink {
    fn publish(&mut self, report: &DetectionReport) {
        if let Err(e) = self.tx.try_send(report.clone()) {
            log::warn!("dropping detection report {}: {e}", report.seq);
        }
    }
}
