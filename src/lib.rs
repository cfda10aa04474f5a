//! gati-track - Moving-object detection from 2D lidar range profiles
//!
//! Maintains a fixed-depth bank of EMA-smoothed angular range profiles per
//! sensor stream and extracts moving objects with position, velocity, and a
//! confidence score in up to four reference frames.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    output/                          │  ← Reports, markers, sinks
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     bank/                           │  ← Buffer, segmentation,
//! │     (buffer, segmentation, tracking, kinematics)    │    tracking, kinematics
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │              cloud/   transform   confidence        │  ← Adapters and injected
//! │                                                     │    collaborators
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                 core/  config  error                │  ← Foundation
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Processing model
//!
//! Single-threaded and synchronous: one [`ScanBank`] per sensor stream,
//! each reading fully ingested before the next, each detection cycle run
//! to completion before the next call. Banks share no state; distinct
//! sensors may run on distinct threads.
//!
//! # Quick start
//!
//! ```rust
//! use gati_track::{
//!     BankConfig, DefaultScorer, RangeScan, ScanBank, StaticTransformProvider, Transform3,
//! };
//!
//! let config = BankConfig {
//!     depth: 3,
//!     points_per_scan: 8,
//!     min_points: 2,
//!     min_confidence: 0.0,
//!     ..Default::default()
//! };
//! let mut bank = ScanBank::new(config)?;
//!
//! let mut transforms = StaticTransformProvider::new();
//! transforms.insert("map", Transform3::identity());
//! transforms.insert("odom", Transform3::identity());
//! transforms.insert("base_link", Transform3::identity());
//!
//! for n in 0..3u64 {
//!     let range = 2.0 - n as f32 * 0.1;
//!     bank.observe_scan(&RangeScan {
//!         frame_id: "laser".to_string(),
//!         timestamp_us: 1_000_000 + n * 100_000,
//!         angle_min: -0.5,
//!         angle_max: 0.5,
//!         angle_increment: 1.0 / 7.0,
//!         range_min: 0.1,
//!         range_max: 10.0,
//!         ranges: vec![range; 8],
//!     })?;
//! }
//!
//! let report = bank.detect(&transforms, &DefaultScorer)?;
//! for object in &report.objects {
//!     println!("object at {:.2} m moving {:.2} m/s", object.distance, object.sensor.speed);
//! }
//! # Ok::<(), gati_track::Error>(())
//! ```

#![warn(missing_docs)]

// ============================================================================
// Foundation (no internal deps)
// ============================================================================
pub mod config;
pub mod core;
pub mod error;

// ============================================================================
// Adapters and injected collaborators
// ============================================================================
pub mod cloud;
pub mod confidence;
pub mod transform;

// ============================================================================
// The bank and its algorithms
// ============================================================================
pub mod bank;

// ============================================================================
// Report assembly
// ============================================================================
pub mod output;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

pub use config::{BankConfig, CloudSection, OutputSection};
pub use error::{Error, Result};

pub use core::math::{Transform3, Vec3};
pub use core::types::{FrameKind, RangeScan};

pub use cloud::{FieldType, PointCloudMsg, PointField};

pub use bank::segmentation::Segment;
pub use bank::tracking::TrackedSegment;
pub use bank::ScanBank;

pub use confidence::{ConfidenceScorer, DefaultScorer, FnScorer};
pub use transform::{StaticTransformProvider, TransformProvider, TransformStatus};

pub use output::{
    ChannelSink, ClosestPointProfile, DeltaPositionLine, DetectionReport, EmaProfile,
    FrameEstimate, MovingObject, OutputSink, VelocityArrow,
};
