//! Coordinate-frame transform lookup.
//!
//! The bank never computes transforms itself; it asks an injected provider
//! for the sensor pose in each external frame at the two timestamps of a
//! detection cycle. A failed lookup degrades that frame to sensor
//! coordinates instead of aborting the object.

use crate::core::math::Transform3;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Capability interface for frame transform lookup.
pub trait TransformProvider {
    /// Look up the transform taking points from `source_frame` into
    /// `target_frame` at `timestamp_us`, waiting at most `timeout`.
    fn lookup(
        &self,
        target_frame: &str,
        source_frame: &str,
        timestamp_us: u64,
        timeout: Duration,
    ) -> Result<Transform3>;
}

/// Provider backed by a fixed table of target-frame transforms.
///
/// Suitable for static sensor mounts and for tests; lookups ignore the
/// timestamp and timeout.
#[derive(Debug, Default)]
pub struct StaticTransformProvider {
    transforms: HashMap<String, Transform3>,
}

impl StaticTransformProvider {
    /// Empty table; every lookup fails until transforms are inserted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transform into `target_frame`.
    pub fn insert(&mut self, target_frame: impl Into<String>, transform: Transform3) {
        self.transforms.insert(target_frame.into(), transform);
    }
}

impl TransformProvider for StaticTransformProvider {
    fn lookup(
        &self,
        target_frame: &str,
        source_frame: &str,
        _timestamp_us: u64,
        _timeout: Duration,
    ) -> Result<Transform3> {
        self.transforms
            .get(target_frame)
            .copied()
            .ok_or_else(|| Error::TransformUnavailable {
                target: target_frame.to_string(),
                source_frame: source_frame.to_string(),
            })
    }
}

/// Which of the six per-cycle transform lookups succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformStatus {
    /// Map frame at the old timestamp
    pub map_old: bool,
    /// Map frame at the new timestamp
    pub map_new: bool,
    /// Fixed frame at the old timestamp
    pub fixed_old: bool,
    /// Fixed frame at the new timestamp
    pub fixed_new: bool,
    /// Base frame at the old timestamp
    pub base_old: bool,
    /// Base frame at the new timestamp
    pub base_new: bool,
}

impl TransformStatus {
    /// Number of successful lookups, out of six.
    pub fn success_count(&self) -> usize {
        [
            self.map_old,
            self.map_new,
            self.fixed_old,
            self.fixed_new,
            self.base_old,
            self.base_new,
        ]
        .iter()
        .filter(|&&ok| ok)
        .count()
    }
}
