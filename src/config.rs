//! Bank configuration.
//!
//! Loads from TOML with per-field defaults. All values are checked once by
//! [`BankConfig::validate`] before a bank is built; invalid values are fatal
//! at that point rather than failing per-message.

use crate::core::types::FrameKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Thresholds and geometry for one scan bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankConfig {
    /// EMA weighting coefficient in [0, 1]. 1.0 disables smoothing.
    #[serde(default = "defaults::ema_alpha")]
    pub ema_alpha: f32,

    /// Number of scans held in the bank. At least 2, otherwise velocities
    /// cannot be derived.
    #[serde(default = "defaults::depth")]
    pub depth: usize,

    /// Angular resolution of each stored scan.
    #[serde(default = "defaults::points_per_scan")]
    pub points_per_scan: usize,

    /// Start of the angular window in radians, within [-PI, PI].
    #[serde(default = "defaults::angle_min")]
    pub angle_min: f32,

    /// End of the angular window in radians, within [angle_min, PI].
    #[serde(default = "defaults::angle_max")]
    pub angle_max: f32,

    /// Maximum range difference between neighbouring points of one object.
    #[serde(default = "defaults::edge_max_delta_range")]
    pub edge_max_delta_range: f32,

    /// Minimum width of a reported object, in points.
    #[serde(default = "defaults::min_points")]
    pub min_points: usize,

    /// Ranges beyond this are not considered object candidates.
    #[serde(default = "defaults::max_distance")]
    pub max_distance: f32,

    /// Minimum speed (in any frame) for an object to be reported.
    #[serde(default = "defaults::min_speed")]
    pub min_speed: f32,

    /// Maximum width drift, in points, between tracked levels.
    #[serde(default = "defaults::max_delta_width_points")]
    pub max_delta_width_points: usize,

    /// Minimum confidence for an object to be reported, in [0, 1].
    #[serde(default = "defaults::min_confidence")]
    pub min_confidence: f32,

    /// Maximum mean-range drift between tracked levels, in meters.
    #[serde(default = "defaults::tracking_max_delta_distance")]
    pub tracking_max_delta_distance: f32,

    /// Consecutive failed levels tolerated before a track is abandoned.
    #[serde(default)]
    pub tracking_miss_tolerance: usize,

    /// Base value the default confidence scorer starts from.
    #[serde(default = "defaults::base_confidence")]
    pub base_confidence: f32,

    /// Global map frame name
    #[serde(default = "defaults::map_frame")]
    pub map_frame: String,

    /// Fixed odometry frame name
    #[serde(default = "defaults::fixed_frame")]
    pub fixed_frame: String,

    /// Robot base frame name
    #[serde(default = "defaults::base_frame")]
    pub base_frame: String,

    /// Timeout for each transform lookup, in seconds.
    #[serde(default = "defaults::transform_timeout_sec")]
    pub transform_timeout_sec: f32,

    /// Point-cloud ingestion settings
    #[serde(default)]
    pub cloud: CloudSection,

    /// Derived output settings
    #[serde(default)]
    pub output: OutputSection,
}

/// Settings for the binary point-cloud adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudSection {
    /// Field name carrying the x coordinate
    #[serde(default = "defaults::x_field")]
    pub x_field: String,

    /// Field name carrying the y coordinate
    #[serde(default = "defaults::y_field")]
    pub y_field: String,

    /// Field name carrying the z coordinate
    #[serde(default = "defaults::z_field")]
    pub z_field: String,

    /// Voxel leaf size in meters; controls how many angular bins a single
    /// point spreads into.
    #[serde(default = "defaults::voxel_leaf_size")]
    pub voxel_leaf_size: f32,

    /// Points below this z are discarded.
    #[serde(default = "defaults::z_min")]
    pub z_min: f32,

    /// Points above this z are discarded.
    #[serde(default = "defaults::z_max")]
    pub z_max: f32,
}

impl Default for CloudSection {
    fn default() -> Self {
        Self {
            x_field: defaults::x_field(),
            y_field: defaults::y_field(),
            z_field: defaults::z_field(),
            voxel_leaf_size: defaults::voxel_leaf_size(),
            z_min: defaults::z_min(),
            z_max: defaults::z_max(),
        }
    }
}

/// Which derived outputs a detection cycle assembles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Attach the smoothed newest profile with object spans highlighted.
    #[serde(default)]
    pub publish_ema: bool,

    /// Attach the persistent closest-point profile.
    #[serde(default)]
    pub publish_closest_points: bool,

    /// Attach one velocity arrow per object.
    #[serde(default)]
    pub publish_velocity_arrows: bool,

    /// Attach one delta-position line per object.
    #[serde(default)]
    pub publish_delta_lines: bool,

    /// Frame the velocity arrows are expressed in.
    #[serde(default = "defaults::marker_frame")]
    pub velocity_arrow_frame: FrameKind,

    /// Frame the delta-position lines are expressed in.
    #[serde(default = "defaults::marker_frame")]
    pub delta_line_frame: FrameKind,

    /// Stretch arrow shading over [min_confidence, 1] instead of [0, 1].
    #[serde(default)]
    pub arrows_full_gray_scale: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            publish_ema: false,
            publish_closest_points: false,
            publish_velocity_arrows: false,
            publish_delta_lines: false,
            velocity_arrow_frame: defaults::marker_frame(),
            delta_line_frame: defaults::marker_frame(),
            arrows_full_gray_scale: false,
        }
    }
}

mod defaults {
    use crate::core::types::FrameKind;
    use std::f32::consts::PI;

    pub fn ema_alpha() -> f32 {
        1.0
    }
    pub fn depth() -> usize {
        11
    }
    pub fn points_per_scan() -> usize {
        360
    }
    pub fn angle_min() -> f32 {
        -PI
    }
    pub fn angle_max() -> f32 {
        PI
    }
    pub fn edge_max_delta_range() -> f32 {
        0.15
    }
    pub fn min_points() -> usize {
        5
    }
    pub fn max_distance() -> f32 {
        6.5
    }
    pub fn min_speed() -> f32 {
        0.03
    }
    pub fn max_delta_width_points() -> usize {
        5
    }
    pub fn min_confidence() -> f32 {
        0.67
    }
    pub fn tracking_max_delta_distance() -> f32 {
        0.2
    }
    pub fn base_confidence() -> f32 {
        0.3
    }
    pub fn map_frame() -> String {
        "map".to_string()
    }
    pub fn fixed_frame() -> String {
        "odom".to_string()
    }
    pub fn base_frame() -> String {
        "base_link".to_string()
    }
    pub fn transform_timeout_sec() -> f32 {
        1.0
    }
    pub fn x_field() -> String {
        "x".to_string()
    }
    pub fn y_field() -> String {
        "y".to_string()
    }
    pub fn z_field() -> String {
        "z".to_string()
    }
    pub fn voxel_leaf_size() -> f32 {
        0.02
    }
    pub fn z_min() -> f32 {
        0.1
    }
    pub fn z_max() -> f32 {
        1.0
    }
    pub fn marker_frame() -> FrameKind {
        FrameKind::Map
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            ema_alpha: defaults::ema_alpha(),
            depth: defaults::depth(),
            points_per_scan: defaults::points_per_scan(),
            angle_min: defaults::angle_min(),
            angle_max: defaults::angle_max(),
            edge_max_delta_range: defaults::edge_max_delta_range(),
            min_points: defaults::min_points(),
            max_distance: defaults::max_distance(),
            min_speed: defaults::min_speed(),
            max_delta_width_points: defaults::max_delta_width_points(),
            min_confidence: defaults::min_confidence(),
            tracking_max_delta_distance: defaults::tracking_max_delta_distance(),
            tracking_miss_tolerance: 0,
            base_confidence: defaults::base_confidence(),
            map_frame: defaults::map_frame(),
            fixed_frame: defaults::fixed_frame(),
            base_frame: defaults::base_frame(),
            transform_timeout_sec: defaults::transform_timeout_sec(),
            cloud: CloudSection::default(),
            output: OutputSection::default(),
        }
    }
}

impl BankConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: BankConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Timeout for a single transform lookup.
    pub fn transform_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.transform_timeout_sec.max(0.0))
    }

    /// Check all general values. Called once when a bank is built.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ema_alpha) {
            return Err(Error::InvalidConfig(
                "ema_alpha must be in [0, 1]".to_string(),
            ));
        }
        if self.depth < 2 {
            return Err(Error::InvalidConfig(
                "depth must be at least 2, otherwise velocities cannot be derived".to_string(),
            ));
        }
        if self.points_per_scan < 1 {
            return Err(Error::InvalidConfig(
                "points_per_scan must be at least 1".to_string(),
            ));
        }
        if !(-PI..=PI).contains(&self.angle_min) || self.angle_min > self.angle_max {
            return Err(Error::InvalidConfig(
                "angle_min must be in [-PI, angle_max]".to_string(),
            ));
        }
        if self.angle_max > PI {
            return Err(Error::InvalidConfig(
                "angle_max must be in [angle_min, PI]".to_string(),
            ));
        }
        if self.edge_max_delta_range < 0.0 {
            return Err(Error::InvalidConfig(
                "edge_max_delta_range cannot be negative".to_string(),
            ));
        }
        if self.min_points < 1 {
            return Err(Error::InvalidConfig(
                "an object must consist of at least 1 point".to_string(),
            ));
        }
        if self.max_distance < 0.0 {
            return Err(Error::InvalidConfig(
                "max_distance cannot be negative".to_string(),
            ));
        }
        if self.min_speed < 0.0 {
            return Err(Error::InvalidConfig(
                "min_speed cannot be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidConfig(
                "min_confidence must be in [0, 1]".to_string(),
            ));
        }
        if self.tracking_max_delta_distance < 0.0 {
            return Err(Error::InvalidConfig(
                "tracking_max_delta_distance cannot be negative".to_string(),
            ));
        }
        if self.map_frame.is_empty() {
            return Err(Error::InvalidConfig("map_frame must be set".to_string()));
        }
        if self.fixed_frame.is_empty() {
            return Err(Error::InvalidConfig("fixed_frame must be set".to_string()));
        }
        if self.base_frame.is_empty() {
            return Err(Error::InvalidConfig("base_frame must be set".to_string()));
        }
        if self.transform_timeout_sec < 0.0 {
            return Err(Error::InvalidConfig(
                "transform_timeout_sec cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Extra checks for the point-cloud path. Called on first cloud message.
    pub fn validate_cloud(&self) -> Result<()> {
        if self.cloud.x_field.is_empty()
            || self.cloud.y_field.is_empty()
            || self.cloud.z_field.is_empty()
        {
            return Err(Error::InvalidConfig(
                "cloud coordinate field names must be set".to_string(),
            ));
        }
        if self.cloud.voxel_leaf_size < 0.0 {
            return Err(Error::InvalidConfig(
                "voxel_leaf_size cannot be negative".to_string(),
            ));
        }
        if self.cloud.z_min > self.cloud.z_max {
            return Err(Error::InvalidConfig(
                "cloud z band is empty (z_min > z_max)".to_string(),
            ));
        }
        Ok(())
    }
}
