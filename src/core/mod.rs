//! Foundation types and math shared by every layer.

pub mod math;
pub mod types;

pub use math::{polar_point, seen_width, Transform3, Vec3};
pub use types::{FrameKind, RangeScan};
