//! Geometry primitives for object kinematics.

use serde::{Deserialize, Serialize};

/// A 3D vector in meters.
///
/// Lidar returns live in the sensor's x/y plane (z = 0); the z component
/// becomes meaningful after transformation into an external frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X coordinate in meters (forward)
    pub x: f32,
    /// Y coordinate in meters (left)
    pub y: f32,
    /// Z coordinate in meters (up)
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector.
    #[inline]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Euclidean norm.
    #[inline]
    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in this direction, or the zero vector when the norm
    /// is exactly zero.
    #[inline]
    pub fn normalized(&self) -> Vec3 {
        let n = self.norm();
        if n > 0.0 {
            Vec3::new(self.x / n, self.y / n, self.z / n)
        } else {
            Vec3::zero()
        }
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(&self, s: f32) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;

    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;

    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Rigid transform between two coordinate frames.
///
/// Row-major rotation matrix plus translation. Applied as
/// `p' = R * p + t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3 {
    /// Rotation matrix, row-major
    pub rotation: [[f32; 3]; 3],
    /// Translation in meters
    pub translation: Vec3,
}

impl Transform3 {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: Vec3::zero(),
        }
    }

    /// Planar transform: rotation by `theta` about the z axis plus an
    /// (x, y) translation. Covers the common ground-robot case.
    pub fn planar(x: f32, y: f32, theta: f32) -> Self {
        let (sin_t, cos_t) = theta.sin_cos();
        Self {
            rotation: [
                [cos_t, -sin_t, 0.0],
                [sin_t, cos_t, 0.0],
                [0.0, 0.0, 1.0],
            ],
            translation: Vec3::new(x, y, 0.0),
        }
    }

    /// Pure translation.
    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            rotation: Transform3::identity().rotation,
            translation: Vec3::new(x, y, z),
        }
    }

    /// Transform a point from the source frame into the target frame.
    #[inline]
    pub fn apply(&self, p: Vec3) -> Vec3 {
        let r = &self.rotation;
        Vec3::new(
            r[0][0] * p.x + r[0][1] * p.y + r[0][2] * p.z + self.translation.x,
            r[1][0] * p.x + r[1][1] * p.y + r[1][2] * p.z + self.translation.y,
            r[2][0] * p.x + r[2][1] * p.y + r[2][2] * p.z + self.translation.z,
        )
    }
}

impl Default for Transform3 {
    fn default() -> Self {
        Self::identity()
    }
}

/// Apparent width of an arc seen between two ranges separated by
/// `span` radians, via the law of cosines.
#[inline]
pub fn seen_width(range_a: f32, range_b: f32, span: f32) -> f32 {
    (range_a * range_a + range_b * range_b - 2.0 * range_a * range_b * span.cos())
        .max(0.0)
        .sqrt()
}

/// Point on the sensor x/y plane at the given polar coordinates.
#[inline]
pub fn polar_point(range: f32, angle: f32) -> Vec3 {
    Vec3::new(range * angle.cos(), range * angle.sin(), 0.0)
}
