//! Displacement, velocity, and speed across reference frames.
//!
//! The oldest and newest positions of a tracked object are carried into
//! each external frame through the injected transform provider; a failed
//! lookup leaves that frame's motion in sensor coordinates rather than
//! dropping the object.

use crate::config::BankConfig;
use crate::core::math::Vec3;
use crate::output::FrameEstimate;
use crate::transform::{TransformProvider, TransformStatus};

/// Motion of one object within a single frame.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FrameMotion {
    pub old_position: Vec3,
    pub position: Vec3,
    pub closest_point: Vec3,
    pub velocity: Vec3,
    pub speed: f32,
    pub direction: Vec3,
}

impl FrameMotion {
    fn derive(old_position: Vec3, position: Vec3, closest_point: Vec3, dt: f32) -> Self {
        let velocity = (position - old_position).scale(1.0 / dt);
        let speed = velocity.norm();
        Self {
            old_position,
            position,
            closest_point,
            velocity,
            speed,
            direction: velocity.normalized(),
        }
    }

    pub fn to_estimate(self) -> FrameEstimate {
        FrameEstimate {
            position: self.position,
            velocity: self.velocity,
            speed: self.speed,
            velocity_normalized: self.direction,
            closest_point: self.closest_point,
        }
    }
}

/// Motion of one object in all four frames, plus lookup outcomes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ObjectKinematics {
    pub dt: f32,
    pub sensor: FrameMotion,
    pub map: FrameMotion,
    pub fixed: FrameMotion,
    pub base: FrameMotion,
    pub status: TransformStatus,
}

impl ObjectKinematics {
    /// Highest speed over the four frames.
    pub fn max_speed(&self) -> f32 {
        self.sensor
            .speed
            .max(self.map.speed)
            .max(self.fixed.speed)
            .max(self.base.speed)
    }
}

/// Derive per-frame motion for one tracked object.
///
/// `old_point`, `new_point`, and `closest_point` are sensor-frame
/// positions; `dt` must be positive.
#[allow(clippy::too_many_arguments)]
pub(crate) fn derive_kinematics(
    provider: &dyn TransformProvider,
    config: &BankConfig,
    sensor_frame: &str,
    old_timestamp_us: u64,
    new_timestamp_us: u64,
    old_point: Vec3,
    new_point: Vec3,
    closest_point: Vec3,
    dt: f32,
) -> ObjectKinematics {
    let sensor = FrameMotion::derive(old_point, new_point, closest_point, dt);

    let mut status = TransformStatus::default();
    let carry = |target: &str, old_ok: &mut bool, new_ok: &mut bool| -> FrameMotion {
        let timeout = config.transform_timeout();
        let old = provider.lookup(target, sensor_frame, old_timestamp_us, timeout);
        let new = provider.lookup(target, sensor_frame, new_timestamp_us, timeout);
        *old_ok = old.is_ok();
        *new_ok = new.is_ok();

        match (old, new) {
            (Ok(t_old), Ok(t_new)) => FrameMotion::derive(
                t_old.apply(old_point),
                t_new.apply(new_point),
                t_new.apply(closest_point),
                dt,
            ),
            _ => {
                log::warn!(
                    "transform {target} <- {sensor_frame} unavailable, \
                     falling back to sensor coordinates"
                );
                sensor
            }
        }
    };

    let map = carry(&config.map_frame, &mut status.map_old, &mut status.map_new);
    let fixed = carry(
        &config.fixed_frame,
        &mut status.fixed_old,
        &mut status.fixed_new,
    );
    let base = carry(
        &config.base_frame,
        &mut status.base_old,
        &mut status.base_new,
    );

    ObjectKinematics {
        dt,
        sensor,
        map,
        fixed,
        base,
        status,
    }
}
