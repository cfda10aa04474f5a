//! Confidence scoring.
//!
//! The scorer is injected so deployments can weight timing, geometry, and
//! transform availability however their environment demands. Whatever the
//! scorer returns, the bank clamps to [0, 1] before gating on
//! `min_confidence`.

use crate::config::BankConfig;
use crate::output::MovingObject;
use crate::transform::TransformStatus;

/// Pluggable confidence policy.
pub trait ConfidenceScorer {
    /// Score one candidate object.
    ///
    /// `dt` is the elapsed time between the oldest and newest slots in
    /// seconds, `old_seen_width` the object's apparent width at the oldest
    /// slot, and `transforms` the outcome of the six frame lookups.
    fn score(
        &self,
        object: &MovingObject,
        config: &BankConfig,
        dt: f32,
        old_seen_width: f32,
        transforms: &TransformStatus,
    ) -> f32;
}

/// Default policy: base confidence plus transform availability plus
/// apparent-width stability.
///
/// A perfectly observed object (all six lookups good, identical width at
/// both ends of the history) scores `base_confidence + 0.7`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScorer;

impl ConfidenceScorer for DefaultScorer {
    fn score(
        &self,
        object: &MovingObject,
        config: &BankConfig,
        _dt: f32,
        old_seen_width: f32,
        transforms: &TransformStatus,
    ) -> f32 {
        let transform_part = transforms.success_count() as f32 / 6.0;

        let widest = object.seen_width.max(old_seen_width);
        let width_part = if widest > 0.0 {
            object.seen_width.min(old_seen_width) / widest
        } else {
            1.0
        };

        config.base_confidence + 0.35 * transform_part + 0.35 * width_part
    }
}

/// Scorer wrapping a plain function, for quick experiments and tests.
pub struct FnScorer<F>(
    /// The wrapped scoring function
    pub F,
)
where
    F: Fn(&MovingObject, &BankConfig, f32, f32, &TransformStatus) -> f32;

impl<F> ConfidenceScorer for FnScorer<F>
where
    F: Fn(&MovingObject, &BankConfig, f32, f32, &TransformStatus) -> f32,
{
    fn score(
        &self,
        object: &MovingObject,
        config: &BankConfig,
        dt: f32,
        old_seen_width: f32,
        transforms: &TransformStatus,
    ) -> f32 {
        (self.0)(object, config, dt, old_seen_width, transforms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::FrameEstimate;
    use approx::assert_relative_eq;

    fn test_object(seen_width: f32) -> MovingObject {
        MovingObject {
            timestamp_us: 0,
            frame_id: "laser".to_string(),
            seen_width,
            angle_begin: 0.0,
            angle_end: 0.0,
            range_at_angle_begin: 0.0,
            range_at_angle_end: 0.0,
            distance: 0.0,
            closest_distance: 0.0,
            closest_angle: 0.0,
            sensor: FrameEstimate::default(),
            map: FrameEstimate::default(),
            fixed: FrameEstimate::default(),
            base: FrameEstimate::default(),
            confidence: 0.0,
        }
    }

    #[test]
    fn test_default_scorer_perfect_observation() {
        let config = BankConfig::default();
        let all_ok = TransformStatus {
            map_old: true,
            map_new: true,
            fixed_old: true,
            fixed_new: true,
            base_old: true,
            base_new: true,
        };
        let score = DefaultScorer.score(&test_object(0.5), &config, 1.0, 0.5, &all_ok);
        assert_relative_eq!(score, config.base_confidence + 0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_default_scorer_degrades_without_transforms() {
        let config = BankConfig::default();
        let none = TransformStatus::default();
        let all_ok = TransformStatus {
            map_old: true,
            map_new: true,
            fixed_old: true,
            fixed_new: true,
            base_old: true,
            base_new: true,
        };

        let object = test_object(0.5);
        let blind = DefaultScorer.score(&object, &config, 1.0, 0.5, &none);
        let sighted = DefaultScorer.score(&object, &config, 1.0, 0.5, &all_ok);
        assert!(blind < sighted);
    }

    #[test]
    fn test_default_scorer_penalizes_width_drift() {
        let config = BankConfig::default();
        let status = TransformStatus::default();

        let stable = DefaultScorer.score(&test_object(0.5), &config, 1.0, 0.5, &status);
        let drifted = DefaultScorer.score(&test_object(0.5), &config, 1.0, 1.5, &status);
        assert!(drifted < stable);
    }

    #[test]
    fn test_fn_scorer() {
        let scorer = FnScorer(|_: &MovingObject, _: &BankConfig, _, _, _: &TransformStatus| 0.42);
        let score = scorer.score(
            &test_object(0.1),
            &BankConfig::default(),
            1.0,
            0.1,
            &TransformStatus::default(),
        );
        assert_relative_eq!(score, 0.42, epsilon = 1e-6);
    }
}
