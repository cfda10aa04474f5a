//! The scan bank: bounded history plus the detection cycle.
//!
//! A bank owns a circular buffer of EMA-smoothed range profiles fed by one
//! sensor stream. Scans enter through one of two adapters (direct angular
//! copy, or binary point-cloud decode with angular binning); a detection
//! cycle segments the newest profile, tracks each segment backward through
//! the whole history, derives per-frame kinematics, and assembles a report.
//!
//! One bank per sensor; calls must be serialized by the caller. Banks share
//! no state with each other.

mod buffer;
mod kinematics;
pub mod segmentation;
pub mod tracking;

use crate::cloud::{bin_points, CloudLayout, PointCloudMsg};
use crate::config::BankConfig;
use crate::confidence::ConfidenceScorer;
use crate::core::math::{polar_point, seen_width};
use crate::core::types::{FrameKind, RangeScan};
use crate::error::{Error, Result};
use crate::output::{
    ClosestPointProfile, DeltaPositionLine, DetectionReport, EmaProfile, MovingObject,
    VelocityArrow,
};
use crate::transform::TransformProvider;

use buffer::ScanBuffer;
use kinematics::{derive_kinematics, FrameMotion, ObjectKinematics};
use segmentation::{segment_scan, RangeBounds, Segment};
use tracking::{track_back, TrackParams};

/// Margin added to the maximum accepted range to form the "no point seen"
/// sentinel.
const SENTINEL_MARGIN: f32 = 10.0;

/// Intensity marking reported object spans in the EMA profile.
const EMA_OBJECT_INTENSITY: f32 = 300.0;

/// Intensity marking closest points in the closest-point profile.
const CLOSEST_POINT_INTENSITY: f32 = 1000.0;

/// Bounded scan history with moving-object extraction.
pub struct ScanBank {
    config: BankConfig,
    buffer: ScanBuffer,
    sensor_frame: String,
    angle_min: f32,
    angle_increment: f32,
    sensor_range_min: f32,
    sensor_range_max: f32,
    cloud_layout: Option<CloudLayout>,
    closest_ranges: Vec<f32>,
    closest_intensities: Vec<f32>,
    seq: u64,
}

impl ScanBank {
    /// Build a bank for one sensor stream.
    ///
    /// Fails fast on invalid configuration; nothing is processed before
    /// every value has been checked.
    pub fn new(config: BankConfig) -> Result<Self> {
        config.validate()?;
        let buffer = ScanBuffer::new(config.depth, config.points_per_scan);
        Ok(Self {
            buffer,
            sensor_frame: String::new(),
            angle_min: config.angle_min,
            angle_increment: 0.0,
            sensor_range_min: 0.0,
            sensor_range_max: 0.0,
            cloud_layout: None,
            closest_ranges: Vec::new(),
            closest_intensities: Vec::new(),
            seq: 0,
            config,
        })
    }

    /// The configuration this bank was built with.
    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    /// True once `depth` scans have been observed and objects can be
    /// reported.
    pub fn is_filled(&self) -> bool {
        self.buffer.is_filled()
    }

    /// Sequence number of the last assembled report.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Ingest an already-angular scan.
    ///
    /// The profile is smoothed against the newest slot and written into
    /// the put slot; the very first scan is stored as-is and also fixes
    /// the sensor frame, angular geometry, and range bounds for the
    /// bank's lifetime.
    pub fn observe_scan(&mut self, scan: &RangeScan) -> Result<()> {
        if scan.ranges.len() != self.config.points_per_scan {
            return Err(Error::ScanLengthMismatch {
                expected: self.config.points_per_scan,
                actual: scan.ranges.len(),
            });
        }

        if !self.buffer.is_started() {
            self.sensor_frame = scan.frame_id.clone();
            self.angle_min = scan.angle_min;
            self.angle_increment = scan.angle_increment;
            self.sensor_range_min = scan.range_min;
            self.sensor_range_max = scan.range_max;
            self.reset_closest_profile();

            let slot = self.buffer.put_slot_mut();
            slot.timestamp_us = scan.timestamp_us;
            slot.ranges.copy_from_slice(&scan.ranges);
            self.buffer.init_indices();
            log::debug!(
                "bank started from scan in frame '{}', {} points",
                self.sensor_frame,
                scan.ranges.len()
            );
            return Ok(());
        }

        self.buffer
            .write_smoothed(scan.timestamp_us, &scan.ranges, self.config.ema_alpha);
        self.buffer.advance();
        Ok(())
    }

    /// Ingest a binary point-cloud message.
    ///
    /// Points are decoded through the cached field layout, filtered to the
    /// configured z band, and reduced to an angular profile with nearest-
    /// range occlusion. Returns the number of accepted points;
    /// [`Error::NoPointsIngested`] means the message was discarded and the
    /// bank is unchanged.
    pub fn observe_cloud(&mut self, msg: &PointCloudMsg) -> Result<usize> {
        let layout = match self.cloud_layout {
            Some(layout) => layout,
            None => {
                self.config.validate_cloud()?;
                let layout = CloudLayout::resolve(&self.config, msg)?;
                self.cloud_layout = Some(layout);
                layout
            }
        };
        let sentinel = self.config.max_distance + SENTINEL_MARGIN;

        if !self.buffer.is_started() {
            self.sensor_frame = msg.frame_id.clone();
            self.angle_min = self.config.angle_min;
            self.angle_increment = if self.config.points_per_scan > 1 {
                (self.config.angle_max - self.config.angle_min)
                    / (self.config.points_per_scan - 1) as f32
            } else {
                0.0
            };
            self.sensor_range_min = 0.01;
            self.sensor_range_max = self.config.max_distance;
            self.reset_closest_profile();
        }

        self.buffer.reset_put(sentinel);
        let accepted = {
            let slot = self.buffer.put_slot_mut();
            slot.timestamp_us = msg.timestamp_us;
            bin_points(&self.config, &layout, msg, &mut slot.ranges)?
        };
        if accepted == 0 {
            log::debug!("cloud message yielded no points inside the z band, discarding");
            return Err(Error::NoPointsIngested);
        }

        if self.buffer.is_started() {
            self.buffer.ema_put(self.config.ema_alpha);
            self.buffer.advance();
        } else {
            self.buffer.init_indices();
            log::debug!(
                "bank started from cloud in frame '{}', {accepted} points",
                self.sensor_frame
            );
        }
        Ok(accepted)
    }

    /// Run one detection cycle over the current history.
    ///
    /// Segments the newest profile, tracks every accepted segment back to
    /// the oldest slot, derives kinematics across frames, scores
    /// confidence, and assembles the report together with whatever derived
    /// outputs are enabled.
    pub fn detect(
        &mut self,
        transforms: &dyn TransformProvider,
        scorer: &dyn ConfidenceScorer,
    ) -> Result<DetectionReport> {
        if !self.buffer.is_filled() {
            log::warn!("bank is not filled yet, cannot report objects");
            return Err(Error::BankNotFilled);
        }

        let bounds = RangeBounds {
            min: self.sensor_range_min,
            max: self.sensor_range_max.min(self.config.max_distance),
        };
        let params = TrackParams {
            bounds,
            edge_max_delta: self.config.edge_max_delta_range,
            min_points: self.config.min_points,
            max_delta_width: self.config.max_delta_width_points,
            max_delta_distance: self.config.tracking_max_delta_distance,
            miss_tolerance: self.config.tracking_miss_tolerance,
        };

        let new_timestamp_us = self.buffer.newest().timestamp_us;
        let old_timestamp_us = self.buffer.slot(self.buffer.put_index()).timestamp_us;
        let dt = new_timestamp_us.saturating_sub(old_timestamp_us) as f32 / 1e6;

        let segments = segment_scan(
            &self.buffer.newest().ranges,
            bounds,
            self.config.edge_max_delta_range,
            self.config.min_points,
        );
        log::debug!("{} candidate segment(s) in newest scan", segments.len());

        let mut accepted: Vec<(Segment, MovingObject, ObjectKinematics)> = Vec::new();
        for segment in segments {
            if dt <= 0.0 {
                log::warn!("non-increasing timestamps across the bank, skipping cycle objects");
                break;
            }
            let Some(tracked) = track_back(&self.buffer, &segment, &params) else {
                log::debug!(
                    "segment at indices {}..={} lost during backward tracking",
                    segment.index_min,
                    segment.index_max
                );
                continue;
            };

            let (object, kinematics) = self.assemble_object(
                &segment,
                &tracked,
                transforms,
                scorer,
                old_timestamp_us,
                new_timestamp_us,
                dt,
            );

            if kinematics.max_speed() < self.config.min_speed {
                log::debug!(
                    "object at {:.2} m too slow ({:.3} m/s), not reported",
                    object.distance,
                    kinematics.max_speed()
                );
                continue;
            }
            if object.confidence < self.config.min_confidence {
                log::debug!(
                    "object at {:.2} m below confidence threshold ({:.2})",
                    object.distance,
                    object.confidence
                );
                continue;
            }
            accepted.push((segment, object, kinematics));
        }

        self.seq += 1;
        let report = self.assemble_report(new_timestamp_us, accepted);
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_object(
        &self,
        segment: &Segment,
        tracked: &tracking::TrackedSegment,
        transforms: &dyn TransformProvider,
        scorer: &dyn ConfidenceScorer,
        old_timestamp_us: u64,
        new_timestamp_us: u64,
        dt: f32,
    ) -> (MovingObject, ObjectKinematics) {
        let increment = self.angle_increment;
        let angle_begin = self.angle_min + segment.index_min as f32 * increment;
        let angle_end = self.angle_min + segment.index_max as f32 * increment;
        let angle_mean = (angle_begin + angle_end) / 2.0;
        let distance = segment.mean_range();

        let closest_angle = self.angle_min + segment.range_min_index as f32 * increment;
        let closest_point = polar_point(segment.range_min, closest_angle);
        let new_point = polar_point(distance, angle_mean);

        let object_seen_width = seen_width(
            segment.range_at_index_min,
            segment.range_at_index_max,
            increment * segment.width() as f32,
        );

        let old_distance = tracked.mean_range();
        let old_angle = self.angle_min + tracked.index_mean() as f32 * increment;
        let old_point = polar_point(old_distance, old_angle);
        let old_seen_width = seen_width(
            tracked.range_at_index_min,
            tracked.range_at_index_max,
            increment * tracked.width() as f32,
        );

        let kinematics = derive_kinematics(
            transforms,
            &self.config,
            &self.sensor_frame,
            old_timestamp_us,
            new_timestamp_us,
            old_point,
            new_point,
            closest_point,
            dt,
        );

        let mut object = MovingObject {
            timestamp_us: new_timestamp_us,
            frame_id: self.sensor_frame.clone(),
            seen_width: object_seen_width,
            angle_begin,
            angle_end,
            range_at_angle_begin: segment.range_at_index_min,
            range_at_angle_end: segment.range_at_index_max,
            distance,
            closest_distance: segment.range_min,
            closest_angle,
            sensor: kinematics.sensor.to_estimate(),
            map: kinematics.map.to_estimate(),
            fixed: kinematics.fixed.to_estimate(),
            base: kinematics.base.to_estimate(),
            confidence: 0.0,
        };
        let raw = scorer.score(&object, &self.config, dt, old_seen_width, &kinematics.status);
        object.confidence = raw.clamp(0.0, 1.0);
        (object, kinematics)
    }

    fn assemble_report(
        &mut self,
        timestamp_us: u64,
        accepted: Vec<(Segment, MovingObject, ObjectKinematics)>,
    ) -> DetectionReport {
        let output = self.config.output.clone();
        let points = self.config.points_per_scan;

        let ema = output.publish_ema.then(|| {
            let mut intensities = vec![0.0; points];
            for (segment, _, _) in &accepted {
                for v in &mut intensities[segment.index_min..=segment.index_max] {
                    *v = EMA_OBJECT_INTENSITY;
                }
            }
            EmaProfile {
                frame_id: self.sensor_frame.clone(),
                timestamp_us,
                angle_min: self.angle_min,
                angle_increment: self.angle_increment,
                ranges: self.buffer.newest().ranges.clone(),
                intensities,
            }
        });

        let closest_points = output.publish_closest_points.then(|| {
            let mut marked = Vec::with_capacity(accepted.len());
            for (segment, object, _) in &accepted {
                self.closest_ranges[segment.range_min_index] = object.closest_distance;
                self.closest_intensities[segment.range_min_index] = CLOSEST_POINT_INTENSITY;
                marked.push(segment.range_min_index);
            }
            let profile = ClosestPointProfile {
                frame_id: self.sensor_frame.clone(),
                timestamp_us,
                angle_min: self.angle_min,
                angle_increment: self.angle_increment,
                ranges: self.closest_ranges.clone(),
                intensities: self.closest_intensities.clone(),
            };
            // The profile is persistent side state; back to neutral before
            // the next cycle.
            let neutral = self.sensor_range_max + SENTINEL_MARGIN;
            for index in marked {
                self.closest_ranges[index] = neutral;
                self.closest_intensities[index] = 0.0;
            }
            profile
        });

        let velocity_arrows = if output.publish_velocity_arrows {
            accepted
                .iter()
                .enumerate()
                .map(|(id, (_, object, _))| {
                    let frame = output.velocity_arrow_frame;
                    let estimate = object.estimate(frame);
                    let shade = if output.arrows_full_gray_scale && self.config.min_confidence < 1.0
                    {
                        (object.confidence - self.config.min_confidence)
                            / (1.0 - self.config.min_confidence)
                    } else {
                        object.confidence
                    };
                    VelocityArrow {
                        id,
                        frame_id: self.frame_name(frame),
                        shade,
                        points: [estimate.position, estimate.position + estimate.velocity],
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        let delta_lines = if output.publish_delta_lines {
            accepted
                .iter()
                .enumerate()
                .map(|(id, (_, _, kinematics))| {
                    let frame = output.delta_line_frame;
                    let motion = motion_for(kinematics, frame);
                    DeltaPositionLine {
                        id,
                        frame_id: self.frame_name(frame),
                        points: [motion.old_position, motion.position],
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        DetectionReport {
            seq: self.seq,
            timestamp_us,
            frame_id: self.sensor_frame.clone(),
            objects: accepted.into_iter().map(|(_, object, _)| object).collect(),
            ema,
            closest_points,
            velocity_arrows,
            delta_lines,
        }
    }

    fn frame_name(&self, frame: FrameKind) -> String {
        match frame {
            FrameKind::Sensor => self.sensor_frame.clone(),
            FrameKind::Map => self.config.map_frame.clone(),
            FrameKind::Fixed => self.config.fixed_frame.clone(),
            FrameKind::Base => self.config.base_frame.clone(),
        }
    }

    fn reset_closest_profile(&mut self) {
        let neutral = self.sensor_range_max + SENTINEL_MARGIN;
        self.closest_ranges = vec![neutral; self.config.points_per_scan];
        self.closest_intensities = vec![0.0; self.config.points_per_scan];
    }
}

fn motion_for(kinematics: &ObjectKinematics, frame: FrameKind) -> &FrameMotion {
    match frame {
        FrameKind::Sensor => &kinematics.sensor,
        FrameKind::Map => &kinematics.map,
        FrameKind::Fixed => &kinematics.fixed,
        FrameKind::Base => &kinematics.base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::{DefaultScorer, FnScorer};
    use crate::core::math::Transform3;
    use crate::transform::{StaticTransformProvider, TransformStatus};
    use approx::assert_relative_eq;

    const POINTS: usize = 16;

    fn test_config() -> BankConfig {
        BankConfig {
            depth: 3,
            points_per_scan: POINTS,
            min_points: 3,
            edge_max_delta_range: 0.15,
            tracking_max_delta_distance: 0.3,
            min_speed: 0.03,
            min_confidence: 0.5,
            ..Default::default()
        }
    }

    fn scan(timestamp_us: u64, ranges: Vec<f32>) -> RangeScan {
        RangeScan {
            frame_id: "laser".to_string(),
            timestamp_us,
            angle_min: -1.0,
            angle_max: 1.0,
            angle_increment: 2.0 / (POINTS - 1) as f32,
            range_min: 0.1,
            range_max: 10.0,
            ranges,
        }
    }

    /// Object spanning indices 5..=9. The odd width keeps the integer
    /// middle index on the same angle as the angular midpoint, so the
    /// synthetic motion stays purely radial.
    fn profile(object_range: f32) -> Vec<f32> {
        let mut ranges = vec![16.5; POINTS];
        for r in ranges.iter_mut().skip(5).take(5) {
            *r = object_range;
        }
        ranges
    }

    fn full_provider() -> StaticTransformProvider {
        let mut provider = StaticTransformProvider::new();
        provider.insert("map", Transform3::identity());
        provider.insert("odom", Transform3::identity());
        provider.insert("base_link", Transform3::identity());
        provider
    }

    /// Feed three scans with the object approaching at 0.5 m/s.
    fn approaching_bank() -> ScanBank {
        let mut bank = ScanBank::new(test_config()).unwrap();
        for (n, range) in [2.0f32, 1.95, 1.90].iter().enumerate() {
            bank.observe_scan(&scan(1_000_000 + n as u64 * 100_000, profile(*range)))
                .unwrap();
        }
        assert!(bank.is_filled());
        bank
    }

    #[test]
    fn test_detect_before_filled() {
        let mut bank = ScanBank::new(test_config()).unwrap();
        bank.observe_scan(&scan(1_000_000, profile(2.0))).unwrap();
        let err = bank
            .detect(&full_provider(), &DefaultScorer)
            .unwrap_err();
        assert!(matches!(err, Error::BankNotFilled));
    }

    #[test]
    fn test_scan_length_mismatch() {
        let mut bank = ScanBank::new(test_config()).unwrap();
        let mut bad = scan(1_000_000, profile(2.0));
        bad.ranges.pop();
        assert!(matches!(
            bank.observe_scan(&bad),
            Err(Error::ScanLengthMismatch { expected, actual })
                if expected == POINTS && actual == POINTS - 1
        ));
    }

    #[test]
    fn test_moving_object_reported() {
        let mut bank = approaching_bank();
        let report = bank.detect(&full_provider(), &DefaultScorer).unwrap();

        assert_eq!(report.seq, 1);
        assert_eq!(report.objects.len(), 1);
        let object = &report.objects[0];
        // 0.1 m closer over 0.2 s
        assert_relative_eq!(object.sensor.speed, 0.5, epsilon = 1e-3);
        assert!(object.confidence >= 0.5);
        assert_relative_eq!(object.distance, 1.90, epsilon = 1e-5);
    }

    #[test]
    fn test_static_object_not_reported() {
        let mut bank = ScanBank::new(test_config()).unwrap();
        for n in 0..3u64 {
            bank.observe_scan(&scan(1_000_000 + n * 100_000, profile(2.0)))
                .unwrap();
        }
        let report = bank.detect(&full_provider(), &DefaultScorer).unwrap();
        assert!(report.objects.is_empty());
        assert_eq!(report.seq, 1);
    }

    #[test]
    fn test_confidence_clamped_high() {
        let mut bank = approaching_bank();
        let scorer =
            FnScorer(|_: &MovingObject, _: &BankConfig, _: f32, _: f32, _: &TransformStatus| 1.7);
        let report = bank.detect(&full_provider(), &scorer).unwrap();
        assert_eq!(report.objects[0].confidence, 1.0);
    }

    #[test]
    fn test_confidence_clamped_low() {
        let mut config = test_config();
        config.min_confidence = 0.0;
        let mut bank = ScanBank::new(config).unwrap();
        for (n, range) in [2.0f32, 1.95, 1.90].iter().enumerate() {
            bank.observe_scan(&scan(1_000_000 + n as u64 * 100_000, profile(*range)))
                .unwrap();
        }
        let scorer =
            FnScorer(|_: &MovingObject, _: &BankConfig, _: f32, _: f32, _: &TransformStatus| -0.3);
        let report = bank.detect(&full_provider(), &scorer).unwrap();
        assert_eq!(report.objects[0].confidence, 0.0);
    }

    #[test]
    fn test_low_confidence_object_dropped() {
        let mut bank = approaching_bank();
        let scorer =
            FnScorer(|_: &MovingObject, _: &BankConfig, _: f32, _: f32, _: &TransformStatus| 0.2);
        let report = bank.detect(&full_provider(), &scorer).unwrap();
        assert!(report.objects.is_empty());
    }

    #[test]
    fn test_seq_increments_every_cycle() {
        let mut bank = approaching_bank();
        let provider = full_provider();
        assert_eq!(bank.detect(&provider, &DefaultScorer).unwrap().seq, 1);
        assert_eq!(bank.detect(&provider, &DefaultScorer).unwrap().seq, 2);
    }

    #[test]
    fn test_closest_profile_resets_between_cycles() {
        let mut config = test_config();
        config.output.publish_closest_points = true;
        let mut bank = ScanBank::new(config).unwrap();
        for (n, range) in [2.0f32, 1.95, 1.90].iter().enumerate() {
            bank.observe_scan(&scan(1_000_000 + n as u64 * 100_000, profile(*range)))
                .unwrap();
        }
        let provider = full_provider();

        let first = bank.detect(&provider, &DefaultScorer).unwrap();
        let profile = first.closest_points.unwrap();
        assert!(profile.intensities.iter().any(|&i| i > 0.0));

        // Push the object out of range; the next profile must be neutral.
        for n in 3..6u64 {
            bank.observe_scan(&scan(1_000_000 + n * 100_000, vec![16.5; POINTS]))
                .unwrap();
        }
        let second = bank.detect(&provider, &DefaultScorer).unwrap();
        let profile = second.closest_points.unwrap();
        assert!(profile.intensities.iter().all(|&i| i == 0.0));
        let neutral = 10.0 + SENTINEL_MARGIN;
        assert!(profile.ranges.iter().all(|&r| r == neutral));
    }

    #[test]
    fn test_ema_profile_marks_object_span() {
        let mut config = test_config();
        config.output.publish_ema = true;
        let mut bank = ScanBank::new(config).unwrap();
        for (n, range) in [2.0f32, 1.95, 1.90].iter().enumerate() {
            bank.observe_scan(&scan(1_000_000 + n as u64 * 100_000, profile(*range)))
                .unwrap();
        }
        let report = bank.detect(&full_provider(), &DefaultScorer).unwrap();
        let ema = report.ema.unwrap();
        assert_eq!(ema.intensities[5], EMA_OBJECT_INTENSITY);
        assert_eq!(ema.intensities[9], EMA_OBJECT_INTENSITY);
        assert_eq!(ema.intensities[4], 0.0);
        assert_eq!(ema.intensities[10], 0.0);
        assert_relative_eq!(ema.ranges[5], 1.90, epsilon = 1e-5);
    }

    #[test]
    fn test_markers_assembled() {
        let mut config = test_config();
        config.output.publish_velocity_arrows = true;
        config.output.publish_delta_lines = true;
        config.output.velocity_arrow_frame = FrameKind::Sensor;
        config.output.delta_line_frame = FrameKind::Sensor;
        let mut bank = ScanBank::new(config).unwrap();
        for (n, range) in [2.0f32, 1.95, 1.90].iter().enumerate() {
            bank.observe_scan(&scan(1_000_000 + n as u64 * 100_000, profile(*range)))
                .unwrap();
        }
        let report = bank.detect(&full_provider(), &DefaultScorer).unwrap();

        assert_eq!(report.velocity_arrows.len(), 1);
        let arrow = &report.velocity_arrows[0];
        assert_eq!(arrow.frame_id, "laser");
        let object = &report.objects[0];
        assert_relative_eq!(
            arrow.points[1].x,
            object.sensor.position.x + object.sensor.velocity.x,
            epsilon = 1e-6
        );

        assert_eq!(report.delta_lines.len(), 1);
        let line = &report.delta_lines[0];
        // The object moved toward the sensor.
        let old_norm = line.points[0].norm();
        let new_norm = line.points[1].norm();
        assert!(new_norm < old_norm);
    }
}
