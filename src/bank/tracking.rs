//! Cross-time object tracking.
//!
//! Follows a segment found in the newest slot backward through every older
//! slot in the buffer, one slot at a time. At each level the segment is
//! re-expanded around the previous level's middle index using the same
//! edge-continuity rule as segmentation; the expanded segment must keep a
//! similar width and mean range to count as a continuation.

use super::buffer::ScanBuffer;
use super::segmentation::{RangeBounds, Segment};

/// Segment recovered at an older level of the buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedSegment {
    /// First angular index
    pub index_min: usize,
    /// Last angular index
    pub index_max: usize,
    /// Sum of all ranges over the run
    pub range_sum: f32,
    /// Range at the first index
    pub range_at_index_min: f32,
    /// Range at the last index
    pub range_at_index_max: f32,
}

impl TrackedSegment {
    /// Width of the run in points.
    #[inline]
    pub fn width(&self) -> usize {
        self.index_max - self.index_min + 1
    }

    /// Middle angular index.
    #[inline]
    pub fn index_mean(&self) -> usize {
        (self.index_min + self.index_max) / 2
    }

    /// Mean range over the run.
    #[inline]
    pub fn mean_range(&self) -> f32 {
        self.range_sum / self.width() as f32
    }
}

/// Thresholds governing one backward walk.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrackParams {
    pub bounds: RangeBounds,
    pub edge_max_delta: f32,
    pub min_points: usize,
    pub max_delta_width: usize,
    pub max_delta_distance: f32,
    pub miss_tolerance: usize,
}

/// Walk a newest-slot segment backward through the whole buffer.
///
/// Visits every older slot exactly once, ending at the put (oldest) slot.
/// Returns the segment recovered there, or `None` once consecutive misses
/// exceed the tolerance. Single-path search: at most one candidate segment
/// is examined per slot.
pub(crate) fn track_back(
    buffer: &ScanBuffer,
    seed: &Segment,
    params: &TrackParams,
) -> Option<TrackedSegment> {
    let depth = buffer.depth();
    let newest = buffer.newest_index();
    let start = if newest == 0 { depth - 1 } else { newest - 1 };
    walk(
        buffer,
        params,
        start,
        depth - 1,
        seed.index_mean(),
        seed.width(),
        seed.mean_range(),
        0,
    )
}

#[allow(clippy::too_many_arguments)]
fn walk(
    buffer: &ScanBuffer,
    params: &TrackParams,
    level: usize,
    remaining: usize,
    anchor: usize,
    prev_width: usize,
    prev_mean_range: f32,
    misses: usize,
) -> Option<TrackedSegment> {
    let ranges = &buffer.slot(level).ranges;

    // The anchor itself must be a valid return; a hole here is not a
    // tolerable miss.
    let anchor_range = ranges[anchor];
    if !params.bounds.contains(anchor_range) {
        return None;
    }

    let candidate = expand(ranges, anchor, params);

    let width_delta = candidate.width().abs_diff(prev_width);
    let matched = candidate.width() >= params.min_points
        && width_delta <= params.max_delta_width
        && (candidate.mean_range() - prev_mean_range).abs() <= params.max_delta_distance;

    let misses = if matched { 0 } else { misses + 1 };
    if !matched && misses > params.miss_tolerance {
        return None;
    }

    if remaining == 1 {
        // This level is the oldest slot in the buffer.
        return Some(candidate);
    }

    let older = if level == 0 { buffer.depth() - 1 } else { level - 1 };
    walk(
        buffer,
        params,
        older,
        remaining - 1,
        candidate.index_mean(),
        candidate.width(),
        candidate.mean_range(),
        misses,
    )
}

/// Expand left and right from `anchor`, accepting neighbours that stay in
/// bounds and within the edge tolerance of the previously accepted range.
fn expand(ranges: &[f32], anchor: usize, params: &TrackParams) -> TrackedSegment {
    let anchor_range = ranges[anchor];

    let mut left = anchor;
    let mut prev = anchor_range;
    let mut range_sum = anchor_range;
    for i in (0..anchor).rev() {
        let range = ranges[i];
        if params.bounds.contains(range) && (range - prev).abs() <= params.edge_max_delta {
            left = i;
            prev = range;
            range_sum += range;
        } else {
            break;
        }
    }
    let range_at_index_min = prev;

    let mut right = anchor;
    prev = anchor_range;
    for (i, &range) in ranges.iter().enumerate().skip(anchor + 1) {
        if params.bounds.contains(range) && (range - prev).abs() <= params.edge_max_delta {
            right = i;
            prev = range;
            range_sum += range;
        } else {
            break;
        }
    }
    let range_at_index_max = prev;

    TrackedSegment {
        index_min: left,
        index_max: right,
        range_sum,
        range_at_index_min,
        range_at_index_max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::segmentation::segment_scan;
    use approx::assert_relative_eq;

    const BOUNDS: RangeBounds = RangeBounds { min: 0.1, max: 6.5 };

    fn params(miss_tolerance: usize) -> TrackParams {
        TrackParams {
            bounds: BOUNDS,
            edge_max_delta: 0.15,
            min_points: 3,
            max_delta_width: 2,
            max_delta_distance: 0.2,
            miss_tolerance,
        }
    }

    /// Buffer whose slots each hold the given profiles, oldest first.
    fn buffer_from(profiles: &[Vec<f32>]) -> ScanBuffer {
        let mut buffer = ScanBuffer::new(profiles.len(), profiles[0].len());
        for (n, profile) in profiles.iter().enumerate() {
            if !buffer.is_started() {
                let slot = buffer.put_slot_mut();
                slot.timestamp_us = n as u64;
                slot.ranges.copy_from_slice(profile);
                buffer.init_indices();
            } else {
                buffer.write_smoothed(n as u64, profile, 1.0);
                buffer.advance();
            }
        }
        assert!(buffer.is_filled());
        buffer
    }

    fn profile_with_object(at: usize, width: usize, range: f32) -> Vec<f32> {
        let mut p = vec![16.5; 24];
        for r in p.iter_mut().skip(at).take(width) {
            *r = range;
        }
        p
    }

    fn seed(buffer: &ScanBuffer) -> Segment {
        let segments = segment_scan(&buffer.newest().ranges, BOUNDS, 0.15, 3);
        assert_eq!(segments.len(), 1);
        segments[0]
    }

    #[test]
    fn test_static_object_tracks_to_oldest() {
        let profiles = vec![profile_with_object(8, 4, 2.0); 5];
        let buffer = buffer_from(&profiles);

        let tracked = track_back(&buffer, &seed(&buffer), &params(0)).unwrap();
        assert_eq!(tracked.index_min, 8);
        assert_eq!(tracked.index_max, 11);
        assert_relative_eq!(tracked.mean_range(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_drifting_object_tracks() {
        // Object slides one index per scan, well inside the width and
        // range tolerances.
        let profiles: Vec<_> = (0..5).map(|n| profile_with_object(6 + n, 4, 2.0)).collect();
        let buffer = buffer_from(&profiles);

        let tracked = track_back(&buffer, &seed(&buffer), &params(0)).unwrap();
        assert_eq!(tracked.index_min, 6);
    }

    #[test]
    fn test_single_range_jump_aborts() {
        let mut profiles = vec![profile_with_object(8, 4, 2.0); 5];
        // One mid-history slot violates the mean-range bound.
        profiles[2] = profile_with_object(8, 4, 2.5);
        let buffer = buffer_from(&profiles);

        assert!(track_back(&buffer, &seed(&buffer), &params(0)).is_none());
    }

    #[test]
    fn test_single_width_jump_aborts() {
        let mut profiles = vec![profile_with_object(8, 4, 2.0); 5];
        profiles[1] = profile_with_object(5, 10, 2.0);
        let buffer = buffer_from(&profiles);

        assert!(track_back(&buffer, &seed(&buffer), &params(0)).is_none());
    }

    #[test]
    fn test_hole_at_anchor_aborts_regardless_of_tolerance() {
        let mut profiles = vec![profile_with_object(8, 4, 2.0); 5];
        profiles[2] = vec![16.5; 24];
        let buffer = buffer_from(&profiles);

        assert!(track_back(&buffer, &seed(&buffer), &params(9)).is_none());
    }

    #[test]
    fn test_miss_tolerance_survives_one_bad_level() {
        // The walk re-anchors on the deviating segment, so a single bad
        // level costs two consecutive misses: one entering it and one
        // returning to the true track.
        let mut profiles = vec![profile_with_object(8, 4, 2.0); 5];
        profiles[2] = profile_with_object(8, 4, 2.5);
        let buffer = buffer_from(&profiles);

        let tracked = track_back(&buffer, &seed(&buffer), &params(2));
        assert!(tracked.is_some());
        assert_relative_eq!(tracked.unwrap().mean_range(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_tolerance_one_cannot_recover_past_bad_level() {
        let mut profiles = vec![profile_with_object(8, 4, 2.0); 5];
        profiles[2] = profile_with_object(8, 4, 2.5);
        let buffer = buffer_from(&profiles);

        assert!(track_back(&buffer, &seed(&buffer), &params(1)).is_none());
    }

    #[test]
    fn test_returns_oldest_slot_segment() {
        // Oldest slot holds the object shifted; make sure the returned
        // segment is that slot's, not the newest one's.
        let mut profiles = vec![profile_with_object(10, 4, 2.0); 4];
        profiles[0] = profile_with_object(9, 4, 2.05);
        let buffer = buffer_from(&profiles);

        let tracked = track_back(&buffer, &seed(&buffer), &params(0)).unwrap();
        assert_eq!(tracked.index_min, 9);
        assert_relative_eq!(tracked.mean_range(), 2.05, epsilon = 1e-5);
    }

    #[test]
    fn test_expand_records_edge_ranges() {
        let ranges = [16.5, 2.1, 2.0, 2.05, 2.15, 16.5];
        let segment = expand(&ranges, 2, &params(0));
        assert_eq!(segment.index_min, 1);
        assert_eq!(segment.index_max, 4);
        assert_relative_eq!(segment.range_at_index_min, 2.1, epsilon = 1e-6);
        assert_relative_eq!(segment.range_at_index_max, 2.15, epsilon = 1e-6);
    }
}
