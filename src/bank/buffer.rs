//! Fixed-depth circular storage for smoothed range profiles.
//!
//! Two cursors walk the slot array in lock step: `put` is the slot being
//! written (and, once the buffer has wrapped, the oldest completed slot),
//! `newest` is the most recently completed slot.

/// One timestamped range profile.
#[derive(Debug, Clone)]
pub(crate) struct ScanSlot {
    /// Acquisition time in microseconds since epoch
    pub timestamp_us: u64,
    /// Smoothed ranges, one per angular index
    pub ranges: Vec<f32>,
}

/// Circular array of `depth` scan slots.
#[derive(Debug)]
pub(crate) struct ScanBuffer {
    slots: Vec<ScanSlot>,
    put: usize,
    newest: usize,
    filled: bool,
    started: bool,
}

impl ScanBuffer {
    /// Allocate `depth` slots of `points` ranges each.
    ///
    /// `depth >= 2` and `points >= 1` are enforced at configuration
    /// validation, not here.
    pub fn new(depth: usize, points: usize) -> Self {
        Self {
            slots: vec![
                ScanSlot {
                    timestamp_us: 0,
                    ranges: vec![0.0; points],
                };
                depth
            ],
            put: 0,
            newest: 0,
            filled: false,
            started: false,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// True once the first slot has been written.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// True once `depth` distinct scans have been observed.
    #[inline]
    pub fn is_filled(&self) -> bool {
        self.filled
    }

    #[inline]
    pub fn put_index(&self) -> usize {
        self.put
    }

    #[inline]
    pub fn newest_index(&self) -> usize {
        self.newest
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &ScanSlot {
        &self.slots[index]
    }

    #[inline]
    pub fn newest(&self) -> &ScanSlot {
        &self.slots[self.newest]
    }

    /// Mutable access to the slot currently being written.
    #[inline]
    pub fn put_slot_mut(&mut self) -> &mut ScanSlot {
        &mut self.slots[self.put]
    }

    /// Reset every range of the put slot to `sentinel`, so "no point seen"
    /// stays distinguishable from "point seen at range 0".
    pub fn reset_put(&mut self, sentinel: f32) {
        for r in &mut self.slots[self.put].ranges {
            *r = sentinel;
        }
    }

    /// Set up the cursors after the very first slot has been written
    /// into slot 0.
    pub fn init_indices(&mut self) {
        self.put = 1 % self.depth();
        self.newest = 0;
        self.filled = false;
        self.started = true;
    }

    /// Blend the put slot against the newest slot in place:
    /// `put[i] = alpha * put[i] + (1 - alpha) * newest[i]`.
    ///
    /// Skipped entirely at `alpha = 1.0`.
    pub fn ema_put(&mut self, alpha: f32) {
        if alpha < 1.0 {
            let alpha_prev = 1.0 - alpha;
            let (put, newest) = (self.put, self.newest);
            // Cursors never alias between init_indices and wraparound.
            for i in 0..self.slots[put].ranges.len() {
                let prev = self.slots[newest].ranges[i];
                let slot = &mut self.slots[put];
                slot.ranges[i] = alpha * slot.ranges[i] + alpha_prev * prev;
            }
        }
    }

    /// Write a raw profile into the put slot, smoothed against the newest
    /// slot.
    pub fn write_smoothed(&mut self, timestamp_us: u64, raw: &[f32], alpha: f32) {
        let alpha_prev = 1.0 - alpha;
        let newest = self.newest;
        let put = self.put;
        self.slots[put].timestamp_us = timestamp_us;
        for i in 0..raw.len() {
            let prev = self.slots[newest].ranges[i];
            self.slots[put].ranges[i] = alpha * raw[i] + alpha_prev * prev;
        }
    }

    /// Move both cursors forward one slot, wrapping at `depth`. Latches
    /// `filled` the first time `put` numerically precedes `newest`.
    pub fn advance(&mut self) {
        let depth = self.depth();
        self.put = (self.put + 1) % depth;
        self.newest = (self.newest + 1) % depth;
        if self.put < self.newest {
            self.filled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(buffer: &mut ScanBuffer, ts: u64, ranges: &[f32], alpha: f32) {
        if !buffer.is_started() {
            let slot = buffer.put_slot_mut();
            slot.timestamp_us = ts;
            slot.ranges.copy_from_slice(ranges);
            buffer.init_indices();
        } else {
            buffer.write_smoothed(ts, ranges, alpha);
            buffer.advance();
        }
    }

    #[test]
    fn test_fills_after_exactly_depth_writes() {
        for depth in 2..=6 {
            let mut buffer = ScanBuffer::new(depth, 4);
            for n in 1..=depth + 3 {
                write(&mut buffer, n as u64, &[1.0; 4], 1.0);
                if n < depth {
                    assert!(!buffer.is_filled(), "depth {depth}: filled early at {n}");
                } else {
                    assert!(buffer.is_filled(), "depth {depth}: not filled at {n}");
                }
            }
        }
    }

    #[test]
    fn test_cursor_positions() {
        let mut buffer = ScanBuffer::new(3, 2);
        write(&mut buffer, 1, &[1.0, 1.0], 1.0);
        assert_eq!(buffer.put_index(), 1);
        assert_eq!(buffer.newest_index(), 0);

        write(&mut buffer, 2, &[2.0, 2.0], 1.0);
        assert_eq!(buffer.put_index(), 2);
        assert_eq!(buffer.newest_index(), 1);

        write(&mut buffer, 3, &[3.0, 3.0], 1.0);
        assert_eq!(buffer.put_index(), 0);
        assert_eq!(buffer.newest_index(), 2);
        assert!(buffer.is_filled());
    }

    #[test]
    fn test_alpha_one_is_passthrough() {
        let mut buffer = ScanBuffer::new(2, 3);
        write(&mut buffer, 1, &[1.0, 2.0, 3.0], 1.0);
        write(&mut buffer, 2, &[4.0, 5.0, 6.0], 1.0);
        assert_eq!(buffer.newest().ranges, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_ema_blend() {
        let mut buffer = ScanBuffer::new(2, 1);
        write(&mut buffer, 1, &[2.0], 0.25);
        write(&mut buffer, 2, &[6.0], 0.25);
        // 0.25 * 6 + 0.75 * 2 = 3.0
        assert_eq!(buffer.newest().ranges[0], 3.0);
    }

    #[test]
    fn test_first_write_bypasses_smoothing() {
        let mut buffer = ScanBuffer::new(2, 2);
        write(&mut buffer, 1, &[5.0, 7.0], 0.1);
        assert_eq!(buffer.newest().ranges, vec![5.0, 7.0]);
    }

    #[test]
    fn test_ema_stays_between_prev_and_new() {
        let pairs = [(1.0f32, 9.0f32), (9.0, 1.0), (3.5, 3.5), (0.0, 100.0)];
        for alpha in [0.0f32, 0.1, 0.5, 0.9, 1.0] {
            for (prev, new) in pairs {
                let mut buffer = ScanBuffer::new(2, 1);
                write(&mut buffer, 1, &[prev], alpha);
                write(&mut buffer, 2, &[new], alpha);
                let smoothed = buffer.newest().ranges[0];
                assert!(
                    smoothed >= prev.min(new) - 1e-6 && smoothed <= prev.max(new) + 1e-6,
                    "alpha {alpha}: {smoothed} outside [{prev}, {new}]"
                );
            }
        }
    }

    #[test]
    fn test_reset_put_sentinel() {
        let mut buffer = ScanBuffer::new(2, 3);
        buffer.reset_put(16.5);
        assert_eq!(buffer.slot(0).ranges, vec![16.5, 16.5, 16.5]);
    }

    #[test]
    fn test_ema_put_in_place() {
        let mut buffer = ScanBuffer::new(2, 1);
        write(&mut buffer, 1, &[2.0], 0.5);
        buffer.put_slot_mut().ranges[0] = 6.0;
        buffer.ema_put(0.5);
        assert_eq!(buffer.slot(buffer.put_index()).ranges[0], 4.0);
    }
}
