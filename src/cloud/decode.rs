//! Endianness-aware coordinate extraction and angular binning.
//!
//! The byte-order decision is made once per message and threaded through
//! every helper as an explicit `swap` flag, so the decode path behaves the
//! same on any host.

use super::{FieldType, PointCloudMsg};
use crate::config::BankConfig;
use crate::error::{Error, Result};

/// Resolved byte position of one coordinate field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FieldSlot {
    pub offset: usize,
    pub width: usize,
}

/// Byte positions of the x/y/z fields within a point record.
///
/// Resolved once per message shape and cached by the bank; a resolution
/// failure is fatal for the adapter until the configuration is fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CloudLayout {
    pub x: FieldSlot,
    pub y: FieldSlot,
    pub z: FieldSlot,
}

impl CloudLayout {
    /// Resolve the configured coordinate field names against the catalog.
    pub fn resolve(config: &BankConfig, msg: &PointCloudMsg) -> Result<Self> {
        let swap = msg.swap_bytes();
        Ok(Self {
            x: resolve_field(msg, &config.cloud.x_field, swap)?,
            y: resolve_field(msg, &config.cloud.y_field, swap)?,
            z: resolve_field(msg, &config.cloud.z_field, swap)?,
        })
    }
}

fn resolve_field(msg: &PointCloudMsg, name: &str, swap: bool) -> Result<FieldSlot> {
    let field = msg
        .fields
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| Error::FieldResolution(name.to_string()))?;

    let datatype =
        FieldType::from_u8(field.datatype).ok_or_else(|| Error::FieldResolution(name.to_string()))?;

    // The offset travels in the message's byte order.
    let offset = if swap {
        field.offset.swap_bytes()
    } else {
        field.offset
    };

    Ok(FieldSlot {
        offset: offset as usize,
        width: datatype.width(),
    })
}

/// Read one coordinate from a point record.
///
/// Only 4- and 8-byte fields can carry coordinates; the bytes are reversed
/// first when `swap` is set.
fn read_coordinate(point: &[u8], slot: FieldSlot, swap: bool) -> Result<f64> {
    if slot.offset + slot.width > point.len() {
        return Err(Error::FieldResolution(format!(
            "field at offset {} exceeds the {}-byte point record",
            slot.offset,
            point.len()
        )));
    }
    let mut raw = [0u8; 8];
    raw[..slot.width].copy_from_slice(&point[slot.offset..slot.offset + slot.width]);
    if swap {
        raw[..slot.width].reverse();
    }

    match slot.width {
        4 => Ok(f32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64),
        8 => Ok(f64::from_ne_bytes(raw)),
        other => Err(Error::UnsupportedCoordinateWidth(other)),
    }
}

/// Decode every point of `msg` into the put-slot range profile.
///
/// Assumes `ranges` has been reset to the sentinel value. Each accepted
/// point is spread over the angular bins its voxel footprint covers, and
/// within each bin the nearest range wins. Returns the number of points
/// that passed the z-band filter.
pub(crate) fn bin_points(
    config: &BankConfig,
    layout: &CloudLayout,
    msg: &PointCloudMsg,
    ranges: &mut [f32],
) -> Result<usize> {
    if msg.point_step == 0 {
        return Ok(0);
    }

    let swap = msg.swap_bytes();
    let view_angle = config.angle_max - config.angle_min;
    let leaf_half = (config.cloud.voxel_leaf_size / 2.0) as f64;
    let inv_resolution = if view_angle > 0.0 {
        config.points_per_scan as f64 / view_angle as f64
    } else {
        0.0
    };
    let index_max = config.points_per_scan - 1;

    let mut accepted = 0usize;
    for row in 0..msg.height {
        let row_offset = row * msg.row_step;
        let mut cursor = 0usize;
        while cursor + msg.point_step <= msg.row_step {
            let start = row_offset + cursor;
            cursor += msg.point_step;
            let Some(point) = msg.data.get(start..start + msg.point_step) else {
                break;
            };

            let x = read_coordinate(point, layout.x, swap)?;
            let y = read_coordinate(point, layout.y, swap)?;
            let z = read_coordinate(point, layout.z, swap)?;

            if z < config.cloud.z_min as f64 || z > config.cloud.z_max as f64 {
                continue;
            }
            accepted += 1;

            let range = (x * x + y * y + z * z).sqrt() as f32;

            // A near point covers more bins than a far one at the same
            // physical width.
            let angle_low = ((y - leaf_half) / x).atan();
            let angle_high = ((y + leaf_half) / x).atan();
            let bin_low = ((angle_low - config.angle_min as f64) * inv_resolution).floor();
            let bin_high = ((angle_high - config.angle_min as f64) * inv_resolution).floor();

            let first = bin_low.max(0.0) as usize;
            let last = (bin_high.min(index_max as f64).max(0.0)) as usize;
            if bin_high < 0.0 || bin_low > index_max as f64 {
                continue;
            }

            log::trace!(
                "point ({x:.3}, {y:.3}, {z:.3}) lands in bins {first}..={last} at range {range:.3}"
            );

            for bin in ranges.iter_mut().take(last + 1).skip(first) {
                if range < *bin {
                    *bin = range;
                }
            }
        }
    }

    Ok(accepted)
}
