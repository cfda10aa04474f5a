//! Self-describing point-cloud messages.
//!
//! Message layout:
//! - a field catalog naming each per-point field with its byte offset
//!   (4-byte unsigned, in the message's byte order) and a datatype code
//! - `height` rows of `row_step` bytes, one point every `point_step` bytes
//! - an explicit big/little-endian flag for the whole payload

mod decode;

use serde::{Deserialize, Serialize};

pub(crate) use decode::{bin_points, CloudLayout};

/// Datatype codes used in the field catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FieldType {
    /// Signed 8-bit integer (1)
    Int8 = 1,
    /// Unsigned 8-bit integer (2)
    Uint8 = 2,
    /// Signed 16-bit integer (3)
    Int16 = 3,
    /// Unsigned 16-bit integer (4)
    Uint16 = 4,
    /// Signed 32-bit integer (5)
    Int32 = 5,
    /// Unsigned 32-bit integer (6)
    Uint32 = 6,
    /// 32-bit float (7)
    Float32 = 7,
    /// 64-bit float (8)
    Float64 = 8,
}

impl FieldType {
    /// Parse a datatype code.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(FieldType::Int8),
            2 => Some(FieldType::Uint8),
            3 => Some(FieldType::Int16),
            4 => Some(FieldType::Uint16),
            5 => Some(FieldType::Int32),
            6 => Some(FieldType::Uint32),
            7 => Some(FieldType::Float32),
            8 => Some(FieldType::Float64),
            _ => None,
        }
    }

    /// Width of the field in bytes.
    pub fn width(&self) -> usize {
        match self {
            FieldType::Int8 | FieldType::Uint8 => 1,
            FieldType::Int16 | FieldType::Uint16 => 2,
            FieldType::Int32 | FieldType::Uint32 | FieldType::Float32 => 4,
            FieldType::Float64 => 8,
        }
    }
}

/// One entry of the field catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointField {
    /// Field name
    pub name: String,
    /// Byte offset within a point record, in the message's byte order
    pub offset: u32,
    /// Raw datatype code (see [`FieldType`])
    pub datatype: u8,
}

/// A point-cloud message as delivered by a sensor driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudMsg {
    /// Sensor frame the points are expressed in
    pub frame_id: String,
    /// Acquisition time in microseconds since epoch
    pub timestamp_us: u64,
    /// Number of rows
    pub height: usize,
    /// Bytes per row
    pub row_step: usize,
    /// Bytes per point record
    pub point_step: usize,
    /// Payload byte order
    pub is_bigendian: bool,
    /// Field catalog
    pub fields: Vec<PointField>,
    /// Raw point records
    pub data: Vec<u8>,
}

impl PointCloudMsg {
    /// Whether field bytes must be reversed before interpretation on
    /// this host.
    #[inline]
    pub fn swap_bytes(&self) -> bool {
        self.is_bigendian != cfg!(target_endian = "big")
    }
}
