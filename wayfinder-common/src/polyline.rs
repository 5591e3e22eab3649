//! Encoded polyline decoding
//!
//! The guidance backend returns the route overview in the encoded polyline
//! format used by the Google Directions API: each coordinate is a delta from
//! the previous one, scaled by 1e5, zig-zag encoded and split into 5-bit
//! chunks offset by 63 so the result is printable ASCII.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Coordinate scale of the encoded format (5 decimal places)
const PRECISION: f64 = 1e5;

/// Smallest and largest byte values that can appear in an encoded polyline
const MIN_CHUNK_BYTE: u8 = 63;
const MAX_CHUNK_BYTE: u8 = 126;

/// A decoded path vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Bounding box of a decoded path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Smallest box containing every vertex (None for an empty path)
    pub fn from_path(path: &[LatLng]) -> Option<Self> {
        let first = path.first()?;
        let initial = Bounds {
            south: first.lat,
            west: first.lng,
            north: first.lat,
            east: first.lng,
        };

        Some(path.iter().skip(1).fold(initial, |b, p| Bounds {
            south: b.south.min(p.lat),
            west: b.west.min(p.lng),
            north: b.north.max(p.lat),
            east: b.east.max(p.lng),
        }))
    }

    pub fn contains(&self, point: &LatLng) -> bool {
        (self.south..=self.north).contains(&point.lat) && (self.west..=self.east).contains(&point.lng)
    }
}

/// Decode an encoded polyline into its vertices
pub fn decode(encoded: &str) -> Result<Vec<LatLng>> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut path = Vec::new();

    while index < bytes.len() {
        lat += next_value(bytes, &mut index)?;
        lng += next_value(bytes, &mut index)?;
        path.push(LatLng {
            lat: lat as f64 / PRECISION,
            lng: lng as f64 / PRECISION,
        });
    }

    Ok(path)
}

/// Read one zig-zag encoded delta starting at `index`
fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(Error::Parse(format!(
                "polyline truncated at offset {}",
                *index
            )));
        };
        if !(MIN_CHUNK_BYTE..=MAX_CHUNK_BYTE).contains(&byte) {
            return Err(Error::Parse(format!(
                "invalid polyline byte 0x{:02x} at offset {}",
                byte, *index
            )));
        }
        *index += 1;

        let chunk = i64::from(byte - MIN_CHUNK_BYTE);
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
        if shift > 60 {
            return Err(Error::Parse("polyline value overflows 64 bits".to_string()));
        }
    }

    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}
