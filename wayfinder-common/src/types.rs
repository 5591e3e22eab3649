//! Location and guidance data types
//!
//! These are the values exchanged between the navigation core and its
//! collaborators: fixes produced by the location capability, the request
//! sent to the guidance backend, and the response it returns.

use crate::polyline::{self, Bounds, LatLng};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single reported position with an accuracy radius
///
/// Immutable once produced by the location capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Accuracy radius in meters (smaller is better)
    pub accuracy: f64,
    /// When the fix was measured
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    /// Create a fix measured now
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self::at(latitude, longitude, accuracy, crate::time::now())
    }

    /// Create a fix with an explicit measurement time
    pub fn at(latitude: f64, longitude: f64, accuracy: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp,
        }
    }

    /// False for NaN, infinite or negative accuracy radii
    pub fn has_valid_accuracy(&self) -> bool {
        self.accuracy.is_finite() && self.accuracy >= 0.0
    }

    /// True when this fix has a strictly smaller accuracy radius than `other`
    ///
    /// A fix with an invalid radius is worse than any fix with a valid one.
    pub fn is_more_accurate_than(&self, other: &LocationFix) -> bool {
        self.has_valid_accuracy()
            && (!other.has_valid_accuracy() || self.accuracy < other.accuracy)
    }

    /// True when the accuracy radius is within `threshold_m` meters
    pub fn meets_threshold(&self, threshold_m: f64) -> bool {
        self.accuracy <= threshold_m
    }
}

/// Request body for the guidance endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceRequest {
    pub destination: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GuidanceRequest {
    pub fn new(destination: impl Into<String>, fix: &LocationFix) -> Self {
        Self {
            destination: destination.into(),
            latitude: fix.latitude,
            longitude: fix.longitude,
        }
    }
}

/// Response from the guidance endpoint
///
/// Both fields are optional: the backend may answer with text only, geometry
/// only, or neither when it cannot find a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuidanceResponse {
    /// Turn-by-turn instructions as numbered lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Route geometry for the map renderer
    #[serde(
        default,
        rename = "routeData",
        alias = "routeGeometry",
        skip_serializing_if = "Option::is_none"
    )]
    pub route_geometry: Option<RouteGeometry>,
}

impl GuidanceResponse {
    pub fn with_instructions(instructions: impl Into<String>) -> Self {
        Self {
            instructions: Some(instructions.into()),
            route_geometry: None,
        }
    }

    /// Instruction text, or None when absent or blank
    pub fn instruction_text(&self) -> Option<&str> {
        self.instructions
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// Split the instruction text into display steps
    ///
    /// Steps are separated by line breaks and by numbered markers ("2.")
    /// appearing mid-line, so both the multi-line form the backend produces
    /// and a collapsed single line render one step per entry.
    pub fn steps(&self) -> Vec<String> {
        let Some(text) = self.instruction_text() else {
            return Vec::new();
        };

        let mut steps = Vec::new();
        for line in text.lines() {
            let mut current = String::new();
            for word in line.split_whitespace() {
                if is_step_marker(word) && !current.is_empty() {
                    steps.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
            if !current.is_empty() {
                steps.push(current);
            }
        }
        steps
    }
}

/// "12." style step number
fn is_step_marker(word: &str) -> bool {
    word.strip_suffix('.')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Opaque route geometry as returned by the backend
///
/// The navigation core never inspects it beyond handing it to the map
/// renderer. Renderers that understand the backend's overview polyline can
/// decode it with [`RouteGeometry::decode_path`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteGeometry(serde_json::Value);

impl RouteGeometry {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Encoded overview polyline (`overview_polyline.points`), if present
    pub fn encoded_polyline(&self) -> Option<&str> {
        self.0
            .get("overview_polyline")
            .and_then(|p| p.get("points"))
            .and_then(serde_json::Value::as_str)
    }

    /// Decode the overview polyline into a coordinate path
    pub fn decode_path(&self) -> Result<Vec<LatLng>> {
        let encoded = self.encoded_polyline().ok_or_else(|| {
            Error::InvalidInput("route geometry has no overview polyline".to_string())
        })?;
        polyline::decode(encoded)
    }

    /// Bounding box of the decoded path (None for an empty path)
    pub fn bounds(&self) -> Result<Option<Bounds>> {
        Ok(Bounds::from_path(&self.decode_path()?))
    }
}
