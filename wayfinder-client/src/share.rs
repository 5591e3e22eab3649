//! Shareable location messages

use serde::Serialize;
use wayfinder_common::LocationFix;

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/?api=1&query=";

/// Link and message describing where the user is and where they are going
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareMessage {
    pub maps_link: String,
    pub text: String,
}

impl ShareMessage {
    pub fn new(fix: &LocationFix, destination: &str) -> Self {
        let maps_link = maps_link(fix.latitude, fix.longitude);
        let text = format!("I'm at {}, navigating to {}.", maps_link, destination);
        Self { maps_link, text }
    }
}

/// Map search link for a coordinate
pub fn maps_link(latitude: f64, longitude: f64) -> String {
    format!("{}{:.6},{:.6}", MAPS_SEARCH_URL, latitude, longitude)
}
