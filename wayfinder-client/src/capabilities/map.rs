//! Map-render collaborator interface

use wayfinder_common::RouteGeometry;

/// Receives route and position updates for display
///
/// Owns no session state; every call replaces what was shown before.
pub trait MapRenderer: Send + Sync {
    /// Draw the route returned by the backend, replacing any previous route
    fn render_route(&self, geometry: &RouteGeometry);

    /// Remove the drawn route (no-op when none is drawn)
    fn clear_route(&self);

    /// Move the user's position marker
    fn update_user_marker(&self, latitude: f64, longitude: f64);
}

/// Renderer for headless operation
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMap;

impl MapRenderer for NullMap {
    fn render_route(&self, _geometry: &RouteGeometry) {}

    fn clear_route(&self) {}

    fn update_user_marker(&self, _latitude: f64, _longitude: f64) {}
}
