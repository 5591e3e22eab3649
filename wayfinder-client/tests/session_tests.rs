//! Navigation session state machine tests
//!
//! Covers:
//! - Start: acquisition, initial dispatch, transition to Tracking
//! - Failure paths returning to Idle
//! - Tracking cycle: rate-limited re-dispatch, dedup, non-overlap
//! - Stop and restart, including responses that arrive after stop

mod helpers;

use helpers::{Harness, ScriptedLocation, Step, StubBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use wayfinder_client::backend::BackendError;
use wayfinder_client::NavError;
use wayfinder_common::events::{NavEvent, SessionState};
use wayfinder_common::{GuidanceResponse, LocationFix, RouteGeometry};

/// Acquisition script reaching 15 m on the third fix, plus a silent tracking stream
fn library_location() -> ScriptedLocation {
    ScriptedLocation::new()
        .with_script(vec![
            Step::fix(50.0, 1000),
            Step::fix(35.0, 1000),
            Step::fix_at(LocationFix::new(-23.5610, -46.6560, 15.0), 1000),
        ])
        .with_script(Vec::new())
}

/// Quick acquisition followed by `tracking` as the tracking stream
fn tracking_location(tracking: Vec<Step>) -> ScriptedLocation {
    ScriptedLocation::new()
        .with_script(vec![Step::fix(10.0, 100)])
        .with_script(tracking)
}

fn periodic(count: usize) -> Vec<Step> {
    (1..=count)
        .map(|n| Step::fix_at(LocationFix::new(n as f64, 0.0, 8.0), 1000))
        .collect()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<NavEvent>) -> Vec<NavEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// Start
// ============================================================================

/// **Given:** a stream reaching 15 m on the third fix and a backend answering "1. Go north"
/// **When:** starting navigation to "Library"
/// **Then:**
///   - acquisition ends on the third fix and its watch is cleared
///   - one backend request carries "Library" and the 15 m fix coordinates
///   - "1. Go north" is spoken once and the session is Tracking
#[tokio::test(start_paused = true)]
async fn test_library_navigation_end_to_end() {
    let h = Harness::new(library_location(), StubBackend::answering("1. Go north"));

    h.session.start("Library").await.unwrap();

    assert_eq!(h.session.state(), SessionState::Tracking);
    assert_eq!(h.session.destination().as_deref(), Some("Library"));
    assert_eq!(h.session.best_fix_seen().unwrap().accuracy, 15.0);

    let requests = h.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].destination, "Library");
    assert_eq!(requests[0].latitude, -23.5610);
    assert_eq!(requests[0].longitude, -46.6560);

    assert_eq!(h.speech.spoken(), vec!["1. Go north"]);
    assert_eq!(h.session.last_announced(), "1. Go north");
    assert!(h.session.last_backend_sync().is_some());

    assert_eq!(h.location.cleared().len(), 1, "acquisition watch cleared");
    assert!(h.session.is_tracking());
    assert_eq!(h.location.active_watches(), 1);
}

/// **Given:** a backend returning HTTP 500
/// **When:** starting navigation
/// **Then:** the session returns to Idle, reports the status and never subscribes for tracking
#[tokio::test(start_paused = true)]
async fn test_initial_http_error_returns_to_idle() {
    let h = Harness::new(
        library_location(),
        StubBackend::failing(BackendError::Http {
            status: 500,
            detail: "Internal Server Error".to_string(),
        }),
    );

    let result = h.session.start("Library").await;

    assert!(matches!(
        result,
        Err(NavError::BackendHttpError { status: 500, .. })
    ));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.session.status().contains("HTTP 500"));
    assert!(!h.session.is_tracking());
    assert_eq!(h.location.watch_calls(), 1, "only the acquisition watch");
    assert_eq!(h.location.active_watches(), 0);
    assert!(h.speech.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_timeout_returns_to_idle() {
    let h = Harness::new(ScriptedLocation::new(), StubBackend::answering("1. Go north"));

    let result = h.session.start("Library").await;

    assert!(matches!(result, Err(NavError::AcquisitionTimeout(_))));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.session.destination(), None);
    assert_eq!(h.backend.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_blank_destination_is_rejected() {
    let h = Harness::new(library_location(), StubBackend::answering("1. Go north"));

    let result = h.session.start("   ").await;

    assert_eq!(result, Err(NavError::InvalidDestination));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.location.watch_calls(), 0);
}

/// **Given:** a backend answering with no instructions
/// **When:** starting navigation
/// **Then:** the session still tracks, reports guidance unavailable and speaks nothing
#[tokio::test(start_paused = true)]
async fn test_empty_instructions_still_enter_tracking() {
    let h = Harness::new(
        library_location(),
        StubBackend::new(Ok(GuidanceResponse::default())),
    );

    h.session.start("Library").await.unwrap();

    assert_eq!(h.session.state(), SessionState::Tracking);
    assert!(h.session.status().contains("unavailable"));
    assert!(h.speech.spoken().is_empty());
    assert_eq!(h.session.last_announced(), "");
    assert!(h.speech.cancels() >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_state_transitions_are_published() {
    let h = Harness::new(library_location(), StubBackend::answering("1. Go north"));
    let mut rx = h.events.subscribe();

    h.session.start("Library").await.unwrap();

    let states: Vec<SessionState> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            NavEvent::StateChanged { new_state, .. } => Some(new_state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            SessionState::AcquiringLocation,
            SessionState::AwaitingGuidance,
            SessionState::Tracking,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_route_geometry_is_rendered() {
    let route = RouteGeometry::new(serde_json::json!({
        "overview_polyline": {"points": "_p~iF~ps|U_ulLnnqC"}
    }));
    let h = Harness::new(
        library_location(),
        StubBackend::new(Ok(GuidanceResponse {
            instructions: Some("1. Go north".to_string()),
            route_geometry: Some(route.clone()),
        })),
    );

    h.session.start("Library").await.unwrap();

    assert_eq!(h.map.routes(), vec![route]);
    let (lat, lon) = *h.map.markers().last().unwrap();
    assert_eq!((lat, lon), (-23.5610, -46.6560));
}

/// **Given:** a platform without speech output
/// **When:** starting navigation
/// **Then:** guidance is recorded, nothing is spoken and the status says so
#[tokio::test(start_paused = true)]
async fn test_missing_speech_is_reported_in_status() {
    let h = Harness::new(library_location(), StubBackend::answering("1. Go north"));
    h.speech.set_available(false);

    h.session.start("Library").await.unwrap();

    assert_eq!(h.session.state(), SessionState::Tracking);
    assert!(h.speech.spoken().is_empty());
    assert_eq!(h.session.last_announced(), "1. Go north");
    assert_eq!(
        h.session.status(),
        "Navigating to Library. Speech output is not available; guidance is shown as text."
    );
}

// ============================================================================
// Tracking cycle
// ============================================================================

/// **Given:** a tracking fix every second and a backend repeating the same text
/// **When:** tracking for 25 seconds
/// **Then:** the backend is re-queried at 10 s and 20 s but the text is spoken once
#[tokio::test(start_paused = true)]
async fn test_tracking_redispatches_without_repeating_speech() {
    let h = Harness::new(
        tracking_location(periodic(25)),
        StubBackend::answering("1. Go north"),
    );

    h.session.start("Library").await.unwrap();
    tokio::time::sleep(Duration::from_secs(26)).await;

    let requests = h.backend.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].latitude, 10.0);
    assert_eq!(requests[2].latitude, 20.0);
    assert_eq!(h.speech.spoken(), vec!["1. Go north"]);
    assert_eq!(h.session.current_position().unwrap().latitude, 25.0);
}

/// **Given:** "Turn left" still being spoken
/// **When:** the next tracking cycle returns "Turn right"
/// **Then:** the first utterance is cancelled and the new one spoken
#[tokio::test(start_paused = true)]
async fn test_changed_instruction_interrupts_speech() {
    let h = Harness::new(
        tracking_location(periodic(12)),
        StubBackend::answering("Turn right").then(Ok(GuidanceResponse::with_instructions("Turn left"))),
    );

    h.session.start("Library").await.unwrap();
    assert_eq!(h.speech.spoken(), vec!["Turn left"]);

    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(h.speech.spoken(), vec!["Turn left", "Turn right"]);
    assert_eq!(h.speech.cancels(), 1);
    assert_eq!(h.session.last_announced(), "Turn right");
}

/// **Given:** a backend that takes 25 s to answer and a 10 s update interval
/// **When:** tracking for 70 seconds
/// **Then:** no two requests are ever in flight together
#[tokio::test(start_paused = true)]
async fn test_dispatches_never_overlap() {
    let h = Harness::new(
        tracking_location(periodic(60)),
        StubBackend::answering("1. Go north").with_delay(Duration::from_secs(25)),
    );

    h.session.start("Library").await.unwrap();
    tokio::time::sleep(Duration::from_secs(70)).await;

    assert_eq!(h.backend.max_in_flight(), 1);
    // Initial dispatch, then fixes 10 and 40; the other forwarded fixes arrive mid-request
    assert_eq!(h.backend.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_tracking_failure_is_not_fatal() {
    let h = Harness::new(
        tracking_location(periodic(15)),
        StubBackend::failing(BackendError::Network("connection refused".to_string()))
            .then(Ok(GuidanceResponse::with_instructions("1. Go north"))),
    );
    let mut rx = h.events.subscribe();

    h.session.start("Library").await.unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(h.session.state(), SessionState::Tracking);
    assert!(h.session.is_tracking());
    assert!(h.session.status().contains("connection refused"));
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, NavEvent::BackendSyncFailed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_tracking_stream_error_is_reported() {
    let h = Harness::new(
        tracking_location(vec![Step::error(
            wayfinder_client::capabilities::LocationError::PermissionDenied,
            1000,
        )]),
        StubBackend::answering("1. Go north"),
    );

    h.session.start("Library").await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(h.session.state(), SessionState::Tracking);
    assert!(h.session.status().starts_with("GPS error"));
    assert!(h.session.is_tracking());
}

/// **Given:** a tracking stream the capability closes after two fixes
/// **When:** the stream ends
/// **Then:** the session reports the loss, keeps its guidance and holds no watch
#[tokio::test(start_paused = true)]
async fn test_closed_tracking_stream_is_reported() {
    let h = Harness::new(
        tracking_location(vec![
            Step::fix(8.0, 1000),
            Step::fix(8.0, 1000),
            Step::close(1000),
        ]),
        StubBackend::answering("1. Go north"),
    );

    h.session.start("Library").await.unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;

    assert_eq!(h.session.state(), SessionState::Tracking);
    assert!(!h.session.is_tracking());
    assert!(h.session.status().starts_with("GPS error"));
    assert_eq!(h.location.active_watches(), 0);
    assert_eq!(h.session.last_announced(), "1. Go north");
}

// ============================================================================
// Stop and restart
// ============================================================================

/// **Given:** an active Tracking session
/// **When:** stop is called twice
/// **Then:** the session is Idle, every watch was cleared exactly once,
///   speech was cancelled and the route cleared
#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let h = Harness::new(library_location(), StubBackend::answering("1. Go north"));
    h.session.start("Library").await.unwrap();

    h.session.stop();
    h.session.stop();

    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.session.destination(), None);
    assert_eq!(h.session.last_announced(), "");
    assert!(!h.session.is_tracking());

    let cleared = h.location.cleared();
    assert_eq!(cleared.len(), 2);
    assert_ne!(cleared[0], cleared[1]);
    assert_eq!(h.location.active_watches(), 0);

    assert_eq!(h.speech.cancels(), 1);
    assert_eq!(h.map.clears(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_passes_through_stopped() {
    let h = Harness::new(library_location(), StubBackend::answering("1. Go north"));
    h.session.start("Library").await.unwrap();
    let mut rx = h.events.subscribe();

    h.session.stop();

    let states: Vec<SessionState> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            NavEvent::StateChanged { new_state, .. } => Some(new_state),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![SessionState::Stopped, SessionState::Idle]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_idle_does_nothing() {
    let h = Harness::new(library_location(), StubBackend::answering("1. Go north"));

    h.session.stop();

    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.speech.cancels(), 0);
    assert_eq!(h.location.watch_calls(), 0);
}

/// **Given:** acquisition still waiting for a fix
/// **When:** stop is called
/// **Then:** start returns Cancelled and the backend is never contacted
#[tokio::test(start_paused = true)]
async fn test_stop_during_acquisition() {
    let h = Harness::new(ScriptedLocation::new(), StubBackend::answering("1. Go north"));

    let session = h.session.clone();
    let start = tokio::spawn(async move { session.start("Library").await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.session.state(), SessionState::AcquiringLocation);
    h.session.stop();
    assert_eq!(h.location.cleared().len(), 1);

    assert_eq!(start.await.unwrap(), Err(NavError::Cancelled));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.location.cleared().len(), 1);
    assert_eq!(h.backend.calls(), 0);
}

/// **Given:** the initial backend request still in flight
/// **When:** the session is stopped and the response then arrives
/// **Then:** the response is discarded: nothing spoken, nothing rendered, still Idle
#[tokio::test(start_paused = true)]
async fn test_response_after_stop_is_discarded() {
    let release = Arc::new(Notify::new());
    let h = Harness::new(
        library_location(),
        StubBackend::answering("1. Go north").held_by(release.clone()),
    );

    let session = h.session.clone();
    let start = tokio::spawn(async move { session.start("Library").await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.session.state(), SessionState::AwaitingGuidance);
    assert_eq!(h.backend.calls(), 1);

    h.session.stop();
    release.notify_waiters();

    assert_eq!(start.await.unwrap(), Err(NavError::Cancelled));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.speech.spoken().is_empty());
    assert!(h.map.routes().is_empty());
    assert_eq!(h.location.watch_calls(), 1);
}

/// **Given:** a tracking-cycle request held in flight
/// **When:** the session is stopped and the response then arrives
/// **Then:** nothing new is spoken or rendered and the session stays Idle
#[tokio::test(start_paused = true)]
async fn test_tracking_response_after_stop_is_discarded() {
    let release = Arc::new(Notify::new());
    let route = RouteGeometry::new(serde_json::json!({
        "overview_polyline": {"points": "_p~iF~ps|U"}
    }));
    let h = Harness::new(
        tracking_location(periodic(20)),
        StubBackend::new(Ok(GuidanceResponse {
            instructions: Some("2. Turn left".to_string()),
            route_geometry: Some(route),
        }))
        .then(Ok(GuidanceResponse::with_instructions("1. Go north")))
        .held_by(release.clone()),
    );

    let session = h.session.clone();
    let start = tokio::spawn(async move { session.start("Library").await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    release.notify_waiters();
    start.await.unwrap().unwrap();

    // Fix 10 is forwarded and its request is held
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(h.backend.calls(), 2);

    h.session.stop();
    release.notify_waiters();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.speech.spoken(), vec!["1. Go north"]);
    assert!(h.map.routes().is_empty());
    assert_eq!(h.session.last_announced(), "");
    assert_eq!(h.backend.calls(), 2);
}

/// **Given:** a session in Tracking
/// **When:** every handle to it is dropped without calling stop
/// **Then:** the tracking watch is cleared and the backend is not called again
#[tokio::test(start_paused = true)]
async fn test_dropping_session_releases_tracking() {
    let h = Harness::new(
        tracking_location(periodic(40)),
        StubBackend::answering("1. Go north"),
    );

    h.session.start("Library").await.unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(h.backend.calls(), 2);
    assert_eq!(h.location.active_watches(), 1);

    drop(h.session);
    assert_eq!(h.location.active_watches(), 0);

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(h.backend.calls(), 2);
    assert_eq!(h.location.active_watches(), 0);
}

/// **Given:** an active session to "Library"
/// **When:** navigation to "Museum" is started
/// **Then:** the first session is fully stopped before the second begins
#[tokio::test(start_paused = true)]
async fn test_restart_stops_previous_session() {
    let location = ScriptedLocation::new()
        .with_script(vec![Step::fix(10.0, 100)])
        .with_script(Vec::new())
        .with_script(vec![Step::fix(12.0, 100)])
        .with_script(Vec::new());
    let h = Harness::new(location, StubBackend::answering("1. Go north"));

    h.session.start("Library").await.unwrap();
    let first_id = h.session.session_id();

    h.session.start("Museum").await.unwrap();

    assert_eq!(h.session.state(), SessionState::Tracking);
    assert_eq!(h.session.destination().as_deref(), Some("Museum"));
    assert_ne!(h.session.session_id(), first_id);
    // First acquisition, first tracking, second acquisition
    assert_eq!(h.location.cleared().len(), 3);
    assert_eq!(h.location.active_watches(), 1);
    // Dedup memory was reset, so the same text is spoken again
    assert_eq!(h.speech.spoken(), vec!["1. Go north", "1. Go north"]);
    assert_eq!(h.backend.requests()[1].destination, "Museum");
}

// ============================================================================
// Share location
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_share_location_uses_current_position() {
    let h = Harness::new(library_location(), StubBackend::answering("1. Go north"));
    h.session.start("Library").await.unwrap();

    let message = h.session.share_location().await.unwrap();

    assert!(message.maps_link.ends_with("query=-23.561000,-46.656000"));
    assert!(message.text.ends_with("navigating to Library."));
}

#[tokio::test(start_paused = true)]
async fn test_share_location_requires_navigation() {
    let h = Harness::new(library_location(), StubBackend::answering("1. Go north"));

    assert_eq!(
        h.session.share_location().await,
        Err(NavError::NotNavigating)
    );
}
