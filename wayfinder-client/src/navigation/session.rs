//! Navigation session state machine
//!
//! Coordinates one navigation from destination entry to stop:
//!
//! ```text
//! Idle -> AcquiringLocation -> AwaitingGuidance -> Tracking -> Stopped -> Idle
//! ```
//!
//! Acquisition or initial dispatch failure returns to `Idle`. While tracking,
//! each fix accepted by the rate limiter repeats the dispatch/announce cycle;
//! failures there are reported and the session keeps going.
//!
//! All state lives behind one mutex that is never held across an await.
//! Every asynchronous continuation carries the generation it was started
//! under and drops its result if the session has since been stopped or
//! restarted.

use super::acquirer::AccuracyAcquirer;
use super::announcer::InstructionAnnouncer;
use super::tracker::{RateLimitedTracker, TrackerEvent, TrackingHandle};
use crate::capabilities::{Capabilities, FixOptions, LocationError, WatchGuard};
use crate::error::{NavError, Result};
use crate::share::ShareMessage;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wayfinder_common::config::TomlConfig;
use wayfinder_common::events::{EventBus, NavEvent, SessionState};
use wayfinder_common::time::now;
use wayfinder_common::{GuidanceRequest, GuidanceResponse, LocationFix};

/// Timing and accuracy parameters for a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub accuracy_threshold_m: f64,
    pub acquisition_fix_timeout: Duration,
    pub acquisition_deadline: Duration,
    pub backend_update_interval: Duration,
    pub tracking_fix_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            accuracy_threshold_m: config.acquisition.accuracy_threshold_m,
            acquisition_fix_timeout: config.acquisition.per_fix_timeout(),
            acquisition_deadline: config.acquisition.overall_deadline(),
            backend_update_interval: config.tracking.backend_update_interval(),
            tracking_fix_timeout: config.tracking.per_fix_timeout(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

/// Keeps tracking-cycle dispatches from overlapping
///
/// Claimed when a fix is queued for dispatch, released when the dispatch
/// completes. Fixes accepted while it is held are dropped.
#[derive(Debug, Clone, Default)]
struct DispatchGate(Arc<AtomicBool>);

impl DispatchGate {
    fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Tracker plus the task that dispatches its accepted fixes
struct ActiveTracking {
    tracker: RateLimitedTracker,
    handle: TrackingHandle,
    dispatch_task: JoinHandle<()>,
}

impl ActiveTracking {
    fn stop(&mut self) {
        self.tracker.stop(&mut self.handle);
        self.dispatch_task.abort();
    }
}

impl Drop for ActiveTracking {
    fn drop(&mut self) {
        self.stop();
    }
}

struct SessionInner {
    session_id: Uuid,
    generation: u64,
    state: SessionState,
    destination: Option<String>,
    announcer: InstructionAnnouncer,
    last_backend_sync: Option<DateTime<Utc>>,
    best_fix_seen: Option<LocationFix>,
    current_position: Option<LocationFix>,
    status: String,
    route_rendered: bool,
    cancel: CancellationToken,
    acquisition_watch: Option<Arc<WatchGuard>>,
    tracking: Option<ActiveTracking>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(watch) = self.acquisition_watch.take() {
            watch.cancel();
        }
    }
}

/// One navigation session
///
/// Clones share the same session. Dropping the last clone stops any
/// tracking subscription it still owns.
#[derive(Clone)]
pub struct NavigationSession {
    caps: Capabilities,
    settings: SessionSettings,
    events: EventBus,
    inner: Arc<Mutex<SessionInner>>,
}

/// Handle held by background tracking work; does not keep the session alive
#[derive(Clone)]
struct WeakSession {
    caps: Capabilities,
    settings: SessionSettings,
    events: EventBus,
    inner: Weak<Mutex<SessionInner>>,
}

impl WeakSession {
    fn upgrade(&self) -> Option<NavigationSession> {
        self.inner.upgrade().map(|inner| NavigationSession {
            caps: self.caps.clone(),
            settings: self.settings.clone(),
            events: self.events.clone(),
            inner,
        })
    }
}

impl NavigationSession {
    pub fn new(caps: Capabilities, settings: SessionSettings, events: EventBus) -> Self {
        let inner = SessionInner {
            session_id: Uuid::new_v4(),
            generation: 0,
            state: SessionState::Idle,
            destination: None,
            announcer: InstructionAnnouncer::new(Arc::clone(&caps.speech)),
            last_backend_sync: None,
            best_fix_seen: None,
            current_position: None,
            status: String::new(),
            route_rendered: false,
            cancel: CancellationToken::new(),
            acquisition_watch: None,
            tracking: None,
        };

        Self {
            caps,
            settings,
            events,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    // ========================================
    // Accessors
    // ========================================

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Current status line
    pub fn status(&self) -> String {
        self.lock().status.clone()
    }

    pub fn destination(&self) -> Option<String> {
        self.lock().destination.clone()
    }

    /// Latest known position (initial fix, then every tracked fix)
    pub fn current_position(&self) -> Option<LocationFix> {
        self.lock().current_position
    }

    /// Fix the session started from
    pub fn best_fix_seen(&self) -> Option<LocationFix> {
        self.lock().best_fix_seen
    }

    /// Last instruction text handed to speech (empty when none)
    pub fn last_announced(&self) -> String {
        self.lock().announcer.last_announced().to_string()
    }

    /// When the last backend dispatch completed
    pub fn last_backend_sync(&self) -> Option<DateTime<Utc>> {
        self.lock().last_backend_sync
    }

    /// Correlation id of the current (or most recent) navigation
    pub fn session_id(&self) -> Uuid {
        self.lock().session_id
    }

    /// True while a tracking subscription is live
    pub fn is_tracking(&self) -> bool {
        self.lock()
            .tracking
            .as_ref()
            .is_some_and(|t| t.handle.is_active())
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    // ========================================
    // Operations
    // ========================================

    /// Start navigating to `destination`
    ///
    /// Returns once the session reaches `Tracking` (Ok) or has fallen back to
    /// `Idle` (Err). An active session is fully stopped first. A stop issued
    /// while this is pending makes it return [`NavError::Cancelled`].
    pub async fn start(&self, destination: &str) -> Result<()> {
        let destination = destination.trim();
        if destination.is_empty() {
            let error = NavError::InvalidDestination;
            let mut inner = self.lock();
            self.set_status(&mut inner, error.status_text(), true);
            return Err(error);
        }

        let (generation, cancel) = {
            let mut inner = self.lock();
            if inner.state.is_active() {
                info!(session_id = %inner.session_id, "Stopping active navigation before restart");
                self.teardown(&mut inner);
            }

            inner.generation += 1;
            inner.session_id = Uuid::new_v4();
            inner.cancel = CancellationToken::new();
            inner.destination = Some(destination.to_string());
            info!(session_id = %inner.session_id, destination = %destination, "Starting navigation");

            self.transition(&mut inner, SessionState::AcquiringLocation);
            self.set_status(&mut inner, "Acquiring your location...".to_string(), false);
            (inner.generation, inner.cancel.clone())
        };

        // Acquisition
        let acquisition = match AccuracyAcquirer::new(Arc::clone(&self.caps.location)).begin(
            self.settings.accuracy_threshold_m,
            self.settings.acquisition_fix_timeout,
            self.settings.acquisition_deadline,
        ) {
            Ok(acquisition) => acquisition,
            Err(e) => return Err(self.abandon_start(generation, e)),
        };
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return Err(NavError::Cancelled);
            }
            inner.acquisition_watch = Some(acquisition.guard());
        }

        let fix = match acquisition.run(&cancel).await {
            Ok(fix) => fix,
            Err(e) => return Err(self.abandon_start(generation, e)),
        };

        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return Err(NavError::Cancelled);
            }
            inner.acquisition_watch = None;
            inner.best_fix_seen = Some(fix);
            inner.current_position = Some(fix);
            self.caps.map.update_user_marker(fix.latitude, fix.longitude);

            self.transition(&mut inner, SessionState::AwaitingGuidance);
            self.set_status(
                &mut inner,
                format!(
                    "Location acquired (accuracy {:.0} m). Calculating route...",
                    fix.accuracy
                ),
                false,
            );
        }

        // Initial dispatch
        let response = match self.dispatch(generation, &cancel, fix).await {
            Ok(response) => response,
            Err(e) => return Err(self.abandon_start(generation, e)),
        };

        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(NavError::Cancelled);
        }
        self.apply_guidance(&mut inner, &response);
        self.transition(&mut inner, SessionState::Tracking);

        match self.start_tracking(generation, &cancel) {
            Ok(tracking) => inner.tracking = Some(tracking),
            Err(e) => {
                // Guidance was already delivered; keep it and report the loss of tracking
                warn!(session_id = %inner.session_id, error = %e, "Could not start tracking");
                self.set_status(&mut inner, e.status_text(), true);
            }
        }

        Ok(())
    }

    /// Stop navigating (idempotent, valid from any state)
    ///
    /// Cancels pending acquisition and dispatch, unsubscribes tracking,
    /// silences speech and clears the route before returning.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state == SessionState::Idle {
            debug!("Stop requested while idle");
            return;
        }
        info!(session_id = %inner.session_id, "Stopping navigation");
        self.teardown(&mut inner);
    }

    /// Build a share message for the current position and destination
    pub async fn share_location(&self) -> Result<ShareMessage> {
        let (destination, position) = {
            let inner = self.lock();
            match (&inner.destination, inner.state.is_active()) {
                (Some(destination), true) => (destination.clone(), inner.current_position),
                _ => return Err(NavError::NotNavigating),
            }
        };

        let fix = match position {
            Some(fix) => fix,
            None => {
                let options = FixOptions::fresh_high_accuracy(self.settings.acquisition_fix_timeout);
                self.caps.location.get_one_fix(options).await?
            }
        };

        Ok(ShareMessage::new(&fix, &destination))
    }

    // ========================================
    // Internals
    // ========================================

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn downgrade(&self) -> WeakSession {
        WeakSession {
            caps: self.caps.clone(),
            settings: self.settings.clone(),
            events: self.events.clone(),
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn transition(&self, inner: &mut SessionInner, new_state: SessionState) {
        let old_state = inner.state;
        if old_state == new_state {
            return;
        }
        inner.state = new_state;
        debug!(session_id = %inner.session_id, %old_state, %new_state, "Session state changed");

        self.events.emit_lossy(NavEvent::StateChanged {
            session_id: inner.session_id,
            old_state,
            new_state,
            timestamp: now(),
        });
    }

    fn set_status(&self, inner: &mut SessionInner, text: String, is_error: bool) {
        inner.status = text.clone();
        self.events.emit_lossy(NavEvent::StatusChanged {
            session_id: inner.session_id,
            text,
            is_error,
            timestamp: now(),
        });
    }

    /// Everything `stop` does, with the lock already held
    fn teardown(&self, inner: &mut SessionInner) {
        inner.generation += 1;
        inner.cancel.cancel();

        if let Some(watch) = inner.acquisition_watch.take() {
            watch.cancel();
        }
        if let Some(mut tracking) = inner.tracking.take() {
            tracking.stop();
        }

        inner.announcer.reset();
        self.caps.map.clear_route();
        inner.route_rendered = false;

        inner.destination = None;
        inner.best_fix_seen = None;
        inner.current_position = None;
        inner.last_backend_sync = None;

        self.transition(inner, SessionState::Stopped);
        self.set_status(inner, "Navigation stopped.".to_string(), false);
        self.transition(inner, SessionState::Idle);
    }

    /// Report a failed start and fall back to Idle, unless a stop got there first
    fn abandon_start(&self, generation: u64, error: NavError) -> NavError {
        let mut inner = self.lock();
        if inner.generation != generation {
            return NavError::Cancelled;
        }

        warn!(session_id = %inner.session_id, error = %error, "Navigation start failed");
        inner.generation += 1;
        inner.cancel.cancel();
        inner.acquisition_watch = None;
        inner.destination = None;
        inner.best_fix_seen = None;
        inner.current_position = None;
        self.transition(&mut inner, SessionState::Idle);
        self.set_status(&mut inner, error.status_text(), true);
        error
    }

    /// Send `fix` and the destination to the backend
    ///
    /// Returns [`NavError::Cancelled`] when the session moved on while the
    /// request was in flight; the response is discarded in that case.
    async fn dispatch(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        fix: LocationFix,
    ) -> Result<GuidanceResponse> {
        let (request, session_id) = {
            let inner = self.lock();
            if inner.generation != generation {
                return Err(NavError::Cancelled);
            }
            let destination = inner.destination.clone().ok_or(NavError::Cancelled)?;
            (GuidanceRequest::new(destination, &fix), inner.session_id)
        };

        debug!(
            %session_id,
            latitude = fix.latitude,
            longitude = fix.longitude,
            accuracy_m = fix.accuracy,
            "Dispatching to guidance backend"
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(NavError::Cancelled),
            result = self.caps.backend.request_guidance(&request) => result,
        };

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(%session_id, "Discarding guidance for an inactive session");
            return Err(NavError::Cancelled);
        }
        inner.last_backend_sync = Some(now());

        result.map_err(NavError::from)
    }

    /// Hand a backend response to speech, map and event listeners
    fn apply_guidance(&self, inner: &mut SessionInner, response: &GuidanceResponse) {
        match response.instruction_text() {
            Some(text) => {
                inner.announcer.announce(text);
                let destination = inner.destination.clone().unwrap_or_default();
                let status = if self.caps.speech.is_available() {
                    format!("Navigating to {}", destination)
                } else {
                    format!(
                        "Navigating to {}. {}",
                        destination,
                        NavError::SpeechUnsupported.status_text()
                    )
                };
                self.set_status(inner, status, false);
            }
            None => {
                debug!(session_id = %inner.session_id, "Backend returned no instructions");
                inner.announcer.reset();
                self.set_status(inner, "Navigation guidance unavailable.".to_string(), false);
            }
        }

        match &response.route_geometry {
            Some(geometry) => {
                self.caps.map.render_route(geometry);
                inner.route_rendered = true;
            }
            None if inner.route_rendered => {
                self.caps.map.clear_route();
                inner.route_rendered = false;
            }
            None => {}
        }

        self.events.emit_lossy(NavEvent::GuidanceUpdated {
            session_id: inner.session_id,
            instructions: response.instruction_text().map(str::to_string),
            steps: response.steps(),
            timestamp: now(),
        });
    }

    fn start_tracking(
        &self,
        generation: u64,
        cancel: &CancellationToken,
    ) -> Result<ActiveTracking> {
        let tracker = RateLimitedTracker::new(
            Arc::clone(&self.caps.location),
            Arc::clone(&self.caps.map),
            self.settings.backend_update_interval,
            self.settings.tracking_fix_timeout,
        );

        // Capacity 1: the gate guarantees at most one queued or in-flight fix
        let (fix_tx, fix_rx) = mpsc::channel::<LocationFix>(1);
        let gate = DispatchGate::default();

        let weak = self.downgrade();
        let callback_gate = gate.clone();
        let handle = tracker.start(move |event| {
            if let Some(session) = weak.upgrade() {
                session.on_tracker_event(generation, event, &callback_gate, &fix_tx);
            }
        })?;

        let dispatch_task = tokio::spawn(run_tracking_dispatch(
            self.downgrade(),
            generation,
            cancel.clone(),
            fix_rx,
            gate,
        ));

        Ok(ActiveTracking {
            tracker,
            handle,
            dispatch_task,
        })
    }

    fn on_tracker_event(
        &self,
        generation: u64,
        event: TrackerEvent,
        gate: &DispatchGate,
        fix_tx: &mpsc::Sender<LocationFix>,
    ) {
        match event {
            TrackerEvent::Moved(fix) => {
                let mut inner = self.lock();
                if inner.generation != generation {
                    return;
                }
                inner.current_position = Some(fix);
                self.events.emit_lossy(NavEvent::PositionUpdated {
                    session_id: inner.session_id,
                    fix,
                });
            }
            TrackerEvent::Accepted(fix) => {
                if !self.is_current(generation) {
                    return;
                }
                if !gate.try_claim() {
                    debug!("Backend dispatch still in flight, dropping accepted fix");
                    return;
                }
                if fix_tx.try_send(fix).is_err() {
                    gate.release();
                }
            }
            TrackerEvent::StreamError(e) => {
                let mut inner = self.lock();
                if inner.generation != generation {
                    return;
                }
                self.set_status(&mut inner, NavError::LocationStream(e).status_text(), true);
            }
            TrackerEvent::Closed => {
                let mut inner = self.lock();
                if inner.generation != generation {
                    return;
                }
                warn!(session_id = %inner.session_id, "Tracking ended, location stream closed");
                let error =
                    LocationError::PositionUnavailable("location updates stopped".to_string());
                self.set_status(&mut inner, NavError::LocationStream(error).status_text(), true);
            }
        }
    }
}

/// Dispatch accepted fixes one at a time until cancelled or the session is gone
async fn run_tracking_dispatch(
    weak: WeakSession,
    generation: u64,
    cancel: CancellationToken,
    mut fix_rx: mpsc::Receiver<LocationFix>,
    gate: DispatchGate,
) {
    loop {
        let fix = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            fix = fix_rx.recv() => match fix {
                Some(fix) => fix,
                None => break,
            },
        };
        let Some(session) = weak.upgrade() else {
            break;
        };

        match session.dispatch(generation, &cancel, fix).await {
            Ok(response) => {
                let mut inner = session.lock();
                if inner.generation == generation {
                    session.apply_guidance(&mut inner, &response);
                }
            }
            Err(NavError::Cancelled) => break,
            Err(e) => {
                let mut inner = session.lock();
                if inner.generation == generation {
                    warn!(session_id = %inner.session_id, error = %e, "Tracking sync failed");
                    session.set_status(&mut inner, e.status_text(), true);
                    session.events.emit_lossy(NavEvent::BackendSyncFailed {
                        session_id: inner.session_id,
                        error: e.to_string(),
                        timestamp: now(),
                    });
                }
            }
        }

        gate.release();
    }

    gate.release();
    debug!(generation, "Tracking dispatch loop ended");
}
