//! Continuous tracking with rate-limited forwarding
//!
//! Every fix moves the map marker. Only one fix per update interval is
//! forwarded for a backend sync; the interval clock starts when tracking
//! starts, so the first fix is not forwarded immediately.

use crate::capabilities::{
    FixOptions, FixSubscription, LocationCapability, LocationError, MapRenderer, WatchGuard,
};
use crate::error::{NavError, Result};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use wayfinder_common::LocationFix;

/// Delivered to the tracking callback
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// Every fix, before the rate limit is applied
    Moved(LocationFix),
    /// A fix that passed the rate limit
    Accepted(LocationFix),
    /// Stream error; the subscription stays active
    StreamError(LocationError),
    /// The capability closed the stream; tracking has ended
    Closed,
}

pub struct RateLimitedTracker {
    location: Arc<dyn LocationCapability>,
    map: Arc<dyn MapRenderer>,
    options: FixOptions,
    update_interval: Duration,
    current_position: Arc<RwLock<Option<LocationFix>>>,
}

impl RateLimitedTracker {
    pub fn new(
        location: Arc<dyn LocationCapability>,
        map: Arc<dyn MapRenderer>,
        update_interval: Duration,
        per_fix_timeout: Duration,
    ) -> Self {
        Self {
            location,
            map,
            options: FixOptions::fresh_high_accuracy(per_fix_timeout),
            update_interval,
            current_position: Arc::new(RwLock::new(None)),
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Latest fix from the stream, forwarded or not
    pub fn current_position(&self) -> Option<LocationFix> {
        *self
            .current_position
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe and deliver events to `on_event` from a background task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<F>(&self, mut on_event: F) -> Result<TrackingHandle>
    where
        F: FnMut(TrackerEvent) + Send + 'static,
    {
        if !self.location.is_available() {
            return Err(NavError::AcquisitionUnsupported);
        }

        let mut subscription = FixSubscription::open(Arc::clone(&self.location), self.options)?;
        let guard = subscription.guard();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task_guard = Arc::clone(&guard);
        let map = Arc::clone(&self.map);
        let current_position = Arc::clone(&self.current_position);
        let interval = self.update_interval;
        let mut last_forwarded = Instant::now();

        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => break,
                    event = subscription.next() => match event {
                        Some(event) => event,
                        None => {
                            warn!("Location stream closed while tracking");
                            task_guard.cancel();
                            on_event(TrackerEvent::Closed);
                            break;
                        }
                    },
                };

                match event {
                    Ok(fix) => {
                        *current_position
                            .write()
                            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(fix);
                        map.update_user_marker(fix.latitude, fix.longitude);
                        on_event(TrackerEvent::Moved(fix));

                        let now = Instant::now();
                        if now.duration_since(last_forwarded) >= interval {
                            last_forwarded = now;
                            debug!(accuracy_m = fix.accuracy, "Forwarding fix for backend sync");
                            on_event(TrackerEvent::Accepted(fix));
                        } else {
                            trace!("Fix within update interval, not forwarded");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Location stream error while tracking");
                        on_event(TrackerEvent::StreamError(e));
                    }
                }
            }
        });

        Ok(TrackingHandle {
            guard,
            cancel,
            task: Some(task),
        })
    }

    /// Stop a tracking subscription (idempotent)
    pub fn stop(&self, handle: &mut TrackingHandle) {
        handle.stop();
    }
}

/// Owns a running tracking subscription; stops it when dropped
pub struct TrackingHandle {
    guard: Arc<WatchGuard>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TrackingHandle {
    /// Unsubscribe and stop delivering events
    ///
    /// The watch is cleared before this returns; calling it again is a no-op.
    pub fn stop(&mut self) {
        if self.guard.cancel() {
            debug!("Tracking stopped");
        }
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// True until `stop` is called or the stream closes
    pub fn is_active(&self) -> bool {
        self.guard.is_active()
    }
}

impl Drop for TrackingHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
