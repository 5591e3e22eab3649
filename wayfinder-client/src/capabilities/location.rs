//! Location capability interface and subscription guard
//!
//! The capability delivers fixes through a channel. Every continuous
//! subscription is wrapped in a [`WatchGuard`] so the underlying watch is
//! cleared exactly once, whichever of explicit cancel or drop happens first.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use wayfinder_common::LocationFix;

/// Location capability errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    PositionUnavailable(String),

    /// No fix within the per-fix timeout; the stream stays open
    #[error("timed out waiting for a fix")]
    Timeout,

    #[error("location capability not supported")]
    Unsupported,
}

pub type FixResult = Result<LocationFix, LocationError>;

/// Sink the capability pushes fixes (or stream errors) into
pub type FixSender = mpsc::UnboundedSender<FixResult>;

/// Options passed to the capability for each fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOptions {
    pub high_accuracy: bool,
    /// Maximum wait for a single fix
    pub timeout: Duration,
    /// Maximum age of a cached fix the capability may return
    pub maximum_age: Duration,
}

impl FixOptions {
    /// High accuracy, no cached fixes
    pub fn fresh_high_accuracy(timeout: Duration) -> Self {
        Self {
            high_accuracy: true,
            timeout,
            maximum_age: Duration::ZERO,
        }
    }
}

/// Identifier of an active continuous subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Position sensor
#[async_trait]
pub trait LocationCapability: Send + Sync {
    /// False when the platform has no position source
    fn is_available(&self) -> bool;

    /// Request a single fix
    async fn get_one_fix(&self, options: FixOptions) -> FixResult;

    /// Start a continuous subscription delivering into `sink`
    ///
    /// The capability must stop sending (and drop `sink`) once
    /// [`clear_watch`](Self::clear_watch) is called for the returned id.
    fn watch(&self, options: FixOptions, sink: FixSender) -> Result<WatchId, LocationError>;

    /// End a continuous subscription
    fn clear_watch(&self, id: WatchId);
}

/// Clears a watch exactly once
///
/// Shared between the task reading the stream and whoever is allowed to stop
/// it, so a stop does not have to wait for the reading task to wind down.
pub struct WatchGuard {
    location: Arc<dyn LocationCapability>,
    id: Mutex<Option<WatchId>>,
}

impl WatchGuard {
    fn new(location: Arc<dyn LocationCapability>, id: WatchId) -> Self {
        Self {
            location,
            id: Mutex::new(Some(id)),
        }
    }

    /// Clear the watch; returns false when it was already cleared
    pub fn cancel(&self) -> bool {
        let taken = self
            .id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match taken {
            Some(id) => {
                debug!(watch_id = id.0, "Clearing location watch");
                self.location.clear_watch(id);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    pub fn watch_id(&self) -> Option<WatchId> {
        *self
            .id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A live continuous subscription
pub struct FixSubscription {
    guard: Arc<WatchGuard>,
    rx: mpsc::UnboundedReceiver<FixResult>,
}

impl FixSubscription {
    /// Start watching with `options`
    pub fn open(
        location: Arc<dyn LocationCapability>,
        options: FixOptions,
    ) -> Result<Self, LocationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = location.watch(options, tx)?;
        debug!(watch_id = id.0, timeout_ms = options.timeout.as_millis() as u64, "Location watch started");

        Ok(Self {
            guard: Arc::new(WatchGuard::new(location, id)),
            rx,
        })
    }

    /// Next fix or stream error; None once cancelled or the capability closed the stream
    pub async fn next(&mut self) -> Option<FixResult> {
        if !self.guard.is_active() {
            return None;
        }
        self.rx.recv().await
    }

    /// Handle that can cancel this subscription from elsewhere
    pub fn guard(&self) -> Arc<WatchGuard> {
        Arc::clone(&self.guard)
    }

    pub fn cancel(&self) -> bool {
        self.guard.cancel()
    }
}
