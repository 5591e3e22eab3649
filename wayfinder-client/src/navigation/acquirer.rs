//! Initial fix acquisition
//!
//! The first fixes a receiver reports after waking up are usually coarse
//! (cell or Wi-Fi positioning). Acquisition keeps watching until a fix is
//! accurate enough, or falls back to the best fix seen once the overall
//! deadline passes.

use crate::capabilities::{
    FixOptions, FixSubscription, LocationCapability, LocationError, WatchGuard,
};
use crate::error::{NavError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wayfinder_common::time::age_of;
use wayfinder_common::LocationFix;

pub struct AccuracyAcquirer {
    location: Arc<dyn LocationCapability>,
}

impl AccuracyAcquirer {
    pub fn new(location: Arc<dyn LocationCapability>) -> Self {
        Self { location }
    }

    /// Obtain one fix with accuracy within `threshold_m`
    ///
    /// Resolves with the first fix meeting the threshold. When
    /// `overall_deadline` passes first, resolves with the most accurate fix
    /// seen, or fails with [`NavError::AcquisitionTimeout`] if there was none.
    pub async fn acquire(
        &self,
        threshold_m: f64,
        per_fix_timeout: Duration,
        overall_deadline: Duration,
    ) -> Result<LocationFix> {
        self.acquire_with_cancel(
            threshold_m,
            per_fix_timeout,
            overall_deadline,
            &CancellationToken::new(),
        )
        .await
    }

    /// [`acquire`](Self::acquire) that gives up with [`NavError::Cancelled`] when `cancel` fires
    pub async fn acquire_with_cancel(
        &self,
        threshold_m: f64,
        per_fix_timeout: Duration,
        overall_deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<LocationFix> {
        self.begin(threshold_m, per_fix_timeout, overall_deadline)?
            .run(cancel)
            .await
    }

    /// Subscribe without waiting yet
    ///
    /// Lets the caller hold on to the watch guard so it can unsubscribe
    /// synchronously while [`Acquisition::run`] is pending elsewhere.
    pub fn begin(
        &self,
        threshold_m: f64,
        per_fix_timeout: Duration,
        overall_deadline: Duration,
    ) -> Result<Acquisition> {
        if !self.location.is_available() {
            return Err(NavError::AcquisitionUnsupported);
        }

        let options = FixOptions::fresh_high_accuracy(per_fix_timeout);
        let subscription =
            FixSubscription::open(Arc::clone(&self.location), options).map_err(|e| match e {
                LocationError::Unsupported => NavError::AcquisitionUnsupported,
                other => NavError::LocationStream(other),
            })?;

        Ok(Acquisition {
            subscription,
            threshold_m,
            overall_deadline,
        })
    }
}

/// A subscribed, not yet completed acquisition
pub struct Acquisition {
    subscription: FixSubscription,
    threshold_m: f64,
    overall_deadline: Duration,
}

impl Acquisition {
    pub fn guard(&self) -> Arc<WatchGuard> {
        self.subscription.guard()
    }

    /// Wait for a qualifying fix; the deadline starts now
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<LocationFix> {
        let threshold_m = self.threshold_m;
        let overall_deadline = self.overall_deadline;

        let deadline = tokio::time::sleep(overall_deadline);
        tokio::pin!(deadline);

        let mut best: Option<LocationFix> = None;
        let mut fixes_seen: u32 = 0;

        let outcome = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Acquisition cancelled");
                    break Err(NavError::Cancelled);
                }

                event = self.subscription.next() => match event {
                    Some(Ok(fix)) if !fix.has_valid_accuracy() => {
                        debug!(accuracy_m = fix.accuracy, "Ignoring fix with unusable accuracy");
                    }
                    Some(Ok(fix)) => {
                        fixes_seen += 1;
                        debug!(
                            accuracy_m = fix.accuracy,
                            age_ms = age_of(fix.timestamp).as_millis() as u64,
                            fixes_seen,
                            "Fix received"
                        );

                        if best.map_or(true, |b| fix.is_more_accurate_than(&b)) {
                            best = Some(fix);
                        }
                        if fix.meets_threshold(threshold_m) {
                            info!(accuracy_m = fix.accuracy, fixes_seen, "Accuracy target reached");
                            break Ok(fix);
                        }
                    }
                    Some(Err(LocationError::Timeout)) => {
                        debug!("Per-fix timeout, still waiting for a better fix");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Location stream failed during acquisition");
                        break Err(NavError::LocationStream(e));
                    }
                    None => {
                        debug!("Location stream closed during acquisition");
                        break fall_back(best, overall_deadline, threshold_m);
                    }
                },

                _ = &mut deadline => {
                    break fall_back(best, overall_deadline, threshold_m);
                }
            }
        };

        self.subscription.cancel();
        outcome
    }
}

fn fall_back(
    best: Option<LocationFix>,
    overall_deadline: Duration,
    threshold_m: f64,
) -> Result<LocationFix> {
    match best {
        Some(fix) => {
            warn!(
                accuracy_m = fix.accuracy,
                threshold_m, "Accuracy target not reached, using best fix"
            );
            Ok(fix)
        }
        None => Err(NavError::AcquisitionTimeout(overall_deadline)),
    }
}
