//! Recorded track replay

use crate::capabilities::{FixOptions, FixResult, FixSender, LocationCapability, LocationError, WatchId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wayfinder_common::time::millis_to_duration;
use wayfinder_common::{Error, LocationFix, Result};

/// One line of a track file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    /// Wait before this point is reported
    #[serde(default)]
    pub delay_ms: u64,
}

impl TrackPoint {
    fn to_fix(self) -> LocationFix {
        LocationFix::new(self.latitude, self.longitude, self.accuracy)
    }
}

/// Parse JSON lines; blank lines and `#` comments are skipped
pub fn parse_track(content: &str) -> Result<Vec<TrackPoint>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(number, line)| {
            serde_json::from_str(line)
                .map_err(|e| Error::Parse(format!("track line {}: {}", number + 1, e)))
        })
        .collect()
}

pub fn load_track(path: &Path) -> Result<Vec<TrackPoint>> {
    let content = std::fs::read_to_string(path)?;
    let points = parse_track(&content)?;
    if points.is_empty() {
        return Err(Error::InvalidInput(format!("track {} has no points", path.display())));
    }
    Ok(points)
}

/// Location capability replaying a track
///
/// All watches share one cursor, so acquisition consumes the first points
/// and tracking continues from where acquisition stopped.
pub struct ReplayLocation {
    points: Arc<Vec<TrackPoint>>,
    cursor: Arc<AtomicUsize>,
    next_id: AtomicU64,
    watches: Mutex<HashMap<u64, CancellationToken>>,
    finished: Arc<Notify>,
}

impl ReplayLocation {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self {
            points: Arc::new(points),
            cursor: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
            watches: Mutex::new(HashMap::new()),
            finished: Arc::new(Notify::new()),
        }
    }

    /// Points not yet reported
    pub fn remaining(&self) -> usize {
        self.points
            .len()
            .saturating_sub(self.cursor.load(Ordering::SeqCst))
    }

    /// Resolves once the last point has been reported
    pub async fn wait_finished(&self) {
        self.finished.notified().await;
    }

    fn watches(&self) -> std::sync::MutexGuard<'_, HashMap<u64, CancellationToken>> {
        self.watches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LocationCapability for ReplayLocation {
    fn is_available(&self) -> bool {
        !self.points.is_empty()
    }

    async fn get_one_fix(&self, _options: FixOptions) -> FixResult {
        let index = self
            .cursor
            .load(Ordering::SeqCst)
            .min(self.points.len().saturating_sub(1));
        self.points
            .get(index)
            .map(|p| p.to_fix())
            .ok_or_else(|| LocationError::PositionUnavailable("track is empty".to_string()))
    }

    fn watch(&self, _options: FixOptions, sink: FixSender) -> std::result::Result<WatchId, LocationError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LocationError::PositionUnavailable(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        self.watches().insert(id, token.clone());

        let points = Arc::clone(&self.points);
        let cursor = Arc::clone(&self.cursor);
        let finished = Arc::clone(&self.finished);

        runtime.spawn(async move {
            loop {
                let index = cursor.load(Ordering::SeqCst);
                let Some(point) = points.get(index).copied() else {
                    info!(points = points.len(), "Track replay finished");
                    finished.notify_one();
                    break;
                };

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(millis_to_duration(point.delay_ms)) => {}
                }

                cursor.fetch_add(1, Ordering::SeqCst);
                if sink.send(Ok(point.to_fix())).is_err() {
                    break;
                }
            }
            debug!(watch_id = id, "Replay feeder ended");
        });

        Ok(WatchId(id))
    }

    fn clear_watch(&self, id: WatchId) {
        if let Some(token) = self.watches().remove(&id.0) {
            token.cancel();
        }
    }
}
