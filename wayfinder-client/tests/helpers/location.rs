//! Scripted location capability

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wayfinder_client::capabilities::{
    FixOptions, FixResult, FixSender, LocationCapability, LocationError, WatchId,
};
use wayfinder_common::LocationFix;

pub const BASE_LAT: f64 = -23.5505;
pub const BASE_LON: f64 = -46.6333;

/// Fix at the base coordinate with the given accuracy
pub fn fix(accuracy: f64) -> LocationFix {
    LocationFix::new(BASE_LAT, BASE_LON, accuracy)
}

pub fn fix_at(latitude: f64, longitude: f64, accuracy: f64) -> LocationFix {
    LocationFix::new(latitude, longitude, accuracy)
}

/// One scripted stream event, delivered `after` the previous one
#[derive(Debug, Clone)]
pub enum Step {
    Fix { fix: LocationFix, after: Duration },
    Error { error: LocationError, after: Duration },
    /// Capability closes the stream
    Close { after: Duration },
}

impl Step {
    pub fn fix(accuracy: f64, after_ms: u64) -> Self {
        Step::Fix {
            fix: fix(accuracy),
            after: Duration::from_millis(after_ms),
        }
    }

    pub fn fix_at(fix: LocationFix, after_ms: u64) -> Self {
        Step::Fix {
            fix,
            after: Duration::from_millis(after_ms),
        }
    }

    pub fn error(error: LocationError, after_ms: u64) -> Self {
        Step::Error {
            error,
            after: Duration::from_millis(after_ms),
        }
    }

    pub fn close(after_ms: u64) -> Self {
        Step::Close {
            after: Duration::from_millis(after_ms),
        }
    }

    fn delay(&self) -> Duration {
        match self {
            Step::Fix { after, .. } | Step::Error { after, .. } | Step::Close { after } => *after,
        }
    }
}

/// Location capability whose watches play queued scripts
///
/// Each `watch` call takes the next script; with none left the stream stays
/// open and silent. A stream stays open after its script ends until the
/// watch is cleared.
pub struct ScriptedLocation {
    available: bool,
    scripts: Mutex<VecDeque<Vec<Step>>>,
    single_fix: Mutex<Option<FixResult>>,
    next_id: AtomicU64,
    sinks: Arc<Mutex<HashMap<u64, FixSender>>>,
    watch_calls: AtomicUsize,
    cleared: Mutex<Vec<WatchId>>,
    last_options: Mutex<Option<FixOptions>>,
}

impl ScriptedLocation {
    pub fn new() -> Self {
        Self {
            available: true,
            scripts: Mutex::new(VecDeque::new()),
            single_fix: Mutex::new(None),
            next_id: AtomicU64::new(1),
            sinks: Arc::new(Mutex::new(HashMap::new())),
            watch_calls: AtomicUsize::new(0),
            cleared: Mutex::new(Vec::new()),
            last_options: Mutex::new(None),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Queue the script for the next watch
    pub fn with_script(self, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().push_back(steps);
        self
    }

    /// `count` fixes, one every `every_ms`, latitude offset by the fix number
    pub fn with_periodic_script(self, count: usize, every_ms: u64, accuracy: f64) -> Self {
        let steps = (1..=count)
            .map(|n| Step::fix_at(fix_at(n as f64, BASE_LON, accuracy), every_ms))
            .collect();
        self.with_script(steps)
    }

    /// Answer for `get_one_fix`
    pub fn with_single_fix(self, result: FixResult) -> Self {
        *self.single_fix.lock().unwrap() = Some(result);
        self
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub fn cleared(&self) -> Vec<WatchId> {
        self.cleared.lock().unwrap().clone()
    }

    pub fn active_watches(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    pub fn last_options(&self) -> Option<FixOptions> {
        *self.last_options.lock().unwrap()
    }

    /// Deliver a fix to every open watch immediately
    pub fn push_fix(&self, fix: LocationFix) {
        for sink in self.sinks.lock().unwrap().values() {
            let _ = sink.send(Ok(fix));
        }
    }
}

#[async_trait]
impl LocationCapability for ScriptedLocation {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn get_one_fix(&self, _options: FixOptions) -> FixResult {
        self.single_fix
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Err(LocationError::PositionUnavailable("no fix scripted".to_string())))
    }

    fn watch(&self, options: FixOptions, sink: FixSender) -> Result<WatchId, LocationError> {
        if !self.available {
            return Err(LocationError::Unsupported);
        }
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().insert(id, sink);

        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let sinks = Arc::clone(&self.sinks);
        tokio::spawn(async move {
            for step in script {
                tokio::time::sleep(step.delay()).await;

                let mut open = sinks.lock().unwrap();
                let Some(sink) = open.get(&id) else {
                    return; // cleared
                };
                let _ = match step {
                    Step::Fix { fix, .. } => sink.send(Ok(fix)),
                    Step::Error { error, .. } => sink.send(Err(error)),
                    Step::Close { .. } => {
                        open.remove(&id);
                        return;
                    }
                };
            }
        });

        Ok(WatchId(id))
    }

    fn clear_watch(&self, id: WatchId) {
        self.sinks.lock().unwrap().remove(&id.0);
        self.cleared.lock().unwrap().push(id);
    }
}
