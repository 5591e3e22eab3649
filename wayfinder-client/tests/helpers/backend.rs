//! Stub guidance backend

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use wayfinder_client::backend::{BackendError, GuidanceBackend};
use wayfinder_common::{GuidanceRequest, GuidanceResponse};

type Reply = Result<GuidanceResponse, BackendError>;

/// Answers from a queue, repeating `fallback` once the queue is empty
pub struct StubBackend {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    delay: Duration,
    hold: Option<Arc<Notify>>,
    requests: Mutex<Vec<GuidanceRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubBackend {
    /// Always answers with `instructions`
    pub fn answering(instructions: &str) -> Self {
        Self::new(Ok(GuidanceResponse::with_instructions(instructions)))
    }

    pub fn failing(error: BackendError) -> Self {
        Self::new(Err(error))
    }

    pub fn new(fallback: Reply) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            hold: None,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue a reply ahead of the fallback
    pub fn then(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Every request takes `delay` to answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Requests block until `release` is notified
    pub fn held_by(mut self, release: Arc<Notify>) -> Self {
        self.hold = Some(release);
        self
    }

    pub fn requests(&self) -> Vec<GuidanceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GuidanceBackend for StubBackend {
    async fn request_guidance(&self, request: &GuidanceRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(release) = &self.hold {
            release.notified().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let queued = self.replies.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| self.fallback.clone())
    }
}
