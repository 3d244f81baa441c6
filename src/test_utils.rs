//! Test utilities and mock handlers.
//!
//! Handlers that record, fail, stall or delay deliveries, plus helpers for
//! building events, so bus and subscriber behaviour can be exercised
//! without a network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::bus::{BusError, EventHandler, Result as BusResult};
use crate::event::{Event, Sequence, SequencedEvent};

/// Build an event from a type tag and a JSON object payload.
///
/// Non-object payloads become an empty map.
pub fn make_event(event_type: &str, data: Value) -> Event {
    let data = match data {
        Value::Object(map) => map,
        _ => Default::default(),
    };
    Event::new(event_type, data)
}

/// Build an already sequenced event.
pub fn make_sequenced(sequence: Sequence, event_type: &str, data: Value) -> SequencedEvent {
    SequencedEvent::new(sequence, make_event(event_type, data))
}

/// `ParentCreated` for the reference thread projection.
pub fn parent_created(id: &str, title: &str) -> Event {
    make_event("ParentCreated", json!({"id": id, "title": title}))
}

/// `ChildCreated` for the reference thread projection.
pub fn child_created(id: &str, parent_id: &str, content: &str, status: &str) -> Event {
    make_event(
        "ChildCreated",
        json!({"id": id, "parentId": parent_id, "content": content, "status": status}),
    )
}

/// `ChildUpdated` for the reference thread projection.
pub fn child_updated(id: &str, parent_id: &str, content: &str, status: &str) -> Event {
    make_event(
        "ChildUpdated",
        json!({"id": id, "parentId": parent_id, "content": content, "status": status}),
    )
}

/// `ChildModerated` verdict for the reference thread projection.
pub fn child_moderated(id: &str, parent_id: &str, content: &str, status: &str) -> Event {
    make_event(
        "ChildModerated",
        json!({"id": id, "parentId": parent_id, "content": content, "status": status}),
    )
}

/// Records every delivered sequence, in arrival order.
#[derive(Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<Sequence>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequences received so far.
    pub fn sequences(&self) -> Vec<Sequence> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl EventHandler for RecordingHandler {
    fn handle(&self, event: Arc<SequencedEvent>) -> BoxFuture<'static, BusResult<()>> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(event.sequence);
        }
        Box::pin(async { Ok(()) })
    }
}

/// Fails every delivery while `failing` is set.
pub struct FailingHandler {
    failing: AtomicBool,
    attempts: AtomicUsize,
}

impl FailingHandler {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(true),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for FailingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for FailingHandler {
    fn handle(&self, event: Arc<SequencedEvent>) -> BoxFuture<'static, BusResult<()>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing.load(Ordering::SeqCst);
        Box::pin(async move {
            if failing {
                Err(BusError::Delivery {
                    subscriber: "failing".to_string(),
                    message: format!("refused event {}", event.sequence),
                })
            } else {
                Ok(())
            }
        })
    }
}

/// Never answers.
pub struct StalledHandler;

impl EventHandler for StalledHandler {
    fn handle(&self, _event: Arc<SequencedEvent>) -> BoxFuture<'static, BusResult<()>> {
        Box::pin(std::future::pending())
    }
}

/// Waits `delay` before forwarding to `inner`.
pub struct DelayedHandler {
    inner: Arc<dyn EventHandler>,
    delay: Duration,
}

impl DelayedHandler {
    pub fn new(inner: Arc<dyn EventHandler>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl EventHandler for DelayedHandler {
    fn handle(&self, event: Arc<SequencedEvent>) -> BoxFuture<'static, BusResult<()>> {
        let delay = self.delay;
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            inner.handle(event).await
        })
    }
}
