//! View subscriber: a projector plus the bookkeeping that keeps it
//! consistent under out-of-order, duplicate and missing deliveries.
//!
//! The subscriber is the single writer of its view. Events are applied in
//! contiguous global sequence order only:
//!
//! - `sequence <= watermark`: duplicate, ignored
//! - `sequence == watermark + 1`: applied, then buffered successors drain
//! - otherwise: buffered, and the missing range is fetched from the replay feed
//!
//! Replay is the recovery mechanism. A missed delivery is never redelivered;
//! the next catch-up fills the hole. A catch-up that finds the feed's head
//! below the watermark means the relay started a new log (an in-memory
//! store after a restart): the view is discarded and rebuilt from it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::bus::{BusError, EventHandler, Result};
use crate::event::{Sequence, SequencedEvent, NO_SEQUENCE};
use crate::projectors::{apply_logged, ProjectionConfig, Projector};
use crate::replay::ReplayFeed;

/// What `ingest` did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The watermark moved forward (possibly past buffered successors).
    Advanced { watermark: Sequence },
    /// Already folded.
    Duplicate,
    /// Buffered; `missing_from..=missing_to` must arrive first.
    Gap {
        missing_from: Sequence,
        missing_to: Sequence,
    },
    /// The buffer was full and has been cleared. Replay must fill in.
    Overflow { missing_from: Sequence },
}

impl IngestOutcome {
    /// True if the view is waiting on events that only replay can supply.
    pub fn needs_catch_up(&self) -> bool {
        matches!(self, Self::Gap { .. } | Self::Overflow { .. })
    }
}

/// Result of a catch-up pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchUpReport {
    /// Events returned by the replay feed.
    pub fetched: usize,
    /// Watermark after ingesting them.
    pub watermark: Sequence,
    /// The view was discarded because the feed's log restarted.
    pub rebuilt: bool,
}

struct State<V> {
    view: V,
    watermark: Sequence,
    pending: BTreeMap<Sequence, SequencedEvent>,
}

impl<V: Default> State<V> {
    fn empty() -> Self {
        Self {
            view: V::default(),
            watermark: NO_SEQUENCE,
            pending: BTreeMap::new(),
        }
    }
}

struct Inner<P: Projector> {
    name: String,
    projector: P,
    state: Mutex<State<P::View>>,
    feed: Option<Arc<dyn ReplayFeed>>,
    max_pending: usize,
    catching_up: AtomicBool,
    rerun: AtomicBool,
}

/// Owns one projector and its view.
///
/// Cheap to clone; clones share the same view.
pub struct ViewSubscriber<P: Projector> {
    inner: Arc<Inner<P>>,
}

impl<P: Projector> Clone for ViewSubscriber<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Projector> ViewSubscriber<P> {
    /// Start building a subscriber around `projector`.
    pub fn builder(name: impl Into<String>, projector: P) -> ViewSubscriberBuilder<P> {
        ViewSubscriberBuilder {
            name: name.into(),
            projector,
            feed: None,
            max_pending: ProjectionConfig::default().max_pending,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Highest contiguously applied sequence.
    pub async fn watermark(&self) -> Sequence {
        self.inner.state.lock().await.watermark
    }

    /// Events buffered behind a gap.
    pub async fn pending_len(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    /// A copy of the current view.
    pub async fn snapshot(&self) -> P::View {
        self.inner.state.lock().await.view.clone()
    }

    /// Ingest one event, without triggering any catch-up.
    pub async fn ingest(&self, event: SequencedEvent) -> IngestOutcome {
        let mut state = self.inner.state.lock().await;
        self.ingest_locked(&mut state, event)
    }

    /// Ingest a batch under one lock. Returns the resulting watermark.
    pub async fn ingest_batch(&self, events: Vec<SequencedEvent>) -> Sequence {
        let mut state = self.inner.state.lock().await;
        for event in events {
            self.ingest_locked(&mut state, event);
        }
        state.watermark
    }

    /// Ingest one live event and schedule a catch-up if it reveals a gap.
    ///
    /// A live duplicate also schedules one: it is how a relay that restarted
    /// with an empty log first shows up.
    pub async fn receive(&self, event: SequencedEvent) -> IngestOutcome {
        let outcome = self.ingest(event).await;
        if outcome.needs_catch_up() || outcome == IngestOutcome::Duplicate {
            self.schedule_catch_up();
        }
        outcome
    }

    /// Pull everything after the watermark from the replay feed and fold it.
    ///
    /// If the feed's head is below the watermark the view is reset and the
    /// whole feed is folded again.
    #[tracing::instrument(name = "subscriber.catch_up", skip_all, fields(subscriber = %self.inner.name))]
    pub async fn catch_up(&self) -> Result<CatchUpReport> {
        let feed = self.inner.feed.as_ref().ok_or_else(|| {
            BusError::Replay(format!("subscriber '{}' has no replay feed", self.inner.name))
        })?;

        // Watermark first: live events ingested while the head is read
        // can only come from at or below that head.
        let seen = self.watermark().await;
        let head = feed.last_sequence().await?;
        let (after, rebuilt) = {
            let mut state = self.inner.state.lock().await;
            if head < seen {
                warn!(
                    head,
                    watermark = seen,
                    "Replay feed is behind the view, relay log restarted; rebuilding"
                );
                *state = State::empty();
                (NO_SEQUENCE, true)
            } else {
                (state.watermark, false)
            }
        };

        let events = feed.fetch_history_after(after).await?;
        let fetched = events.len();
        let watermark = self.ingest_batch(events).await;

        info!(after, fetched, watermark, rebuilt, "Caught up from replay feed");
        Ok(CatchUpReport {
            fetched,
            watermark,
            rebuilt,
        })
    }

    /// Start a background catch-up unless one is already running.
    ///
    /// A request made while one runs is not lost: the running task goes
    /// round again before it stops.
    pub fn schedule_catch_up(&self) {
        if self.inner.feed.is_none() {
            debug!(subscriber = %self.inner.name, "Gap detected but no replay feed configured");
            return;
        }
        self.inner.rerun.store(true, Ordering::SeqCst);
        if self.inner.catching_up.swap(true, Ordering::SeqCst) {
            debug!(subscriber = %self.inner.name, "Catch-up already running, queued another pass");
            return;
        }

        let this = self.clone();
        tokio::spawn(async move { this.catch_up_until_settled().await });
    }

    async fn catch_up_until_settled(&self) {
        loop {
            self.inner.rerun.store(false, Ordering::SeqCst);
            let progressed = match self.catch_up().await {
                Ok(report) => report.fetched > 0,
                Err(e) => {
                    error!(subscriber = %self.inner.name, error = %e, "Background catch-up failed");
                    false
                }
            };

            // Buffered events past what that read returned
            if progressed && self.pending_len().await > 0 {
                continue;
            }
            if self.inner.rerun.load(Ordering::SeqCst) {
                continue;
            }

            self.inner.catching_up.store(false, Ordering::SeqCst);
            // A request that slipped in between the check and the release
            if !self.inner.rerun.load(Ordering::SeqCst)
                || self.inner.catching_up.swap(true, Ordering::SeqCst)
            {
                break;
            }
        }
    }

    fn ingest_locked(&self, state: &mut State<P::View>, event: SequencedEvent) -> IngestOutcome {
        let sequence = event.sequence;

        if sequence <= state.watermark {
            debug!(subscriber = %self.inner.name, sequence, "Duplicate event ignored");
            return IngestOutcome::Duplicate;
        }

        if sequence == state.watermark + 1 {
            apply_logged(&self.inner.projector, &mut state.view, &event);
            state.watermark = sequence;

            while let Some(next) = state.pending.remove(&(state.watermark + 1)) {
                apply_logged(&self.inner.projector, &mut state.view, &next);
                state.watermark = next.sequence;
            }
            return IngestOutcome::Advanced {
                watermark: state.watermark,
            };
        }

        let missing_from = state.watermark + 1;
        if state.pending.len() >= self.inner.max_pending && !state.pending.contains_key(&sequence) {
            warn!(
                subscriber = %self.inner.name,
                sequence,
                watermark = state.watermark,
                max_pending = self.inner.max_pending,
                "Pending buffer full, clearing and relying on replay"
            );
            state.pending.clear();
            return IngestOutcome::Overflow { missing_from };
        }

        state.pending.insert(sequence, event);
        let missing_to = state
            .pending
            .keys()
            .next()
            .map(|first| first - 1)
            .unwrap_or(sequence - 1);

        debug!(
            subscriber = %self.inner.name,
            sequence,
            missing_from,
            missing_to,
            "Gap detected, event buffered"
        );
        IngestOutcome::Gap {
            missing_from,
            missing_to,
        }
    }
}

impl<P: Projector> EventHandler for ViewSubscriber<P> {
    fn handle(&self, event: Arc<SequencedEvent>) -> BoxFuture<'static, Result<()>> {
        let this = self.clone();
        Box::pin(async move {
            let event = Arc::try_unwrap(event).unwrap_or_else(|shared| (*shared).clone());
            this.receive(event).await;
            Ok(())
        })
    }
}

/// Builder for [`ViewSubscriber`].
pub struct ViewSubscriberBuilder<P: Projector> {
    name: String,
    projector: P,
    feed: Option<Arc<dyn ReplayFeed>>,
    max_pending: usize,
}

impl<P: Projector> ViewSubscriberBuilder<P> {
    /// Source for startup replay and gap recovery.
    pub fn replay_feed(mut self, feed: Arc<dyn ReplayFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Bound on events buffered behind a gap.
    pub fn max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn build(self) -> ViewSubscriber<P> {
        ViewSubscriber {
            inner: Arc::new(Inner {
                name: self.name,
                projector: self.projector,
                state: Mutex::new(State::empty()),
                feed: self.feed,
                max_pending: self.max_pending,
                catching_up: AtomicBool::new(false),
                rerun: AtomicBool::new(false),
            }),
        }
    }
}
