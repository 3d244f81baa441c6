//! Producing services for the reference thread vocabulary.
//!
//! A producer turns a user action into an event and submits it; a reactor
//! is a subscriber that submits a follow-up event when it sees a trigger.
//! Both only talk to an [`EventSink`], so the same code runs in-process
//! against a [`Broadcaster`] or remotely through a [`RelayClient`].
//!
//! - [`ThreadProducer`]: `create_parent` emits `ParentCreated`,
//!   `create_child` emits `ChildCreated` with status `pending`
//! - [`ModerationReactor`]: answers every `ChildModerated` with a
//!   `ChildUpdated` carrying the verdict

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::bus::{Broadcaster, EventHandler, Result};
use crate::client::RelayClient;
use crate::event::{Event, Sequence, SequencedEvent};
use crate::projectors::{ChildPayload, ParentCreated, ThreadEvent};


/// Status of a child that has not been moderated yet.
pub const PENDING: &str = "pending";

/// Where producers and reactors send events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Submit an event and return its sequence.
    async fn publish(&self, event: Event) -> Result<Sequence>;
}

#[async_trait]
impl EventSink for Broadcaster {
    async fn publish(&self, event: Event) -> Result<Sequence> {
        Ok(self.submit(event).await?.sequence)
    }
}

#[async_trait]
impl EventSink for RelayClient {
    async fn publish(&self, event: Event) -> Result<Sequence> {
        Ok(self.submit(&event).await?.sequence)
    }
}

/// Short random id for new parents and children.
fn new_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Creates parents and children.
#[derive(Clone)]
pub struct ThreadProducer {
    sink: Arc<dyn EventSink>,
}

impl ThreadProducer {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Emit `ParentCreated` for a new parent.
    #[instrument(skip(self))]
    pub async fn create_parent(&self, title: &str) -> Result<(Sequence, ParentCreated)> {
        let parent = ParentCreated {
            id: new_id(),
            title: title.to_string(),
        };
        let event = ThreadEvent::ParentCreated(parent.clone()).to_event()?;
        let sequence = self.sink.publish(event).await?;
        info!(parent_id = %parent.id, sequence, "Parent created");
        Ok((sequence, parent))
    }

    /// Emit `ChildCreated` for a new, unmoderated child of `parent_id`.
    ///
    /// The parent is not checked; subscribers decide what to do with
    /// children of parents they have not seen.
    #[instrument(skip(self, content))]
    pub async fn create_child(
        &self,
        parent_id: &str,
        content: &str,
    ) -> Result<(Sequence, ChildPayload)> {
        let child = ChildPayload {
            id: new_id(),
            parent_id: parent_id.to_string(),
            content: content.to_string(),
            status: PENDING.to_string(),
        };
        let event = ThreadEvent::ChildCreated(child.clone()).to_event()?;
        let sequence = self.sink.publish(event).await?;
        info!(child_id = %child.id, parent_id, sequence, "Child created");
        Ok((sequence, child))
    }
}

/// Turns moderation verdicts into child updates.
#[derive(Clone)]
pub struct ModerationReactor {
    sink: Arc<dyn EventSink>,
}

impl ModerationReactor {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// React to one delivered event.
    ///
    /// Returns the sequence of the follow-up event, if one was emitted.
    /// Unrelated and malformed events produce nothing.
    pub async fn react(&self, event: &SequencedEvent) -> Result<Option<Sequence>> {
        let verdict = match ThreadEvent::decode(event) {
            Ok(Some(ThreadEvent::ChildModerated(child))) => child,
            Ok(_) => return Ok(None),
            Err(e) => {
                debug!(sequence = event.sequence, error = %e, "Ignoring undecodable event");
                return Ok(None);
            }
        };

        let update = ThreadEvent::ChildUpdated(verdict);
        let sequence = self.sink.publish(update.to_event()?).await?;
        info!(
            trigger = event.sequence,
            sequence,
            "Moderation verdict applied"
        );
        Ok(Some(sequence))
    }
}

impl EventHandler for ModerationReactor {
    fn handle(&self, event: Arc<SequencedEvent>) -> BoxFuture<'static, Result<()>> {
        let reactor = self.clone();
        Box::pin(async move { reactor.react(&event).await.map(|_| ()) })
    }
}
