//! View projection.
//!
//! A [`Projector`] folds sequenced events into a subscriber-owned view. The
//! fold is total: a bad or out-of-place event is logged and skipped, it never
//! aborts the fold.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::{Sequence, SequencedEvent};

mod thread;

pub use thread::{
    ChildPayload, ChildRecord, ParentCreated, ParentRecord, ThreadEvent, ThreadProjector,
    ThreadView,
};

/// What applying one event did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The view changed.
    Applied,
    /// Already folded; the view is unchanged.
    Duplicate,
    /// Held until the entity it refers to exists.
    Parked,
    /// Event type outside this projector's vocabulary.
    Ignored,
}

/// Per-event projection failures. None of these abort a fold.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Event {sequence} refers to unknown parent '{parent_id}'")]
    UnknownParent { parent_id: String, sequence: Sequence },

    #[error("Event {sequence} updates unknown child '{child_id}' of '{parent_id}'")]
    UnknownChild {
        child_id: String,
        parent_id: String,
        sequence: Sequence,
    },

    #[error("Event {sequence} ({event_type}) has a malformed payload: {source}")]
    Malformed {
        event_type: String,
        sequence: Sequence,
        #[source]
        source: serde_json::Error,
    },

    #[error("Event {sequence} conflicts with existing entity '{id}'")]
    Conflict { id: String, sequence: Sequence },
}

/// What to do with events that refer to an entity not yet in the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Park them and apply them once the entity is created.
    #[default]
    Hold,
    /// Log and drop them permanently.
    Skip,
}

/// Projection configuration for subscriber services.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Handling of events for unknown entities.
    pub gap_policy: GapPolicy,
    /// Out-of-order events buffered while waiting for a missing sequence.
    pub max_pending: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            gap_policy: GapPolicy::Hold,
            max_pending: 1024,
        }
    }
}

/// Folds events into a view.
///
/// `apply` must depend only on the view and the event, and must treat an
/// event it has already folded as a no-op.
pub trait Projector: Send + Sync + 'static {
    /// The projected aggregate.
    type View: Default + Clone + Serialize + Send + Sync + 'static;

    /// Projector name for logging.
    fn name(&self) -> &str;

    /// Apply one event to the view.
    fn apply(
        &self,
        view: &mut Self::View,
        event: &SequencedEvent,
    ) -> Result<Applied, ProjectionError>;
}

/// Tally of a fold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldReport {
    pub applied: usize,
    pub duplicates: usize,
    pub parked: usize,
    pub ignored: usize,
    pub skipped: usize,
}

impl FoldReport {
    fn record(&mut self, outcome: Option<Applied>) {
        match outcome {
            Some(Applied::Applied) => self.applied += 1,
            Some(Applied::Duplicate) => self.duplicates += 1,
            Some(Applied::Parked) => self.parked += 1,
            Some(Applied::Ignored) => self.ignored += 1,
            None => self.skipped += 1,
        }
    }
}

/// Apply one event, logging and swallowing projection errors.
///
/// Returns `None` if the event was skipped because of an error.
pub fn apply_logged<P: Projector>(
    projector: &P,
    view: &mut P::View,
    event: &SequencedEvent,
) -> Option<Applied> {
    match projector.apply(view, event) {
        Ok(applied) => {
            debug!(
                projector = projector.name(),
                sequence = event.sequence,
                event_type = %event.event_type(),
                ?applied,
                "Event folded"
            );
            Some(applied)
        }
        Err(e) => {
            warn!(
                projector = projector.name(),
                sequence = event.sequence,
                event_type = %event.event_type(),
                error = %e,
                "Event skipped"
            );
            None
        }
    }
}

/// Fold a batch of events in the given order.
pub fn fold<'a, P: Projector>(
    projector: &P,
    view: &mut P::View,
    events: impl IntoIterator<Item = &'a SequencedEvent>,
) -> FoldReport {
    let mut report = FoldReport::default();
    for event in events {
        report.record(apply_logged(projector, view, event));
    }
    report
}
