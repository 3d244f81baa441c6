//! Reference projection: parents with ordered, moderated children.
//!
//! Vocabulary:
//! - `ParentCreated{id, title}` creates a parent with no children
//! - `ChildCreated{id, parentId, content, status}` appends a child
//! - `ChildUpdated{id, parentId, content, status}` overwrites a child
//! - `ChildModerated{id, parentId, content, status}` is a moderation verdict;
//!   the view waits for the `ChildUpdated` a reactor emits in response
//!
//! Every other tag is ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Applied, GapPolicy, ProjectionError, Projector};
use crate::event::{Event, Sequence, SequencedEvent};

/// Payload of `ParentCreated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentCreated {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Payload of `ChildCreated` and `ChildUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildPayload {
    pub id: String,
    pub parent_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "pending".to_string()
}

/// Decoded reference event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadEvent {
    ParentCreated(ParentCreated),
    ChildCreated(ChildPayload),
    ChildUpdated(ChildPayload),
    ChildModerated(ChildPayload),
}

impl ThreadEvent {
    /// Decode by tag. Unknown tags decode to `None`.
    pub fn decode(event: &SequencedEvent) -> Result<Option<Self>, ProjectionError> {
        let malformed = |source| ProjectionError::Malformed {
            event_type: event.event_type().to_string(),
            sequence: event.sequence,
            source,
        };

        let decoded = match event.event_type() {
            "ParentCreated" => Self::ParentCreated(event.event.payload().map_err(malformed)?),
            "ChildCreated" => Self::ChildCreated(event.event.payload().map_err(malformed)?),
            "ChildUpdated" => Self::ChildUpdated(event.event.payload().map_err(malformed)?),
            "ChildModerated" => Self::ChildModerated(event.event.payload().map_err(malformed)?),
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }

    /// Type tag on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ParentCreated(_) => "ParentCreated",
            Self::ChildCreated(_) => "ChildCreated",
            Self::ChildUpdated(_) => "ChildUpdated",
            Self::ChildModerated(_) => "ChildModerated",
        }
    }

    /// Encode as a submittable event.
    pub fn to_event(&self) -> Result<Event, serde_json::Error> {
        match self {
            Self::ParentCreated(payload) => Event::from_payload(self.event_type(), payload),
            Self::ChildCreated(child) | Self::ChildUpdated(child) | Self::ChildModerated(child) => {
                Event::from_payload(self.event_type(), child)
            }
        }
    }
}

/// A child as shown in the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildRecord {
    pub id: String,
    pub content: String,
    pub status: String,
}

/// A parent and its children, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRecord {
    pub id: String,
    pub title: String,
    pub children: Vec<ChildRecord>,
    /// Sequence of the `ParentCreated` that created this parent.
    #[serde(skip)]
    pub created_sequence: Sequence,
    /// Highest sequence folded into this parent.
    pub last_sequence: Sequence,
}

impl ParentRecord {
    fn child_mut(&mut self, id: &str) -> Option<&mut ChildRecord> {
        self.children.iter_mut().find(|c| c.id == id)
    }
}

/// Parents keyed by id, plus child events held for parents not yet seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreadView {
    pub parents: BTreeMap<String, ParentRecord>,
    #[serde(skip)]
    pub parked: BTreeMap<String, Vec<SequencedEvent>>,
}

impl ThreadView {
    pub fn parent(&self, id: &str) -> Option<&ParentRecord> {
        self.parents.get(id)
    }

    /// Number of child events waiting for their parent.
    pub fn parked_count(&self) -> usize {
        self.parked.values().map(Vec::len).sum()
    }
}

/// Folds the reference vocabulary into a [`ThreadView`].
#[derive(Debug, Clone, Default)]
pub struct ThreadProjector {
    gap_policy: GapPolicy,
}

impl ThreadProjector {
    pub fn new(gap_policy: GapPolicy) -> Self {
        Self { gap_policy }
    }

    pub fn gap_policy(&self) -> GapPolicy {
        self.gap_policy
    }

    fn create_parent(
        &self,
        view: &mut ThreadView,
        payload: ParentCreated,
        sequence: Sequence,
    ) -> Result<Applied, ProjectionError> {
        if let Some(existing) = view.parents.get(&payload.id) {
            if sequence == existing.created_sequence || sequence <= existing.last_sequence {
                return Ok(Applied::Duplicate);
            }
            return Err(ProjectionError::Conflict {
                id: payload.id,
                sequence,
            });
        }

        let id = payload.id;
        let mut record = ParentRecord {
            id: id.clone(),
            title: payload.title,
            children: Vec::new(),
            created_sequence: sequence,
            last_sequence: sequence,
        };

        if let Some(mut held) = view.parked.remove(&id) {
            held.sort_by_key(|e| e.sequence);
            debug!(parent = %id, count = held.len(), "Draining parked child events");
            for event in &held {
                let outcome = ThreadEvent::decode(event)
                    .and_then(|decoded| match decoded {
                        Some(ThreadEvent::ChildCreated(child)) => {
                            Self::add_child(&mut record, child, event.sequence)
                        }
                        Some(ThreadEvent::ChildUpdated(child)) => {
                            Self::update_child(&mut record, child, event.sequence)
                        }
                        _ => Ok(Applied::Ignored),
                    });
                match outcome {
                    Ok(_) => record.last_sequence = record.last_sequence.max(event.sequence),
                    Err(e) => warn!(
                        parent = %id,
                        sequence = event.sequence,
                        error = %e,
                        "Parked event skipped"
                    ),
                }
            }
        }

        view.parents.insert(id, record);
        Ok(Applied::Applied)
    }

    fn add_child(
        record: &mut ParentRecord,
        child: ChildPayload,
        sequence: Sequence,
    ) -> Result<Applied, ProjectionError> {
        if record.child_mut(&child.id).is_some() {
            return Err(ProjectionError::Conflict {
                id: child.id,
                sequence,
            });
        }
        record.children.push(ChildRecord {
            id: child.id,
            content: child.content,
            status: child.status,
        });
        Ok(Applied::Applied)
    }

    fn update_child(
        record: &mut ParentRecord,
        child: ChildPayload,
        sequence: Sequence,
    ) -> Result<Applied, ProjectionError> {
        let Some(existing) = record.child_mut(&child.id) else {
            return Err(ProjectionError::UnknownChild {
                child_id: child.id,
                parent_id: child.parent_id,
                sequence,
            });
        };
        existing.content = child.content;
        existing.status = child.status;
        Ok(Applied::Applied)
    }

    fn apply_child(
        &self,
        view: &mut ThreadView,
        event: &SequencedEvent,
        child: ChildPayload,
        created: bool,
    ) -> Result<Applied, ProjectionError> {
        let sequence = event.sequence;

        let Some(record) = view.parents.get_mut(&child.parent_id) else {
            return match self.gap_policy {
                GapPolicy::Hold => {
                    let held = view.parked.entry(child.parent_id).or_default();
                    if held.iter().any(|e| e.sequence == sequence) {
                        return Ok(Applied::Duplicate);
                    }
                    held.push(event.clone());
                    Ok(Applied::Parked)
                }
                GapPolicy::Skip => Err(ProjectionError::UnknownParent {
                    parent_id: child.parent_id,
                    sequence,
                }),
            };
        };

        if sequence <= record.last_sequence {
            return Ok(Applied::Duplicate);
        }

        let applied = if created {
            Self::add_child(record, child, sequence)?
        } else {
            Self::update_child(record, child, sequence)?
        };
        record.last_sequence = sequence;
        Ok(applied)
    }
}

impl Projector for ThreadProjector {
    type View = ThreadView;

    fn name(&self) -> &str {
        "thread"
    }

    fn apply(
        &self,
        view: &mut ThreadView,
        event: &SequencedEvent,
    ) -> Result<Applied, ProjectionError> {
        match ThreadEvent::decode(event)? {
            Some(ThreadEvent::ParentCreated(payload)) => {
                self.create_parent(view, payload, event.sequence)
            }
            Some(ThreadEvent::ChildCreated(child)) => self.apply_child(view, event, child, true),
            Some(ThreadEvent::ChildUpdated(child)) => self.apply_child(view, event, child, false),
            Some(ThreadEvent::ChildModerated(_)) | None => Ok(Applied::Ignored),
        }
    }
}
