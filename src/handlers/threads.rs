//! Thread service HTTP API: a producer and reactor over one relay.
//!
//! - `POST /parents`: `{title}`, emits `ParentCreated`, answers 201 with the parent
//! - `POST /parents/{id}/children`: `{content}`, emits `ChildCreated`, answers 201
//! - `POST /events`: relay delivery, answers `{}` at once; a `ChildModerated`
//!   is answered with a `ChildUpdated` from a background task
//! - `GET /health`: liveness
//!
//! The reaction runs after the answer because the relay may be waiting on
//! this delivery before it accepts the follow-up submit.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, Instrument};

use super::{with_layers, ApiError};
use crate::event::SequencedEvent;
use crate::producer::{ModerationReactor, ThreadProducer};

#[derive(Clone)]
struct ThreadState {
    producer: ThreadProducer,
    reactor: ModerationReactor,
}

#[derive(Debug, Deserialize)]
pub struct NewParent {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct NewChild {
    #[serde(default)]
    pub content: String,
}

/// Build the thread service router.
pub fn router(producer: ThreadProducer, reactor: ModerationReactor) -> Router {
    with_layers(
        Router::new()
            .route("/parents", post(create_parent))
            .route("/parents/{id}/children", post(create_child))
            .route("/events", post(receive))
            .route("/health", get(health))
            .with_state(ThreadState { producer, reactor }),
    )
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn create_parent(
    State(state): State<ThreadState>,
    Json(body): Json<NewParent>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (sequence, parent) = state
        .producer
        .create_parent(&body.title)
        .await
        .map_err(ApiError::Submit)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"id": parent.id, "title": parent.title, "sequence": sequence})),
    ))
}

async fn create_child(
    State(state): State<ThreadState>,
    Path(parent_id): Path<String>,
    Json(body): Json<NewChild>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (sequence, child) = state
        .producer
        .create_child(&parent_id, &body.content)
        .await
        .map_err(ApiError::Submit)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": child.id,
            "parentId": child.parent_id,
            "content": child.content,
            "status": child.status,
            "sequence": sequence,
        })),
    ))
}

async fn receive(
    State(state): State<ThreadState>,
    Json(event): Json<SequencedEvent>,
) -> Json<Value> {
    let span = tracing::info_span!("react", sequence = event.sequence);
    tokio::spawn(
        async move {
            if let Err(e) = state.reactor.react(&event).await {
                error!(error = %e, "Follow-up event not submitted");
            }
        }
        .instrument(span),
    );
    Json(json!({}))
}
