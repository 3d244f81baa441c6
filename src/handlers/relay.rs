//! Relay HTTP API.
//!
//! - `POST /events`: submit `{type, data}`, answers `{status: "OK", sequence, deliveries}`
//! - `GET /events[?after=n]`: full history (or the suffix after `n`)
//! - `GET /events/last`: `{sequence}` of the newest event, 0 when empty
//! - `GET /health`: liveness

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{with_layers, ApiError};
use crate::bus::{Broadcaster, DeliveryRecord};
use crate::event::{Event, Sequence, SequencedEvent};
use crate::replay::{ReplayFeed, StoreReplayFeed};

/// Shared state for relay handlers.
#[derive(Clone)]
pub struct RelayState {
    broadcaster: Arc<Broadcaster>,
    feed: StoreReplayFeed,
}

/// Body of a successful submit.
#[derive(Debug, Serialize)]
pub struct SubmitAck {
    pub status: &'static str,
    pub sequence: Sequence,
    pub deliveries: Vec<DeliveryRecord>,
}

/// Body of `GET /events/last`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LastSequence {
    pub sequence: Sequence,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub after: Option<Sequence>,
}

/// Build the relay router (separated from `serve` for testing).
pub fn router(broadcaster: Arc<Broadcaster>) -> Router {
    let state = RelayState {
        feed: broadcaster.replay_feed(),
        broadcaster,
    };

    with_layers(
        Router::new()
            .route("/events", get(history).post(submit))
            .route("/events/last", get(last_sequence))
            .route("/health", get(health))
            .with_state(state),
    )
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn submit(
    State(state): State<RelayState>,
    Json(event): Json<Event>,
) -> Result<Json<SubmitAck>, ApiError> {
    let receipt = state.broadcaster.submit(event).await?;
    Ok(Json(SubmitAck {
        status: "OK",
        sequence: receipt.sequence,
        deliveries: receipt.deliveries,
    }))
}

async fn history(
    State(state): State<RelayState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SequencedEvent>>, ApiError> {
    let events = match query.after {
        Some(after) => state.feed.fetch_history_after(after).await,
        None => state.feed.fetch_history().await,
    }
    .map_err(ApiError::History)?;
    Ok(Json(events))
}

async fn last_sequence(State(state): State<RelayState>) -> Result<Json<LastSequence>, ApiError> {
    let sequence = state
        .feed
        .last_sequence()
        .await
        .map_err(ApiError::History)?;
    Ok(Json(LastSequence { sequence }))
}
