//! View subscriber HTTP API.
//!
//! - `POST /events`: live delivery of `{type, data, sequence}`, answers `{}`
//! - `GET /view`: the current projected view
//! - `POST /replay`: catch up from the relay now
//! - `GET /health`: liveness plus the current watermark

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::{with_layers, ApiError};
use crate::event::SequencedEvent;
use crate::projectors::Projector;
use crate::subscriber::{CatchUpReport, ViewSubscriber};

/// Build the view router for `subscriber`.
pub fn router<P: Projector>(subscriber: ViewSubscriber<P>) -> Router {
    with_layers(
        Router::new()
            .route("/events", post(receive::<P>))
            .route("/view", get(view::<P>))
            .route("/replay", post(replay::<P>))
            .route("/health", get(health::<P>))
            .with_state(subscriber),
    )
}

async fn receive<P: Projector>(
    State(subscriber): State<ViewSubscriber<P>>,
    Json(event): Json<SequencedEvent>,
) -> Json<Value> {
    subscriber.receive(event).await;
    Json(json!({}))
}

async fn view<P: Projector>(State(subscriber): State<ViewSubscriber<P>>) -> Json<P::View> {
    Json(subscriber.snapshot().await)
}

async fn replay<P: Projector>(
    State(subscriber): State<ViewSubscriber<P>>,
) -> Result<Json<Value>, ApiError> {
    let CatchUpReport {
        fetched,
        watermark,
        rebuilt,
    } = subscriber.catch_up().await?;
    Ok(Json(json!({"fetched": fetched, "watermark": watermark, "rebuilt": rebuilt})))
}

async fn health<P: Projector>(State(subscriber): State<ViewSubscriber<P>>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "subscriber": subscriber.name(),
        "watermark": subscriber.watermark().await,
    }))
}
