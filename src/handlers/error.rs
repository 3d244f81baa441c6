//! HTTP-facing error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use super::errmsg;
use crate::bus::BusError;

/// Errors returned by HTTP handlers.
///
/// The body is `{"error": <message>, "status": <code>}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{}", errmsg::APPEND_FAILED)]
    Append(#[source] BusError),

    #[error("{}", errmsg::HISTORY_UNAVAILABLE)]
    History(#[source] BusError),

    #[error("{}", errmsg::REPLAY_FAILED)]
    Replay(#[source] BusError),

    #[error("{}", errmsg::SUBMIT_FAILED)]
    Submit(#[source] BusError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Append(_) | Self::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Replay(_) | Self::Submit(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<BusError> for ApiError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Append(_) => Self::Append(err),
            BusError::Storage(_) => Self::History(err),
            other => Self::Replay(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            Self::Append(e) | Self::History(e) | Self::Replay(e) | Self::Submit(e) => {
                e.to_string()
            }
        };
        error!(status = status.as_u16(), error = %detail, "Request failed");

        let body = json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_append_maps_to_500() {
        let err: ApiError = BusError::Append(StorageError::Exhausted { capacity: 1 }).into();
        assert!(matches!(err, ApiError::Append(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), errmsg::APPEND_FAILED);
    }

    #[test]
    fn test_replay_maps_to_502() {
        let err: ApiError = BusError::Replay("relay down".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
