//! HTTP client for the relay.
//!
//! Producers use it to submit events; remote subscribers use it as their
//! replay feed (`GET /events[?after=n]`, `GET /events/last`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bus::{BusError, Result};
use crate::config::RelayConfig;
use crate::event::{Event, Sequence, SequencedEvent};
use crate::handlers::relay::LastSequence;
use crate::replay::ReplayFeed;

/// Relay answer to a successful submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: String,
    pub sequence: Sequence,
}

/// Client for a remote relay.
#[derive(Clone)]
pub struct RelayClient {
    base_url: String,
    client: Client,
}

impl RelayClient {
    /// Create a client for the relay described by `config`.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        if config.address.trim().is_empty() {
            return Err(BusError::Config("relay address is empty".to_string()));
        }
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            base_url: config.address.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL of the relay.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn events_url(&self) -> String {
        format!("{}/events", self.base_url)
    }

    /// Submit an event and return the assigned sequence.
    pub async fn submit(&self, event: &Event) -> Result<SubmitResponse> {
        let response = self
            .client
            .post(self.events_url())
            .json(event)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn fetch(&self, after: Option<Sequence>) -> Result<Vec<SequencedEvent>> {
        let mut request = self.client.get(self.events_url());
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }
        let response = Self::check(request.send().await?).await?;
        let events: Vec<SequencedEvent> = response.json().await?;
        debug!(relay = %self.base_url, ?after, count = events.len(), "Fetched history");
        Ok(events)
    }

    async fn head(&self) -> Result<Sequence> {
        let url = format!("{}/last", self.events_url());
        let response = Self::check(self.client.get(url).send().await?).await?;
        let last: LastSequence = response.json().await?;
        Ok(last.sequence)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BusError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}

#[async_trait]
impl ReplayFeed for RelayClient {
    async fn fetch_history(&self) -> Result<Vec<SequencedEvent>> {
        self.fetch(None).await
    }

    async fn fetch_history_after(&self, after: Sequence) -> Result<Vec<SequencedEvent>> {
        self.fetch(Some(after)).await
    }

    async fn last_sequence(&self) -> Result<Sequence> {
        self.head().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let client = RelayClient::new(&RelayConfig {
            address: "http://event-bus-srv:4005/".to_string(),
            ..RelayConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://event-bus-srv:4005");
        assert_eq!(client.events_url(), "http://event-bus-srv:4005/events");
    }

    #[test]
    fn test_empty_address_rejected() {
        let result = RelayClient::new(&RelayConfig {
            address: " ".to_string(),
            ..RelayConfig::default()
        });
        assert!(matches!(result, Err(BusError::Config(_))));
    }

    #[test]
    fn test_submit_response_shape() {
        let response: SubmitResponse =
            serde_json::from_str(r#"{"status":"OK","sequence":12}"#).unwrap();
        assert_eq!(response.status, "OK");
        assert_eq!(response.sequence, 12);
    }
}
