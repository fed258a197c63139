//! HTTP publisher for the external event platform.
//!
//! Publishes with `POST {base_url}/event/{tenant}/{data_core}/{flow}/{event_type}`,
//! the JSON payload as body and the API key as bearer token. Any 2xx is an
//! acknowledgment; the platform event id is taken from the response body when
//! it reports one.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use todoflow_events::{EventPublisher, PublishAck, PublishError};

#[derive(Clone)]
pub struct HttpPublisherConfig {
    pub base_url: String,
    pub tenant: String,
    pub data_core: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl core::fmt::Debug for HttpPublisherConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpPublisherConfig")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("data_core", &self.data_core)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestResponse {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    event_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
    config: HttpPublisherConfig,
}

impl HttpPublisher {
    pub fn new(config: HttpPublisherConfig) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, flow: &str, event_type: &str) -> String {
        format!(
            "{}/event/{}/{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.tenant,
            self.config.data_core,
            flow,
            event_type
        )
    }
}

#[async_trait]
impl EventPublisher for HttpPublisher {
    #[instrument(skip(self, payload), err)]
    async fn publish(
        &self,
        flow: &str,
        event_type: &str,
        payload: JsonValue,
    ) -> Result<PublishAck, PublishError> {
        let resp = self
            .client
            .post(self.endpoint(flow, event_type))
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PublishError::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    PublishError::Unavailable(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Rejected(format!("{}: {}", status.as_u16(), body)));
        }

        // The body is informational; an unparsable one still counts as accepted.
        let body: IngestResponse = resp.json().await.unwrap_or_default();
        let event_id = body.event_id.or_else(|| body.event_ids.into_iter().next());
        debug!(status = status.as_u16(), event_id = event_id.as_deref().unwrap_or(""), "platform accepted event");

        Ok(PublishAck::new(event_id))
    }
}
