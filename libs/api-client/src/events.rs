use async_trait::async_trait;
use common_errors::{ApiError, ApiResult};
use events_models::{Event, EventDraft, SelectableImage};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{config::ApiConfig, gateway::EventsGateway};

// Response envelopes as the backend shapes them. Callers always get
// the designated field, never the envelope itself.

#[derive(Deserialize)]
struct EventsEnvelope {
    events: Vec<Event>,
}

#[derive(Deserialize)]
struct EventEnvelope {
    event: Event,
}

#[derive(Deserialize)]
struct ImagesEnvelope {
    images: Vec<SelectableImage>,
}

#[derive(Serialize)]
struct UpdateEventBody<'a> {
    event: &'a EventDraft,
}

/// HTTP client for the events backend. Pure I/O: no caching here.
#[derive(Clone)]
pub struct EventsClient {
    http: reqwest::Client,
    base_url: Url,
}

impl EventsClient {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ApiError::network)?;
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            ApiError::network(format!(
                "invalid base URL {}: {err}",
                config.base_url
            ))
        })?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::network(format!(
                    "base URL {} cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn success(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let info = response.json::<serde_json::Value>().await.ok();
        Err(ApiError::request(status.as_u16(), info))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ApiResult<T> {
        response.json::<T>().await.map_err(ApiError::decode)
    }
}

/// Races `operation` against the token. The token winning fails the
/// call with `Cancelled`; the half-finished request is dropped.
async fn with_cancellation<T>(
    token: &CancellationToken,
    operation: impl Future<Output = ApiResult<T>>,
) -> ApiResult<T> {
    tokio::select! {
        _ = token.cancelled() => Err(ApiError::Cancelled),
        result = operation => result,
    }
}

#[async_trait]
impl EventsGateway for EventsClient {
    /// GET /events[?search=..][&max=..]
    async fn list_events(
        &self, search: Option<&str>, max: Option<u32>,
        token: CancellationToken,
    ) -> ApiResult<Vec<Event>> {
        let mut url = self.endpoint(&["events"])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(term) = search {
                pairs.append_pair("search", term);
            }
            if let Some(max) = max {
                pairs.append_pair("max", &max.to_string());
            }
        }
        // An untouched query string must stay absent, not empty.
        if url.query() == Some("") {
            url.set_query(None);
        }
        with_cancellation(&token, async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(ApiError::network)?;
            let response = Self::success(response).await?;
            let envelope: EventsEnvelope = Self::read_json(response).await?;
            Ok(envelope.events)
        })
        .await
    }

    /// GET /events/{id}
    async fn fetch_event(
        &self, event_id: &str, token: CancellationToken,
    ) -> ApiResult<Event> {
        let url = self.endpoint(&["events", event_id])?;
        with_cancellation(&token, async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(ApiError::network)?;
            let response = Self::success(response).await?;
            let envelope: EventEnvelope = Self::read_json(response).await?;
            Ok(envelope.event)
        })
        .await
    }

    /// GET /events/images
    async fn fetch_images(
        &self, token: CancellationToken,
    ) -> ApiResult<Vec<SelectableImage>> {
        let url = self.endpoint(&["events", "images"])?;
        with_cancellation(&token, async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(ApiError::network)?;
            let response = Self::success(response).await?;
            let envelope: ImagesEnvelope = Self::read_json(response).await?;
            Ok(envelope.images)
        })
        .await
    }

    /// POST /events
    async fn create_event(&self, draft: &EventDraft) -> ApiResult<Event> {
        let url = self.endpoint(&["events"])?;
        let response = self
            .http
            .post(url)
            .json(draft)
            .send()
            .await
            .map_err(ApiError::network)?;
        let response = Self::success(response).await?;
        let envelope: EventEnvelope = Self::read_json(response).await?;
        Ok(envelope.event)
    }

    /// PUT /events/{id}. The success body is backend-defined and
    /// discarded; callers re-synchronize through invalidation.
    async fn update_event(
        &self, event_id: &str, event: &EventDraft,
    ) -> ApiResult<()> {
        let url = self.endpoint(&["events", event_id])?;
        let response = self
            .http
            .put(url)
            .json(&UpdateEventBody { event })
            .send()
            .await
            .map_err(ApiError::network)?;
        Self::success(response).await?;
        Ok(())
    }

    /// DELETE /events/{id}. Success body discarded, as for update.
    async fn delete_event(&self, event_id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["events", event_id])?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(ApiError::network)?;
        Self::success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> EventsClient {
        EventsClient::new(&ApiConfig::with_base_url(base)).unwrap()
    }

    #[test]
    fn endpoint_joins_segments() {
        let client = client("http://localhost:3000");
        let url = client.endpoint(&["events", "42"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/events/42");
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client = client("http://localhost:3000/api/");
        let url = client.endpoint(&["events"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/events");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(
            EventsClient::new(&ApiConfig::with_base_url("not a url"))
                .is_err()
        );
    }
}
