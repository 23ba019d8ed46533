use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use api_client::EventsGateway;
use async_trait::async_trait;
use common_errors::{ApiError, ApiResult};
use events_models::{Event, EventDraft, SelectableImage};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn not_found() -> ApiError {
    ApiError::request(
        404,
        Some(serde_json::json!({ "message": "Event not found" })),
    )
}

/// In-memory [`EventsGateway`] for tests that do not need the wire.
/// Supports one-shot failure injection, artificial latency and
/// per-operation call counting.
#[derive(Default)]
pub struct ScriptedGateway {
    events: Mutex<Vec<Event>>,
    images: Mutex<Vec<SelectableImage>>,
    fail_next: Mutex<Option<ApiError>>,
    latency: Mutex<Option<Duration>>,
    list_events_calls: AtomicUsize,
    fetch_event_calls: AtomicUsize,
    fetch_images_calls: AtomicUsize,
    create_event_calls: AtomicUsize,
    update_event_calls: AtomicUsize,
    delete_event_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events: Mutex::new(events),
            images: Mutex::new(crate::sample_images()),
            ..Self::default()
        }
    }

    /// The next operation fails with `err` instead of running.
    pub fn fail_next(&self, err: ApiError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn list_events_calls(&self) -> usize {
        self.list_events_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_event_calls(&self) -> usize {
        self.fetch_event_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_images_calls(&self) -> usize {
        self.fetch_images_calls.load(Ordering::SeqCst)
    }

    pub fn create_event_calls(&self) -> usize {
        self.create_event_calls.load(Ordering::SeqCst)
    }

    pub fn update_event_calls(&self) -> usize {
        self.update_event_calls.load(Ordering::SeqCst)
    }

    pub fn delete_event_calls(&self) -> usize {
        self.delete_event_calls.load(Ordering::SeqCst)
    }

    async fn begin(
        &self, counter: &AtomicUsize, token: Option<&CancellationToken>,
    ) -> ApiResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            match token {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            return Err(ApiError::Cancelled);
                        }
                        _ = tokio::time::sleep(latency) => {}
                    }
                }
                None => tokio::time::sleep(latency).await,
            }
        }
        if let Some(token) = token {
            if token.is_cancelled() {
                return Err(ApiError::Cancelled);
            }
        }
        if let Some(err) = self.fail_next.lock().unwrap().take() {
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl EventsGateway for ScriptedGateway {
    async fn list_events(
        &self, search: Option<&str>, max: Option<u32>,
        token: CancellationToken,
    ) -> ApiResult<Vec<Event>> {
        self.begin(&self.list_events_calls, Some(&token)).await?;
        let mut events = self.events.lock().unwrap().clone();
        if let Some(term) = search {
            let term = term.to_lowercase();
            events.retain(|event| {
                event.title.to_lowercase().contains(&term)
                    || event.description.to_lowercase().contains(&term)
                    || event.location.to_lowercase().contains(&term)
            });
        }
        if let Some(max) = max {
            events.truncate(max as usize);
        }
        Ok(events)
    }

    async fn fetch_event(
        &self, event_id: &str, token: CancellationToken,
    ) -> ApiResult<Event> {
        self.begin(&self.fetch_event_calls, Some(&token)).await?;
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|event| event.id == event_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn fetch_images(
        &self, token: CancellationToken,
    ) -> ApiResult<Vec<SelectableImage>> {
        self.begin(&self.fetch_images_calls, Some(&token)).await?;
        Ok(self.images.lock().unwrap().clone())
    }

    async fn create_event(&self, draft: &EventDraft) -> ApiResult<Event> {
        self.begin(&self.create_event_calls, None).await?;
        let event = draft.clone().into_event(Uuid::new_v4().to_string());
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn update_event(
        &self, event_id: &str, event: &EventDraft,
    ) -> ApiResult<()> {
        self.begin(&self.update_event_calls, None).await?;
        let mut events = self.events.lock().unwrap();
        match events.iter_mut().find(|stored| stored.id == event_id) {
            Some(stored) => {
                *stored = event.clone().into_event(event_id);
                Ok(())
            }
            None => Err(not_found()),
        }
    }

    async fn delete_event(&self, event_id: &str) -> ApiResult<()> {
        self.begin(&self.delete_event_calls, None).await?;
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|event| event.id != event_id);
        if events.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}
