use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use events_models::{Event, EventDraft, SelectableImage};
use serde::Deserialize;
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Default)]
struct StubState {
    events: Mutex<Vec<Event>>,
    images: Vec<SelectableImage>,
    fail_next: Mutex<Option<(u16, serde_json::Value)>>,
    latency: Mutex<Option<Duration>>,
    list_hits: AtomicUsize,
    detail_hits: AtomicUsize,
}

/// In-process backend speaking the exact REST surface the client
/// expects, bound to an ephemeral port. One-shot failure injection and
/// request counters make request-level assertions possible.
pub struct StubBackend {
    base_url: String,
    state: Arc<StubState>,
    handle: tokio::task::JoinHandle<()>,
}

impl StubBackend {
    pub async fn spawn() -> Self {
        Self::spawn_with(Vec::new()).await
    }

    pub async fn spawn_with(events: Vec<Event>) -> Self {
        let state = Arc::new(StubState {
            events: Mutex::new(events),
            images: crate::sample_images(),
            ..StubState::default()
        });

        let app = Router::new()
            .route("/events", get(list_events).post(create_event))
            .route("/events/images", get(list_images))
            .route(
                "/events/{id}",
                get(get_event).put(update_event).delete(delete_event),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub backend");
        let addr = listener.local_addr().expect("stub backend address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve stub backend");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The next request answers with `code` and `body` instead.
    pub fn fail_next(&self, code: u16, body: serde_json::Value) {
        *self.state.fail_next.lock().unwrap() = Some((code, body));
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock().unwrap() = Some(latency);
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn list_hits(&self) -> usize {
        self.state.list_hits.load(Ordering::SeqCst)
    }

    pub fn detail_hits(&self) -> usize {
        self.state.detail_hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn pause(state: &StubState) {
    let latency = *state.latency.lock().unwrap();
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

fn injected_failure(state: &StubState) -> Option<Response> {
    let (code, body) = state.fail_next.lock().unwrap().take()?;
    let status = StatusCode::from_u16(code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Some((status, Json(body)).into_response())
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "message": "Event not found" })),
    )
        .into_response()
}

#[derive(Deserialize)]
struct ListParams {
    search: Option<String>,
    max: Option<u32>,
}

#[derive(Deserialize)]
struct UpdateBody {
    event: EventDraft,
}

async fn list_events(
    State(state): State<Arc<StubState>>, Query(params): Query<ListParams>,
) -> Response {
    state.list_hits.fetch_add(1, Ordering::SeqCst);
    pause(&state).await;
    if let Some(response) = injected_failure(&state) {
        return response;
    }
    let mut events = state.events.lock().unwrap().clone();
    if let Some(term) = params.search.filter(|term| !term.is_empty()) {
        let term = term.to_lowercase();
        events.retain(|event| {
            event.title.to_lowercase().contains(&term)
                || event.description.to_lowercase().contains(&term)
                || event.location.to_lowercase().contains(&term)
        });
    }
    if let Some(max) = params.max {
        events.truncate(max as usize);
    }
    Json(serde_json::json!({ "events": events })).into_response()
}

async fn get_event(
    State(state): State<Arc<StubState>>, Path(id): Path<String>,
) -> Response {
    state.detail_hits.fetch_add(1, Ordering::SeqCst);
    pause(&state).await;
    if let Some(response) = injected_failure(&state) {
        return response;
    }
    let events = state.events.lock().unwrap();
    match events.iter().find(|event| event.id == id) {
        Some(event) => {
            Json(serde_json::json!({ "event": event })).into_response()
        }
        None => not_found(),
    }
}

async fn list_images(State(state): State<Arc<StubState>>) -> Response {
    pause(&state).await;
    if let Some(response) = injected_failure(&state) {
        return response;
    }
    Json(serde_json::json!({ "images": state.images })).into_response()
}

async fn create_event(
    State(state): State<Arc<StubState>>, Json(draft): Json<EventDraft>,
) -> Response {
    pause(&state).await;
    if let Some(response) = injected_failure(&state) {
        return response;
    }
    let event = draft.into_event(Uuid::new_v4().to_string());
    state.events.lock().unwrap().push(event.clone());
    Json(serde_json::json!({ "event": event })).into_response()
}

async fn update_event(
    State(state): State<Arc<StubState>>, Path(id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> Response {
    pause(&state).await;
    if let Some(response) = injected_failure(&state) {
        return response;
    }
    let mut events = state.events.lock().unwrap();
    match events.iter_mut().find(|event| event.id == id) {
        Some(stored) => {
            *stored = body.event.into_event(id);
            Json(serde_json::json!({ "event": stored.clone() }))
                .into_response()
        }
        None => not_found(),
    }
}

async fn delete_event(
    State(state): State<Arc<StubState>>, Path(id): Path<String>,
) -> Response {
    pause(&state).await;
    if let Some(response) = injected_failure(&state) {
        return response;
    }
    let mut events = state.events.lock().unwrap();
    let before = events.len();
    events.retain(|event| event.id != id);
    if events.len() == before {
        return not_found();
    }
    Json(serde_json::json!({ "message": "Event deleted" })).into_response()
}
