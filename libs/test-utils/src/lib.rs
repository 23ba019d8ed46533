//! Shared test infrastructure: an in-process stub backend speaking the
//! events REST surface, a scripted in-memory gateway for tests that do
//! not need the wire, and fixture builders.

pub mod backend;
pub mod scripted;

pub use backend::StubBackend;
pub use scripted::ScriptedGateway;

use events_models::{Event, EventDraft, SelectableImage};

pub fn sample_event(id: impl Into<String>, title: impl Into<String>) -> Event {
    Event::builder()
        .id(id.into())
        .title(title.into())
        .description("A gathering worth attending".into())
        .date(chrono::Utc::now().format("%Y-%m-%d").to_string())
        .time("18:00".into())
        .location("Community hall".into())
        .image("images/city.jpg".into())
        .build()
}

pub fn sample_draft(title: impl Into<String>) -> EventDraft {
    EventDraft::builder()
        .title(title.into())
        .description("A gathering worth attending".into())
        .date(chrono::Utc::now().format("%Y-%m-%d").to_string())
        .time("18:00".into())
        .location("Community hall".into())
        .image("images/city.jpg".into())
        .build()
}

pub fn sample_images() -> Vec<SelectableImage> {
    vec![
        SelectableImage {
            path: "images/city.jpg".into(),
            caption: "City skyline at dusk".into(),
        },
        SelectableImage {
            path: "images/forest.jpg".into(),
            caption: "Forest clearing".into(),
        },
    ]
}
