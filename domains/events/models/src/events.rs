use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// An event record as the backend owns it. The `id` is minted
/// server-side; the client never invents one.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    TypedBuilder,
)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Calendar date as the backend formats it, e.g. `2025-06-14`.
    pub date: String,
    /// Wall-clock time as the backend formats it, e.g. `18:00`.
    pub time: String,
    pub location: String,
    /// Path of the chosen image, relative to the backend root.
    pub image: String,
}

/// Payload for create and update requests: an [`Event`] without its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub image: String,
}

impl EventDraft {
    /// Attach an id, producing the event this draft would become.
    /// Used for optimistic cache writes before the server confirms.
    pub fn into_event(self, id: impl Into<String>) -> Event {
        Event {
            id: id.into(),
            title: self.title,
            description: self.description,
            date: self.date,
            time: self.time,
            location: self.location,
            image: self.image,
        }
    }
}

impl From<Event> for EventDraft {
    fn from(event: Event) -> Self {
        Self {
            title: event.title,
            description: event.description,
            date: event.date,
            time: event.time,
            location: event.location,
            image: event.image,
        }
    }
}
