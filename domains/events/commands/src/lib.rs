use events_models::EventDraft;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventCommand {
    pub event: EventDraft,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEventCommand {
    #[serde(skip)]
    pub event_id: String,
    pub event: EventDraft,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteEventCommand {
    pub event_id: String,
}
