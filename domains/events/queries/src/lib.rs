use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GetEventQuery {
    pub event_id: String,
}

/// Parameters of the events list. `search` narrows by term, `max` caps
/// the result count; the backend treats both as optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListEventsQuery {
    pub search: Option<String>,
    pub max: Option<u32>,
}

impl ListEventsQuery {
    pub fn recent(max: u32) -> Self {
        Self {
            search: None,
            max: Some(max),
        }
    }

    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            max: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListImagesQuery {}
