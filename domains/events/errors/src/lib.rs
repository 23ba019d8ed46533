use common_errors::ApiError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EventError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("Event not found: {event_id}")]
    NotFound { event_id: String },
}

impl EventError {
    /// Cancelled requests bubble up as errors but must never be shown.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_cancelled())
    }

    pub fn message<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self {
            Self::Api(err) => err.message(fallback),
            Self::NotFound { .. } => fallback,
        }
    }
}
