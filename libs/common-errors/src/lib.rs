use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error shape shared by the HTTP client, the query cache and the
/// application handlers. Cache entries and observer states hold onto
/// errors, so every variant is `Clone`.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status. `info` carries the
    /// parsed response body when there was one.
    #[error("request failed with status {code}")]
    Request {
        code: u16,
        info: Option<serde_json::Value>,
    },
    #[error("network error: {0}")]
    Network(String),
    /// The request was cancelled before it resolved. Never shown to the
    /// user; callers swallow it.
    #[error("request was cancelled")]
    Cancelled,
    #[error("failed to decode response: {0}")]
    Decode(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn request(code: u16, info: Option<serde_json::Value>) -> Self {
        Self::Request { code, info }
    }

    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::Network(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status of the failed request, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// User-facing message: the server's `info.message` field when
    /// present, otherwise the given fallback.
    pub fn message<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self {
            Self::Request {
                info: Some(info), ..
            } => info
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or(fallback),
            _ => fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_prefers_server_detail() {
        let err = ApiError::request(
            422,
            Some(serde_json::json!({ "message": "title is required" })),
        );
        assert_eq!(err.message("fallback"), "title is required");
    }

    #[test]
    fn message_falls_back_without_info() {
        let err = ApiError::request(500, None);
        assert_eq!(err.message("Failed to fetch events."), "Failed to fetch events.");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn cancelled_is_distinguishable() {
        assert!(ApiError::Cancelled.is_cancelled());
        assert!(!ApiError::network("connection refused").is_cancelled());
    }
}
