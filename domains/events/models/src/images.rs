use serde::{Deserialize, Serialize};

/// One of the backend's selectable event images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectableImage {
    pub path: String,
    pub caption: String,
}
