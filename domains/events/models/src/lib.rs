pub mod events;
pub mod images;

pub use events::{Event, EventDraft};
pub use images::SelectableImage;
