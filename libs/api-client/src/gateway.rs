use async_trait::async_trait;
use common_errors::ApiResult;
use events_models::{Event, EventDraft, SelectableImage};
use tokio_util::sync::CancellationToken;

/// The seam between the application handlers and the wire.
///
/// Read operations take a cancellation token and honor it at every
/// suspension point; a triggered token fails the call with a
/// `Cancelled` outcome that callers swallow. Mutations run to
/// completion once issued, as the backend does not undo them.
#[async_trait]
pub trait EventsGateway: Send + Sync {
    async fn list_events(
        &self, search: Option<&str>, max: Option<u32>,
        token: CancellationToken,
    ) -> ApiResult<Vec<Event>>;

    async fn fetch_event(
        &self, event_id: &str, token: CancellationToken,
    ) -> ApiResult<Event>;

    async fn fetch_images(
        &self, token: CancellationToken,
    ) -> ApiResult<Vec<SelectableImage>>;

    async fn create_event(&self, draft: &EventDraft) -> ApiResult<Event>;

    async fn update_event(
        &self, event_id: &str, event: &EventDraft,
    ) -> ApiResult<()>;

    async fn delete_event(&self, event_id: &str) -> ApiResult<()>;
}
