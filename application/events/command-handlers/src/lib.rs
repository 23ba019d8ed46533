use std::sync::Arc;

use api_client::EventsGateway;
use events_cache_keys::{EventKey, EventsKey};
use events_commands::{
    CreateEventCommand, DeleteEventCommand, UpdateEventCommand,
};
use events_errors::EventError;
use events_models::Event;
use query_cache::{InvalidateMode, QueryBinding, QueryCache};
use tracing::instrument;

/// Snapshot taken before an optimistic write. Lives for exactly one
/// mutation attempt and is dropped at settlement.
struct MutationContext {
    previous: Option<Event>,
}

#[derive(Clone)]
pub struct CreateEventHandler {
    gateway: Arc<dyn EventsGateway>,
    cache: QueryCache,
}

impl CreateEventHandler {
    pub fn new(gateway: Arc<dyn EventsGateway>, cache: QueryCache) -> Self {
        Self { gateway, cache }
    }

    #[instrument(skip(self, command))]
    pub async fn execute(
        &self, command: CreateEventCommand,
    ) -> Result<Event, EventError> {
        let created = self
            .gateway
            .create_event(&command.event)
            .await
            .map_err(EventError::Api)?;

        // The new record lands in every list on the next observation.
        self.cache.invalidate(&EventsKey.key(()));

        Ok(created)
    }
}

#[derive(Clone)]
pub struct UpdateEventHandler {
    gateway: Arc<dyn EventsGateway>,
    cache: QueryCache,
}

impl UpdateEventHandler {
    pub fn new(gateway: Arc<dyn EventsGateway>, cache: QueryCache) -> Self {
        Self { gateway, cache }
    }

    /// Optimistic update: observers of the event render the proposed
    /// value immediately, a failed request restores the snapshot, and
    /// settlement re-syncs the whole family with server truth either
    /// way.
    #[instrument(skip(self, command), fields(event_id = %command.event_id))]
    pub async fn execute(
        &self, command: UpdateEventCommand,
    ) -> Result<(), EventError> {
        let key = EventKey.key((command.event_id.as_str(),));

        // A stale in-flight response must not land on top of the
        // optimistic value.
        self.cache.cancel_in_flight(&key);

        let context = MutationContext {
            previous: self
                .cache
                .read_value(&EventKey, (command.event_id.as_str(),))
                .ok()
                .flatten(),
        };

        let optimistic =
            command.event.clone().into_event(command.event_id.clone());
        self.cache
            .write_key(&key, &optimistic)
            .map_err(EventError::Api)?;

        let result = self
            .gateway
            .update_event(&command.event_id, &command.event)
            .await;

        if result.is_err() {
            match &context.previous {
                Some(previous) => {
                    let _ = self.cache.write_key(&key, previous);
                }
                None => self.cache.remove_value(&key),
            }
        }

        // Never skipped, even when the optimistic value matches what
        // the server stored: derived fields may differ.
        self.cache.invalidate(&EventsKey.key(()));

        result.map_err(EventError::Api)
    }
}

#[derive(Clone)]
pub struct DeleteEventHandler {
    gateway: Arc<dyn EventsGateway>,
    cache: QueryCache,
}

impl DeleteEventHandler {
    pub fn new(gateway: Arc<dyn EventsGateway>, cache: QueryCache) -> Self {
        Self { gateway, cache }
    }

    #[instrument(skip(self))]
    pub async fn execute(
        &self, command: DeleteEventCommand,
    ) -> Result<(), EventError> {
        self.gateway
            .delete_event(&command.event_id)
            .await
            .map_err(EventError::Api)?;

        // The caller navigates away from the deleted entity, so the
        // family is only marked stale; the next observation refetches.
        self.cache.invalidate_with_mode(
            &EventsKey.key(()),
            InvalidateMode::MarkStaleOnly,
        );

        Ok(())
    }
}
