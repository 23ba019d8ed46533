//! End-to-end flow over the wire: real HTTP client against the
//! in-process stub backend.

use std::sync::Arc;

use api_client::{ApiConfig, EventsClient, EventsGateway};
use common_errors::ApiError;
use events_cache_keys::EventKey;
use events_command_handlers::{
    CreateEventHandler, DeleteEventHandler, UpdateEventHandler,
};
use events_commands::{
    CreateEventCommand, DeleteEventCommand, UpdateEventCommand,
};
use events_errors::EventError;
use events_queries::{GetEventQuery, ListEventsQuery};
use events_query_handlers::{GetEventQueryHandler, ListEventsQueryHandler};
use query_cache::QueryCache;
use test_utils::{StubBackend, sample_draft, sample_event};

struct Harness {
    cache: QueryCache,
    gateway: Arc<dyn EventsGateway>,
}

impl Harness {
    fn new(backend: &StubBackend) -> Self {
        let client =
            EventsClient::new(&ApiConfig::with_base_url(backend.base_url()))
                .unwrap();
        Self {
            cache: QueryCache::with_defaults(),
            gateway: Arc::new(client),
        }
    }
}

#[tokio::test]
async fn full_crud_flow_against_the_backend() {
    let backend = StubBackend::spawn().await;
    let harness = Harness::new(&backend);

    let create_handler = CreateEventHandler::new(
        harness.gateway.clone(),
        harness.cache.clone(),
    );
    let list_handler = ListEventsQueryHandler::new(
        harness.gateway.clone(),
        harness.cache.clone(),
    );
    let get_handler = GetEventQueryHandler::new(
        harness.gateway.clone(),
        harness.cache.clone(),
    );
    let update_handler = UpdateEventHandler::new(
        harness.gateway.clone(),
        harness.cache.clone(),
    );
    let delete_handler = DeleteEventHandler::new(
        harness.gateway.clone(),
        harness.cache.clone(),
    );

    let created = create_handler
        .execute(CreateEventCommand {
            event: sample_draft("Launch party"),
        })
        .await
        .unwrap();

    let listed = list_handler
        .execute(ListEventsQuery::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let fetched = get_handler
        .execute(GetEventQuery {
            event_id: created.id.clone(),
        })
        .await
        .unwrap();
    assert_eq!(fetched.title, "Launch party");

    update_handler
        .execute(UpdateEventCommand {
            event_id: created.id.clone(),
            event: sample_draft("Launch party, rescheduled"),
        })
        .await
        .unwrap();
    assert_eq!(backend.events()[0].title, "Launch party, rescheduled");

    delete_handler
        .execute(DeleteEventCommand {
            event_id: created.id.clone(),
        })
        .await
        .unwrap();
    assert!(backend.events().is_empty());
}

#[tokio::test]
async fn a_backend_failure_rolls_the_optimistic_update_back() {
    let backend =
        StubBackend::spawn_with(vec![sample_event("42", "Original")]).await;
    let harness = Harness::new(&backend);

    let get_handler = GetEventQueryHandler::new(
        harness.gateway.clone(),
        harness.cache.clone(),
    );
    let update_handler = UpdateEventHandler::new(
        harness.gateway.clone(),
        harness.cache.clone(),
    );

    let before = get_handler
        .execute(GetEventQuery {
            event_id: "42".into(),
        })
        .await
        .unwrap();

    backend.fail_next(500, serde_json::json!({ "message": "boom" }));
    let err = update_handler
        .execute(UpdateEventCommand {
            event_id: "42".into(),
            event: sample_draft("Doomed rename"),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EventError::Api(ApiError::Request { code: 500, .. })
    ));

    let cached = harness
        .cache
        .read_value(&EventKey, ("42",))
        .unwrap()
        .expect("rolled-back value is present");
    assert_eq!(cached, before);
    // The backend record never changed.
    assert_eq!(backend.events()[0].title, "Original");
}
