use std::{sync::Arc, time::Duration};

use common_errors::ApiError;
use events_command_handlers::CreateEventHandler;
use events_commands::CreateEventCommand;
use events_errors::EventError;
use events_queries::ListEventsQuery;
use events_query_handlers::ListEventsQueryHandler;
use query_cache::QueryCache;
use test_utils::{ScriptedGateway, sample_draft, sample_event};
use tokio::time::timeout;

#[tokio::test]
async fn create_refetches_observed_lists() {
    let gateway = Arc::new(ScriptedGateway::with_events(vec![sample_event(
        "1",
        "Jazz night",
    )]));
    let cache = QueryCache::with_defaults();
    let list_handler =
        ListEventsQueryHandler::new(gateway.clone(), cache.clone());
    let create_handler =
        CreateEventHandler::new(gateway.clone(), cache.clone());

    let query = ListEventsQuery::default();
    let mut observer = list_handler.observe(&query);
    let state = observer.settled().await;
    assert_eq!(state.data.map(|events| events.len()), Some(1));
    assert_eq!(gateway.list_events_calls(), 1);

    let created = create_handler
        .execute(CreateEventCommand {
            event: sample_draft("Rust meetup"),
        })
        .await
        .unwrap();
    assert!(!created.id.is_empty());

    // Invalidation refetches the observed list in the background.
    timeout(Duration::from_secs(1), async {
        loop {
            let state = observer.state();
            if state
                .data
                .as_ref()
                .is_some_and(|events| events.len() == 2)
            {
                break;
            }
            observer.changed().await;
        }
    })
    .await
    .expect("the observed list should pick up the new event");
    assert_eq!(gateway.list_events_calls(), 2);
}

#[tokio::test]
async fn failed_create_surfaces_the_error_and_skips_invalidation() {
    let gateway = Arc::new(ScriptedGateway::with_events(vec![sample_event(
        "1",
        "Jazz night",
    )]));
    let cache = QueryCache::with_defaults();
    let list_handler =
        ListEventsQueryHandler::new(gateway.clone(), cache.clone());
    let create_handler =
        CreateEventHandler::new(gateway.clone(), cache.clone());

    let query = ListEventsQuery::default();
    let mut observer = list_handler.observe(&query);
    observer.settled().await;
    assert_eq!(gateway.list_events_calls(), 1);

    gateway.fail_next(ApiError::request(
        422,
        Some(serde_json::json!({ "message": "title is required" })),
    ));
    let err = create_handler
        .execute(CreateEventCommand {
            event: sample_draft(""),
        })
        .await
        .unwrap_err();
    assert_eq!(err.message("fallback"), "title is required");
    assert!(matches!(
        err,
        EventError::Api(ApiError::Request { code: 422, .. })
    ));

    // Nothing settled, so nothing was invalidated or refetched.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gateway.list_events_calls(), 1);
}
