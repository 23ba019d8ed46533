use std::{sync::Arc, time::Duration};

use common_errors::ApiError;
use events_cache_keys::{EventsKey, EventKey};
use events_command_handlers::DeleteEventHandler;
use events_commands::DeleteEventCommand;
use events_errors::EventError;
use events_queries::ListEventsQuery;
use events_query_handlers::ListEventsQueryHandler;
use query_cache::{QueryBinding, QueryCache};
use test_utils::{ScriptedGateway, sample_event};

#[tokio::test]
async fn delete_marks_the_family_stale_without_refetching() {
    let gateway = Arc::new(ScriptedGateway::with_events(vec![sample_event(
        "42",
        "Jazz night",
    )]));
    let cache = QueryCache::with_defaults();
    let list_handler =
        ListEventsQueryHandler::new(gateway.clone(), cache.clone());
    let delete_handler =
        DeleteEventHandler::new(gateway.clone(), cache.clone());

    let query = ListEventsQuery::default();
    let mut observer = list_handler.observe(&query);
    observer.settled().await;
    assert_eq!(gateway.list_events_calls(), 1);

    delete_handler
        .execute(DeleteEventCommand {
            event_id: "42".into(),
        })
        .await
        .unwrap();

    // Mark-stale-only: the active observer does not refetch.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gateway.list_events_calls(), 1);
    assert!(cache.read_key(&EventsKey.key(())).unwrap().is_stale);

    // The next observation goes back to the network and sees the
    // record gone.
    let refreshed = list_handler
        .execute(ListEventsQuery::default())
        .await
        .unwrap();
    assert!(refreshed.is_empty());
    assert_eq!(gateway.list_events_calls(), 2);
}

#[tokio::test]
async fn deleting_a_missing_event_surfaces_the_error() {
    let gateway = Arc::new(ScriptedGateway::with_events(vec![]));
    let cache = QueryCache::with_defaults();
    let delete_handler = DeleteEventHandler::new(gateway, cache.clone());

    let err = delete_handler
        .execute(DeleteEventCommand {
            event_id: "missing".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EventError::Api(ApiError::Request { code: 404, .. })
    ));

    // A failed delete invalidates nothing.
    assert!(cache.read_key(&EventKey.key(("missing",))).is_none());
}
