use std::time::Duration;

use api_client::{ApiConfig, EventsClient, EventsGateway};
use common_errors::ApiError;
use test_utils::{StubBackend, sample_draft, sample_event};
use tokio_util::sync::CancellationToken;

fn client_for(backend: &StubBackend) -> EventsClient {
    EventsClient::new(&ApiConfig::with_base_url(backend.base_url())).unwrap()
}

#[tokio::test]
async fn list_returns_the_events_field() {
    let backend = StubBackend::spawn_with(vec![
        sample_event("1", "Jazz night"),
        sample_event("2", "Rust meetup"),
    ])
    .await;
    let client = client_for(&backend);

    let events = client
        .list_events(None, None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].title, "Jazz night");
}

#[tokio::test]
async fn search_and_max_narrow_the_list() {
    let backend = StubBackend::spawn_with(vec![
        sample_event("1", "Jazz night"),
        sample_event("2", "Jazz brunch"),
        sample_event("3", "Rust meetup"),
    ])
    .await;
    let client = client_for(&backend);

    let jazz = client
        .list_events(Some("jazz"), None, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(jazz.len(), 2);

    let capped = client
        .list_events(Some("jazz"), Some(1), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(capped.len(), 1);
}

#[tokio::test]
async fn non_success_carries_status_and_body() {
    let backend = StubBackend::spawn().await;
    backend.fail_next(500, serde_json::json!({ "message": "boom" }));
    let client = client_for(&backend);

    let err = client
        .list_events(None, None, CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        ApiError::Request { code, info } => {
            assert_eq!(*code, 500);
            assert!(info.is_some());
        }
        other => panic!("expected request error, got {other:?}"),
    }
    assert_eq!(err.message("fallback"), "boom");
}

#[tokio::test]
async fn fetching_a_missing_event_is_a_404() {
    let backend = StubBackend::spawn().await;
    let client = client_for(&backend);

    let err = client
        .fetch_event("nope", CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.message("fallback"), "Event not found");
}

#[tokio::test]
async fn create_returns_the_server_owned_event() {
    let backend = StubBackend::spawn().await;
    let client = client_for(&backend);

    let created = client
        .create_event(&sample_draft("Launch party"))
        .await
        .unwrap();

    assert!(!created.id.is_empty());
    assert_eq!(created.title, "Launch party");
    assert_eq!(backend.events().len(), 1);
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let backend =
        StubBackend::spawn_with(vec![sample_event("1", "Old title")]).await;
    let client = client_for(&backend);

    let mut draft = sample_draft("New title");
    draft.location = "Main stage".into();
    client.update_event("1", &draft).await.unwrap();
    let stored = &backend.events()[0];
    assert_eq!(stored.title, "New title");
    assert_eq!(stored.location, "Main stage");

    client.delete_event("1").await.unwrap();
    assert!(backend.events().is_empty());
}

#[tokio::test]
async fn images_endpoint_returns_the_images_field() {
    let backend = StubBackend::spawn().await;
    let client = client_for(&backend);

    let images = client
        .fetch_images(CancellationToken::new())
        .await
        .unwrap();

    assert!(!images.is_empty());
    assert!(images.iter().all(|image| !image.path.is_empty()));
}

#[tokio::test]
async fn a_triggered_token_cancels_the_call() {
    let backend = StubBackend::spawn_with(vec![
        sample_event("1", "Jazz night"),
    ])
    .await;
    backend.set_latency(Duration::from_millis(200));
    let client = client_for(&backend);

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
    }

    let err = client
        .list_events(None, None, token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}
