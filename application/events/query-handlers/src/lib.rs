use std::sync::Arc;

use api_client::EventsGateway;
use common_errors::ApiError;
use events_cache_keys::{EventKey, EventsFilterKey, EventsKey, ImagesKey};
use events_errors::EventError;
use events_models::{Event, SelectableImage};
use events_queries::{GetEventQuery, ListEventsQuery, ListImagesQuery};
use futures::FutureExt;
use query_cache::{QueryCache, QueryFetcher, QueryObserver, QueryOptions};
use tracing::instrument;

/// The detail view tolerates slightly older data than the lists.
const DETAIL_STALE_SECS: u64 = 10;

#[derive(Clone)]
pub struct GetEventQueryHandler {
    gateway: Arc<dyn EventsGateway>,
    cache: QueryCache,
}

impl GetEventQueryHandler {
    pub fn new(gateway: Arc<dyn EventsGateway>, cache: QueryCache) -> Self {
        Self { gateway, cache }
    }

    #[instrument(skip(self))]
    pub async fn execute(
        &self, query: GetEventQuery,
    ) -> Result<Event, EventError> {
        let gateway = self.gateway.clone();
        let event_id = query.event_id.clone();
        self.cache
            .fetch(
                &EventKey,
                (query.event_id.as_str(),),
                &QueryOptions::stale_after(DETAIL_STALE_SECS),
                |token| async move {
                    gateway.fetch_event(&event_id, token).await
                },
            )
            .await
            .map_err(|err| match err {
                ApiError::Request { code: 404, .. } => EventError::NotFound {
                    event_id: query.event_id.clone(),
                },
                err => EventError::Api(err),
            })
    }

    /// Live observation of one event; state follows the cache entry
    /// until the returned observer is dropped.
    pub fn observe(&self, query: &GetEventQuery) -> QueryObserver<Event> {
        let gateway = self.gateway.clone();
        let event_id = query.event_id.clone();
        let fetcher: QueryFetcher<Event> = Arc::new(move |token| {
            let gateway = gateway.clone();
            let event_id = event_id.clone();
            async move { gateway.fetch_event(&event_id, token).await }
                .boxed()
        });
        self.cache.observe(
            &EventKey,
            (query.event_id.as_str(),),
            &QueryOptions::stale_after(DETAIL_STALE_SECS),
            fetcher,
        )
    }
}

#[derive(Clone)]
pub struct ListEventsQueryHandler {
    gateway: Arc<dyn EventsGateway>,
    cache: QueryCache,
}

impl ListEventsQueryHandler {
    pub fn new(gateway: Arc<dyn EventsGateway>, cache: QueryCache) -> Self {
        Self { gateway, cache }
    }

    #[instrument(skip(self))]
    pub async fn execute(
        &self, query: ListEventsQuery,
    ) -> Result<Vec<Event>, EventError> {
        let gateway = self.gateway.clone();

        // The unfiltered list and filtered views are separate key
        // families so invalidating `["events"]` re-syncs them all.
        if query.search.is_none() && query.max.is_none() {
            self.cache
                .fetch(&EventsKey, (), &QueryOptions::default(), |token| {
                    async move { gateway.list_events(None, None, token).await }
                })
                .await
                .map_err(EventError::Api)
        }
        else {
            let search = query.search.clone();
            let max = query.max;
            self.cache
                .fetch(
                    &EventsFilterKey,
                    &query,
                    &QueryOptions::default(),
                    |token| async move {
                        gateway
                            .list_events(search.as_deref(), max, token)
                            .await
                    },
                )
                .await
                .map_err(EventError::Api)
        }
    }

    pub fn observe(&self, query: &ListEventsQuery) -> QueryObserver<Vec<Event>> {
        let gateway = self.gateway.clone();
        let search = query.search.clone();
        let max = query.max;
        let fetcher: QueryFetcher<Vec<Event>> = Arc::new(move |token| {
            let gateway = gateway.clone();
            let search = search.clone();
            async move {
                gateway.list_events(search.as_deref(), max, token).await
            }
            .boxed()
        });
        if query.search.is_none() && query.max.is_none() {
            self.cache
                .observe(&EventsKey, (), &QueryOptions::default(), fetcher)
        }
        else {
            self.cache.observe(
                &EventsFilterKey,
                query,
                &QueryOptions::default(),
                fetcher,
            )
        }
    }
}

#[derive(Clone)]
pub struct ListImagesQueryHandler {
    gateway: Arc<dyn EventsGateway>,
    cache: QueryCache,
}

impl ListImagesQueryHandler {
    pub fn new(gateway: Arc<dyn EventsGateway>, cache: QueryCache) -> Self {
        Self { gateway, cache }
    }

    #[instrument(skip(self))]
    pub async fn execute(
        &self, _query: ListImagesQuery,
    ) -> Result<Vec<SelectableImage>, EventError> {
        let gateway = self.gateway.clone();
        self.cache
            .fetch(&ImagesKey, (), &QueryOptions::default(), |token| {
                async move { gateway.fetch_images(token).await }
            })
            .await
            .map_err(EventError::Api)
    }

    pub fn observe(&self) -> QueryObserver<Vec<SelectableImage>> {
        let gateway = self.gateway.clone();
        let fetcher: QueryFetcher<Vec<SelectableImage>> =
            Arc::new(move |token| {
                let gateway = gateway.clone();
                async move { gateway.fetch_images(token).await }.boxed()
            });
        self.cache
            .observe(&ImagesKey, (), &QueryOptions::default(), fetcher)
    }
}

#[cfg(test)]
mod tests {
    use query_cache::QueryStatus;
    use test_utils::{ScriptedGateway, sample_event};

    use super::*;

    fn handlers(
        gateway: Arc<ScriptedGateway>,
    ) -> (GetEventQueryHandler, ListEventsQueryHandler, QueryCache) {
        let cache = QueryCache::with_defaults();
        (
            GetEventQueryHandler::new(gateway.clone(), cache.clone()),
            ListEventsQueryHandler::new(gateway, cache.clone()),
            cache,
        )
    }

    #[tokio::test]
    async fn observing_an_absent_key_goes_pending_then_success() {
        let gateway = Arc::new(ScriptedGateway::with_events(vec![
            sample_event("42", "Launch"),
        ]));
        let (get_handler, _, _) = handlers(gateway);

        let query = GetEventQuery {
            event_id: "42".into(),
        };
        let mut observer = get_handler.observe(&query);
        assert_eq!(observer.state().status, QueryStatus::Pending);

        let state = observer.settled().await;
        assert_eq!(state.status, QueryStatus::Success);
        let event = state.data.expect("settled success carries data");
        assert_eq!(event.id, "42");
        assert_eq!(event.title, "Launch");
    }

    #[tokio::test]
    async fn missing_event_maps_to_not_found() {
        let gateway = Arc::new(ScriptedGateway::with_events(vec![]));
        let (get_handler, _, _) = handlers(gateway);

        let result = get_handler
            .execute(GetEventQuery {
                event_id: "missing".into(),
            })
            .await;
        assert!(matches!(
            result,
            Err(EventError::NotFound { event_id }) if event_id == "missing"
        ));
    }

    #[tokio::test]
    async fn fresh_detail_entries_resolve_without_the_network() {
        let gateway = Arc::new(ScriptedGateway::with_events(vec![
            sample_event("42", "Launch"),
        ]));
        let (get_handler, _, _) = handlers(gateway.clone());

        let query = GetEventQuery {
            event_id: "42".into(),
        };
        get_handler.execute(query.clone()).await.unwrap();
        get_handler.execute(query).await.unwrap();

        // Second execute hits the 10s freshness window.
        assert_eq!(gateway.fetch_event_calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_searches_share_one_request() {
        let gateway = Arc::new(ScriptedGateway::with_events(vec![
            sample_event("1", "Jazz night"),
            sample_event("2", "Rust meetup"),
        ]));
        gateway.set_latency(std::time::Duration::from_millis(50));
        let (_, list_handler, _) = handlers(gateway.clone());

        let query = ListEventsQuery::search("jazz");
        let (a, b) = tokio::join!(
            list_handler.execute(query.clone()),
            list_handler.execute(query),
        );

        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
        assert_eq!(gateway.list_events_calls(), 1);
    }

    #[tokio::test]
    async fn filtered_and_bare_lists_use_separate_entries() {
        let gateway = Arc::new(ScriptedGateway::with_events(vec![
            sample_event("1", "Jazz night"),
            sample_event("2", "Rust meetup"),
        ]));
        let (_, list_handler, _) = handlers(gateway.clone());

        let all = list_handler
            .execute(ListEventsQuery::default())
            .await
            .unwrap();
        let jazz = list_handler
            .execute(ListEventsQuery::search("jazz"))
            .await
            .unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(jazz.len(), 1);
        assert_eq!(gateway.list_events_calls(), 2);
    }
}
