use events_models::{Event, SelectableImage};
use events_queries::ListEventsQuery;
use query_cache::{QueryBinding, QueryKey, query_key};

query_key!(EventsKey::<Vec<Event>> => ["events"]);
query_key!(EventKey::<Event> => ["events"][id: str]);
query_key!(ImagesKey::<Vec<SelectableImage>> => ["events", "images"]);

/// Key for filtered list queries: `["events", {search, max}]`. The
/// filter lands in a parameter-map segment so two requests with the
/// same filters share an entry regardless of parameter order.
pub struct EventsFilterKey;

impl QueryBinding for EventsFilterKey {
    type Value = Vec<Event>;
    type Args<'r> = &'r ListEventsQuery;

    fn key(&self, query: Self::Args<'_>) -> QueryKey {
        let mut pairs: Vec<(String, String)> = Vec::new();
        if let Some(term) = &query.search {
            pairs.push(("search".into(), term.clone()));
        }
        if let Some(max) = query.max {
            pairs.push(("max".into(), max.to_string()));
        }
        QueryKey::root("events").params(pairs)
    }
}
