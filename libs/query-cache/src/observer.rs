use std::{sync::Arc, time::Duration};

use common_errors::ApiResult;
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    binding::QueryBinding,
    config::QueryOptions,
    entry::{QueryState, QueryStatus},
    key::QueryKey,
    store::{ObserverSignal, QueryCache, encode},
};

/// Reusable fetch operation bound to an observed key. Receives the
/// cancellation token of the attempt it runs under.
pub type QueryFetcher<T> = Arc<
    dyn Fn(CancellationToken) -> BoxFuture<'static, ApiResult<T>>
        + Send
        + Sync,
>;

/// Live view of one observed key.
///
/// State follows `Idle -> Pending -> Success | Error`, with any state
/// back to `Pending` on refetch. Dropping the observer unregisters it;
/// when the last observer of a key goes away, the key's in-flight
/// fetch is cancelled and the retention clock starts.
pub struct QueryObserver<T> {
    state_rx: watch::Receiver<QueryState<T>>,
    guard: Arc<ObserverGuard>,
}

struct ObserverGuard {
    cache: QueryCache,
    key: QueryKey,
    id: u64,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.cache.unregister_observer(&self.key, self.id);
    }
}

impl<T: Clone + Send + Sync + 'static> QueryObserver<T> {
    pub fn key(&self) -> &QueryKey {
        &self.guard.key
    }

    /// Current state snapshot.
    pub fn state(&self) -> QueryState<T> {
        self.state_rx.borrow().clone()
    }

    /// Waits for the next state transition. Returns `false` once no
    /// further transitions can arrive.
    pub async fn changed(&mut self) -> bool {
        self.state_rx.changed().await.is_ok()
    }

    /// Waits until the observed query settles into `Success` or
    /// `Error` and returns that state.
    pub async fn settled(&mut self) -> QueryState<T> {
        loop {
            let state = self.state();
            if state.is_success() || state.is_error() {
                return state;
            }
            if self.state_rx.changed().await.is_err() {
                return self.state();
            }
        }
    }
}

impl QueryCache {
    /// Binds an observer to a key: resolves from cache when fresh,
    /// fetches otherwise, and keeps following the entry until the
    /// observer is dropped.
    pub fn observe<B>(
        &self, binding: &B, args: B::Args<'_>, options: &QueryOptions,
        fetcher: QueryFetcher<B::Value>,
    ) -> QueryObserver<B::Value>
    where
        B: QueryBinding,
    {
        let key = binding.key(args);
        let stale_after = options
            .stale_after
            .unwrap_or_else(|| self.config().stale_after());
        let (id, signals) = self.register_observer(&key, stale_after);

        let needs_fetch = match self.read_key(&key) {
            Some(snapshot) => {
                !(snapshot.status == QueryStatus::Success
                    && snapshot.data.is_some()
                    && !snapshot.is_stale)
            }
            None => true,
        };
        let mut initial = self.observed_state::<B::Value>(&key);
        if needs_fetch {
            initial.status = QueryStatus::Pending;
        }
        let (state_tx, state_rx) = watch::channel(initial);

        let guard = Arc::new(ObserverGuard {
            cache: self.clone(),
            key: key.clone(),
            id,
        });
        let cache = self.clone();
        tokio::spawn(drive_observer(
            cache,
            key,
            stale_after,
            fetcher,
            signals,
            state_tx,
            needs_fetch,
        ));

        QueryObserver { state_rx, guard }
    }

    fn observed_state<T: DeserializeOwned>(
        &self, key: &QueryKey,
    ) -> QueryState<T> {
        match self.read_key(key) {
            Some(snapshot) => {
                let data = snapshot
                    .data
                    .as_ref()
                    .and_then(|bytes| serde_json::from_slice(bytes).ok());
                QueryState {
                    status: snapshot.status,
                    data,
                    error: snapshot.error,
                }
            }
            None => QueryState {
                status: QueryStatus::Idle,
                data: None,
                error: None,
            },
        }
    }
}

async fn drive_observer<T>(
    cache: QueryCache, key: QueryKey, stale_after: Duration,
    fetcher: QueryFetcher<T>, signals: flume::Receiver<ObserverSignal>,
    state_tx: watch::Sender<QueryState<T>>, mut refetch: bool,
) where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    loop {
        if refetch {
            refetch = false;
            let mut pending = cache.observed_state::<T>(&key);
            pending.status = QueryStatus::Pending;
            if state_tx.send(pending).is_err() {
                break;
            }

            let fetch = fetcher.clone();
            let result = cache
                .fetch_bytes(key.clone(), stale_after, move |token| {
                    let value = fetch(token);
                    async move { encode(&value.await?) }
                })
                .await;
            if let Err(err) = &result {
                if !err.is_cancelled() {
                    debug!(key = %key, error = %err, "observed fetch failed");
                }
            }
            if state_tx.send(cache.observed_state::<T>(&key)).is_err() {
                break;
            }
        }

        match signals.recv_async().await {
            Ok(ObserverSignal::Refetch) => refetch = true,
            Ok(ObserverSignal::Sync) => {
                if state_tx.send(cache.observed_state::<T>(&key)).is_err() {
                    break;
                }
            }
            // The observer was dropped; no further state is delivered.
            Err(_) => break,
        }
    }
}
