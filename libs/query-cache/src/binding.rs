use serde::{Serialize, de::DeserializeOwned};

use crate::key::QueryKey;

/// Associates a query key with the value type cached under it.
///
/// Implementations are usually declared with the [`query_key!`] macro;
/// keys that carry a parameter map implement the trait by hand.
///
/// [`query_key!`]: crate::query_key
pub trait QueryBinding {
    type Value: Serialize
        + DeserializeOwned
        + Clone
        + Send
        + Sync
        + 'static;
    type Args<'r>;

    fn key(&self, args: Self::Args<'_>) -> QueryKey;
}
