use std::{borrow::Cow, collections::BTreeMap, fmt};

/// One segment of a [`QueryKey`]: plain text or a parameter map.
///
/// Parameter maps compare order-independently (`BTreeMap`), segment
/// order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Text(Cow<'static, str>),
    Params(BTreeMap<String, String>),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Params(params) => {
                write!(f, "{{")?;
                for (i, (k, v)) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Identifier tuple addressing one cache entry, e.g. `["events"]`,
/// `["events", "42"]` or `["events", {search=jazz}]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    pub fn root(segment: impl Into<Cow<'static, str>>) -> Self {
        Self(vec![KeySegment::Text(segment.into())])
    }

    pub fn of<I>(segments: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Cow<'static, str>>,
    {
        Self(
            segments
                .into_iter()
                .map(|s| KeySegment::Text(s.into()))
                .collect(),
        )
    }

    /// Append a text segment.
    pub fn text(mut self, segment: impl Into<Cow<'static, str>>) -> Self {
        self.0.push(KeySegment::Text(segment.into()));
        self
    }

    /// Append a parameter-map segment. Pair order does not matter.
    pub fn params<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeySegment::Params(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// Prefix-family match: `["events","42"]` starts with `["events"]`
    /// but not with `["events","images"]`.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len()
            && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&'static str> for QueryKey {
    fn from(segment: &'static str) -> Self {
        Self::root(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matching() {
        let family = QueryKey::root("events");
        let detail = QueryKey::root("events").text("42".to_string());
        let images = QueryKey::of(["events", "images"]);

        assert!(detail.starts_with(&family));
        assert!(images.starts_with(&family));
        assert!(family.starts_with(&family));
        assert!(!family.starts_with(&detail));
        assert!(!detail.starts_with(&images));
    }

    #[test]
    fn param_order_is_irrelevant() {
        let a = QueryKey::root("events")
            .params([("search", "jazz"), ("max", "3")]);
        let b = QueryKey::root("events")
            .params([("max", "3"), ("search", "jazz")]);
        assert_eq!(a, b);
    }

    #[test]
    fn segment_order_is_significant() {
        let a = QueryKey::of(["events", "images"]);
        let b = QueryKey::of(["images", "events"]);
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_readable() {
        let key = QueryKey::root("events").params([("search", "jazz")]);
        assert_eq!(key.to_string(), "events:{search=jazz}");
    }
}
