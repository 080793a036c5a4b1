//! A glorified `Vec<String>` with set-like intersection, used to filter
//! jobs during emission.

use std::collections::BTreeSet;

/// Normalized set of tag strings attached to a [`crate::domain::entities::Job`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tags(pub Vec<String>);

impl Tags {
    /// Coerce a single tag, a list of tags, or nothing into a `Tags` value.
    pub fn coerce_one(tag: impl Into<String>) -> Self {
        Tags(vec![tag.into()])
    }

    pub fn from_iter<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Tags(tags.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set intersection against another tag collection (order-independent).
    pub fn intersects(&self, other: &Tags) -> bool {
        if other.0.is_empty() || self.0.is_empty() {
            return false;
        }
        let other_set: BTreeSet<&str> = other.0.iter().map(String::as_str).collect();
        self.0.iter().any(|t| other_set.contains(t.as_str()))
    }
}
