//! Ordered, de-duplicated target URL lists.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// An insertion-ordered set of target URLs.
///
/// Serialises as a plain list so it maps onto `TEXT[]` columns and JSON
/// arrays without a wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TargetSet(IndexSet<String>);

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a URL; returns false if it was already present.
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        self.0.insert(url.into())
    }

    pub fn remove(&mut self, url: &str) -> bool {
        self.0.shift_remove(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.contains(url)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_disjoint(&self, other: &TargetSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl From<Vec<String>> for TargetSet {
    fn from(urls: Vec<String>) -> Self {
        Self(urls.into_iter().collect())
    }
}

impl From<TargetSet> for Vec<String> {
    fn from(set: TargetSet) -> Self {
        set.0.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for TargetSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for TargetSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a String;
    type IntoIter = indexmap::set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_wins() {
        let set: TargetSet = ["http://b/", "http://a/", "http://b/"].into_iter().collect();
        assert_eq!(set.to_vec(), vec!["http://b/", "http://a/"]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut set: TargetSet = ["1", "2", "3"].into_iter().collect();
        set.remove("2");
        assert_eq!(set.to_vec(), vec!["1", "3"]);
    }

    #[test]
    fn test_serializes_as_list() {
        let set: TargetSet = ["x"].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), "[\"x\"]");
    }
}
