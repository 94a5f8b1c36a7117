//! Include/exclude name filters.

use serde::{Deserialize, Serialize};

/// Name filter: `include` restricts, `exclude` then removes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilter {
    /// Only these names, when non-empty.
    #[serde(default)]
    pub include: Vec<String>,
    /// Never these names.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl NameFilter {
    /// Creates a filter.
    #[must_use]
    pub const fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Returns true if `name` passes the filter.
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        (self.include.is_empty() || self.include.iter().any(|n| n == name))
            && !self.exclude.iter().any(|n| n == name)
    }

    /// Keeps the items whose name passes, preserving order.
    pub fn apply<T>(&self, items: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
        items.into_iter().filter(|item| self.allows(name(item))).collect()
    }

    /// Included names that do not occur in `available`.
    #[must_use]
    pub fn unresolved<'a>(&'a self, available: &[&str]) -> Vec<&'a str> {
        self.include
            .iter()
            .map(String::as_str)
            .filter(|n| !available.contains(n))
            .collect()
    }

    /// Returns true if neither list has entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_intersection_then_subtraction() {
        let filter = NameFilter::new(names(&["a", "b", "c"]), names(&["b", "z"]));
        let kept = filter.apply(names(&["a", "b", "c", "d"]), String::as_str);
        assert_eq!(kept, names(&["a", "c"]));
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        let filter = NameFilter::default();
        assert!(filter.allows("anything"));
        assert!(filter.is_empty());
    }

    #[test]
    fn test_exclude_only() {
        let filter = NameFilter::new(Vec::new(), names(&["Nils Rideshare"]));
        assert!(filter.allows("Acme Rideshare"));
        assert!(!filter.allows("Nils Rideshare"));
    }

    #[test]
    fn test_unresolved_includes() {
        let filter = NameFilter::new(names(&["Acme Rideshare", "Ghost"]), Vec::new());
        assert_eq!(filter.unresolved(&["Acme Rideshare", "Nils Rideshare"]), vec!["Ghost"]);
    }
}
