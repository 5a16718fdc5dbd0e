// SPDX-License-Identifier: Apache-2.0

//! Field name matching by exact name or `prefix*` wildcard.
//!
//! Used both to drop fields from a row (`ignore_fields`) and to gate which
//! fields participate in stream identity derivation. Names are matched as
//! raw bytes rather than `&str`: field names are documented as
//! UTF-8-compatible, but the filter itself has no reason to require it.

use ahash::AHashSet;

/// Set membership over literal field names and `prefix*` wildcard entries.
///
/// An empty filter never matches anything.
#[derive(Debug, Default, Clone)]
pub struct FieldsFilter {
    literals: AHashSet<Vec<u8>>,
    wildcard_prefixes: Vec<Vec<u8>>,
}

impl FieldsFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`. A trailing `*` makes it a prefix wildcard; anything
    /// else is a literal match.
    pub fn add(&mut self, name: &str) {
        match name.strip_suffix('*') {
            Some(prefix) => self.wildcard_prefixes.push(prefix.as_bytes().to_vec()),
            None => {
                let _ = self.literals.insert(name.as_bytes().to_vec());
            }
        }
    }

    /// Returns true if `name` is a registered literal, or starts with any
    /// registered wildcard prefix.
    #[must_use]
    pub fn matches(&self, name: &[u8]) -> bool {
        if self.literals.contains(name) {
            return true;
        }
        self.wildcard_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_slice()))
    }

    /// Whether any literal or wildcard has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty() && self.wildcard_prefixes.is_empty()
    }

    /// Clears both the literal and wildcard sets.
    pub fn reset(&mut self) {
        self.literals.clear();
        self.wildcard_prefixes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_nothing() {
        let f = FieldsFilter::new();
        assert!(f.is_empty());
        assert!(!f.matches(b"anything"));
    }

    #[test]
    fn literal_match_is_exact() {
        let mut f = FieldsFilter::new();
        f.add("host");
        assert!(f.matches(b"host"));
        assert!(!f.matches(b"hostname"));
        assert!(!f.matches(b"ho"));
    }

    #[test]
    fn wildcard_matches_by_prefix() {
        let mut f = FieldsFilter::new();
        f.add("kubernetes_*");
        assert!(f.matches(b"kubernetes_pod_name"));
        assert!(f.matches(b"kubernetes_"));
        assert!(!f.matches(b"kubernete"));
    }

    #[test]
    fn reset_clears_both_sets() {
        let mut f = FieldsFilter::new();
        f.add("host");
        f.add("k8s_*");
        f.reset();
        assert!(f.is_empty());
        assert!(!f.matches(b"host"));
        assert!(!f.matches(b"k8s_pod"));
    }
}
