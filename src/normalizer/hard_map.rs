//! Level 0: exact-match hard mapping from a normalized raw query to a
//! canonical product name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::normalize_string;

/// Raw-key to canonical-name table. Keys are stored pre-normalized
/// (`N(raw_key)`) so lookup is a single hash/string comparison; entries are
/// walked in descending raw-key length so a more specific key wins over a
/// shorter prefix-like one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardMapping {
    entries: BTreeMap<String, String>,
}

impl HardMapping {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(raw_key, canonical)| (normalize_string(&raw_key), canonical))
            .collect();
        Self { entries }
    }

    /// Look up a pre-normalized query `q`, walking keys longest-first so the
    /// most specific match wins. Stored keys are already `N`-normalized, so
    /// this is an exact string comparison, never a substring match.
    pub fn lookup(&self, q: &str) -> Option<String> {
        self.entries
            .iter()
            .filter(|(key, _)| key.as_str() == q)
            .max_by_key(|(key, _)| key.len())
            .map(|(_, canonical)| canonical.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_only() {
        let map = HardMapping::from_pairs([("Galaxy S24 Ultra".to_string(), "Samsung Galaxy S24 Ultra".to_string())]);
        assert_eq!(map.lookup("galaxy s24 ultra"), Some("Samsung Galaxy S24 Ultra".to_string()));
        assert_eq!(map.lookup("galaxy s24"), None);
    }

    #[test]
    fn longest_key_wins() {
        let map = HardMapping::from_pairs([
            ("iphone 15".to_string(), "Apple iPhone 15".to_string()),
            ("iphone 15 pro".to_string(), "Apple iPhone 15 Pro".to_string()),
        ]);
        assert_eq!(map.lookup("iphone 15 pro"), Some("Apple iPhone 15 Pro".to_string()));
    }
}
