//! Level 1: synonym expansion. Never contracts meaning — only strips
//! color/condition noise and offers transliterated spellings.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Tokens that make Level 0 unsafe to attempt (the raw input names an
/// accessory, not the device itself).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryTokens {
    tokens: BTreeSet<String>,
}

impl Default for AccessoryTokens {
    fn default() -> Self {
        Self {
            tokens: ["case", "cover", "film", "stand", "bundle", "holder", "strap"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl AccessoryTokens {
    pub fn contains_any(&self, raw: &str) -> bool {
        let lowered = raw.to_lowercase();
        self.tokens.iter().any(|t| lowered.contains(t.as_str()))
    }
}

/// Color names, purchase-condition tokens, and Hangul/Latin transliteration
/// pairs used to expand a normalized query into synonym candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynonymRules {
    strip_tokens: BTreeSet<String>,
    hangul_to_latin: BTreeMap<String, String>,
    latin_to_hangul: BTreeMap<String, String>,
}

impl Default for SynonymRules {
    fn default() -> Self {
        Self {
            strip_tokens: ["화이트", "블랙", "자급제", "white", "black", "unlocked"]
                .into_iter()
                .map(String::from)
                .collect(),
            hangul_to_latin: BTreeMap::new(),
            latin_to_hangul: BTreeMap::new(),
        }
    }
}

impl SynonymRules {
    pub fn strip_color_and_condition(&self, q: &str) -> String {
        let mut out = q.to_string();
        for tok in &self.strip_tokens {
            out = out.replace(tok.as_str(), " ");
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Replace every token that has a known Hangul spelling with that
    /// spelling, producing a Hangul-leaning candidate.
    pub fn transliterate_hangul(&self, q: &str) -> String {
        self.transliterate(q, &self.latin_to_hangul)
    }

    /// Replace every token that has a known Latin spelling with that
    /// spelling, producing a Latin-leaning candidate.
    pub fn transliterate_latin(&self, q: &str) -> String {
        self.transliterate(q, &self.hangul_to_latin)
    }

    fn transliterate(&self, q: &str, table: &BTreeMap<String, String>) -> String {
        let tokens: Vec<String> = q
            .split_whitespace()
            .map(|tok| table.get(tok).cloned().unwrap_or_else(|| tok.to_string()))
            .collect();
        tokens.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_and_condition_tokens() {
        let rules = SynonymRules::default();
        assert_eq!(rules.strip_color_and_condition("galaxy s24 화이트 자급제"), "galaxy s24");
    }

    #[test]
    fn accessory_guard_detects_accessory_tokens() {
        let accessories = AccessoryTokens::default();
        assert!(accessories.contains_any("Galaxy S24 Ultra case"));
        assert!(!accessories.contains_any("Galaxy S24 Ultra"));
    }
}
