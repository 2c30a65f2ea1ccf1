//! Three-level query rewrite: hard-map exact match, synonym expansion, and
//! meaning-reducing fallback candidates.
//!
//! Mirrors the teacher's `link_index` layered-lookup shape (exact table hit
//! before falling back to fuzzier matching) but rebuilt around product-name
//! normalization instead of URL canonicalization.

mod fallback;
mod hard_map;
mod synonyms;
mod unicode;

pub use fallback::{BrandLexicon, CategoryKeywords};
pub use hard_map::HardMapping;
pub use synonyms::{AccessoryTokens, SynonymRules};

use serde::{Deserialize, Serialize};

/// Grade tokens that a hard-map or synonym rewrite must never drop: losing
/// one changes which product the query refers to.
const GRADE_TOKENS: &[&str] = &["pro", "max", "ultra", "fe", "plus"];

/// Result of running a raw query through the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// The single best candidate to try first.
    pub primary: String,
    /// Level 0/1 candidates, in priority order (includes `primary`). Accepted
    /// unconditionally: the Validation Gate does not run against these.
    pub candidates: Vec<String>,
    /// Level 2 fallback candidates (`[brand+model, model, brand,
    /// category_tag]`), only to be tried if every `candidates` entry fails to
    /// produce a search result. Each one is a meaning-reduction and must pass
    /// the Validation Gate before its search result is accepted.
    pub fallback_candidates: Vec<String>,
    /// True if Level 0 (hard map) produced this result.
    pub is_hard_mapped: bool,
}

/// The normalization function `N(s)`: lowercase, collapse whitespace, insert
/// a boundary at Hangul/Latin transitions, and strip everything that isn't
/// alphanumeric, Hangul, hyphen, underscore, or space.
pub fn normalize_string(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let spaced = unicode::insert_script_boundaries(&lowered);
    let filtered: String = spaced
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c.is_whitespace() || unicode::is_hangul(c) {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&filtered)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn grade_tokens_in(s: &str) -> Vec<&str> {
    let mut found: Vec<&str> = GRADE_TOKENS.iter().copied().filter(|t| s.contains(t)).collect();
    found.extend(digit_sequences(s));
    found
}

fn digit_sequences(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            out.push(&s[start..i]);
        } else {
            i += 1;
        }
    }
    out
}

fn preserves_grade_tokens(original: &str, candidate: &str) -> bool {
    grade_tokens_in(original).iter().all(|t| candidate.contains(t))
}

/// Normalizer: holds the static resource tables and runs the three levels.
pub struct Normalizer<'a> {
    hard_map: &'a HardMapping,
    synonyms: &'a SynonymRules,
    accessory_tokens: &'a AccessoryTokens,
    category_keywords: &'a CategoryKeywords,
    brand_lexicon: &'a BrandLexicon,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        hard_map: &'a HardMapping,
        synonyms: &'a SynonymRules,
        accessory_tokens: &'a AccessoryTokens,
        category_keywords: &'a CategoryKeywords,
        brand_lexicon: &'a BrandLexicon,
    ) -> Self {
        Self {
            hard_map,
            synonyms,
            accessory_tokens,
            category_keywords,
            brand_lexicon,
        }
    }

    /// Run Level 0, then Level 1, and always prepare the Level 2 fallback
    /// candidates too (they're cheap, pure, and the orchestrator is the one
    /// that decides whether Levels 0/1 "yielded no success" — normalization
    /// alone can't know that).
    pub fn normalize(&self, raw: &str) -> NormalizedQuery {
        if let Some(hit) = self.level0(raw) {
            return hit;
        }
        let level1 = self.level1(raw);
        let fallback_candidates = self.level2(raw);
        NormalizedQuery {
            primary: level1.primary,
            candidates: level1.candidates,
            fallback_candidates,
            is_hard_mapped: false,
        }
    }

    fn level0(&self, raw: &str) -> Option<NormalizedQuery> {
        if self.accessory_tokens.contains_any(raw) {
            return None;
        }
        let q = normalize_string(raw);
        let canonical = self.hard_map.lookup(&q)?;
        if !self.brand_lexicon.contains(&canonical) {
            return None;
        }
        if !preserves_grade_tokens(&q, &canonical) {
            return None;
        }
        Some(NormalizedQuery {
            primary: canonical.clone(),
            candidates: vec![canonical],
            fallback_candidates: Vec::new(),
            is_hard_mapped: true,
        })
    }

    fn level1(&self, raw: &str) -> NormalizedQuery {
        let q = normalize_string(raw);
        let stripped = self.synonyms.strip_color_and_condition(&q);
        let hangul = self.synonyms.transliterate_hangul(&stripped);
        let latin = self.synonyms.transliterate_latin(&stripped);

        let mut candidates = Vec::new();
        for candidate in [q.clone(), stripped, hangul, latin] {
            if candidate.is_empty() || candidates.contains(&candidate) {
                continue;
            }
            if !preserves_grade_tokens(&q, &candidate) {
                continue;
            }
            candidates.push(candidate);
        }

        let primary = candidates.first().cloned().unwrap_or_else(|| q.clone());
        NormalizedQuery {
            primary,
            candidates,
            fallback_candidates: Vec::new(),
            is_hard_mapped: false,
        }
    }

    /// `[brand+model, model, brand, category_tag]`, de-duplicated. Each one
    /// is a meaning-reduction of `raw` and must pass the Validation Gate.
    fn level2(&self, raw: &str) -> Vec<String> {
        let q = normalize_string(raw);
        let category = self.category_keywords.first_match(&q);
        let brand = self.brand_lexicon.first_match(&q);
        let model = residual_model(&q, brand.as_deref(), category.as_deref());

        let mut candidates = Vec::new();
        if let (Some(b), Some(m)) = (&brand, &model)
            && !m.is_empty()
        {
            candidates.push(format!("{b} {m}"));
        }
        if let Some(m) = &model
            && !m.is_empty()
        {
            candidates.push(m.clone());
        }
        if let Some(b) = &brand {
            candidates.push(b.clone());
        }
        if let Some(c) = &category {
            candidates.push(c.clone());
        }
        candidates.dedup();
        if candidates.is_empty() {
            candidates.push(q.clone());
        }
        candidates
    }
}

fn residual_model(q: &str, brand: Option<&str>, category: Option<&str>) -> Option<String> {
    let mut residual = q.to_string();
    if let Some(b) = brand {
        residual = residual.replace(b, "");
    }
    if let Some(c) = category {
        residual = residual.replace(c, "");
    }
    let residual = collapse_whitespace(&residual);
    if residual.is_empty() {
        None
    } else {
        Some(residual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_string_lowercases_and_collapses() {
        assert_eq!(normalize_string("  Galaxy   S24  Ultra  "), "galaxy s24 ultra");
    }

    #[test]
    fn normalize_string_strips_punctuation() {
        assert_eq!(normalize_string("iPhone 15 Pro!!"), "iphone 15 pro");
    }

    #[test]
    fn normalize_string_inserts_script_boundary() {
        let out = normalize_string("갤럭시S24");
        assert!(out.contains("갤럭시 s24") || out.contains("갤럭시s24"));
    }

    #[test]
    fn level2_always_returns_something() {
        let hard_map = HardMapping::default();
        let synonyms = SynonymRules::default();
        let accessories = AccessoryTokens::default();
        let categories = CategoryKeywords::default();
        let brands = BrandLexicon::default();
        let normalizer = Normalizer::new(&hard_map, &synonyms, &accessories, &categories, &brands);
        let result = normalizer.normalize("some totally unknown gadget 9000");
        assert!(!result.primary.is_empty());
        assert!(!result.candidates.is_empty());
        assert!(!result.fallback_candidates.is_empty());
    }

    #[test]
    fn fallback_candidates_are_gated_meaning_reductions() {
        let hard_map = HardMapping::default();
        let synonyms = SynonymRules::default();
        let accessories = AccessoryTokens::default();
        let categories = CategoryKeywords::default();
        let brands = BrandLexicon::default();
        let normalizer = Normalizer::new(&hard_map, &synonyms, &accessories, &categories, &brands);
        let result = normalizer.normalize("samsung galaxy s24 ultra");
        assert!(!result.is_hard_mapped);
        assert!(!result.candidates.is_empty());
        assert_eq!(result.fallback_candidates[0], "samsung galaxy s24 ultra");
    }

    #[test]
    fn grade_token_loss_is_detected() {
        assert!(!preserves_grade_tokens("iphone 15 pro", "iphone 15"));
        assert!(preserves_grade_tokens("iphone 15 pro", "iphone 15 pro max"));
    }
}
