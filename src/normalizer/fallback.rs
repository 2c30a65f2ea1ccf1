//! Level 2: fallback candidate generation via category/brand keyword tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Category keyword set, plus a compatibility map consulted by the
/// Validation Gate (`phone` accepts `smartphone`, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryKeywords {
    /// keyword -> canonical category tag
    keywords: BTreeMap<String, String>,
    /// canonical category tag -> set of tags it is compatible with
    compatible: BTreeMap<String, Vec<String>>,
}

impl Default for CategoryKeywords {
    fn default() -> Self {
        let mut keywords = BTreeMap::new();
        for (kw, tag) in [
            ("phone", "phone"),
            ("smartphone", "phone"),
            ("galaxy", "phone"),
            ("iphone", "phone"),
            ("laptop", "laptop"),
            ("notebook", "laptop"),
            ("macbook", "laptop"),
            ("tablet", "tablet"),
            ("ipad", "tablet"),
            ("watch", "watch"),
            ("earbuds", "audio"),
            ("headphone", "audio"),
        ] {
            keywords.insert(kw.to_string(), tag.to_string());
        }

        let mut compatible = BTreeMap::new();
        compatible.insert("phone".to_string(), vec!["smartphone".to_string()]);
        compatible.insert("laptop".to_string(), vec!["notebook".to_string(), "macbook".to_string()]);

        Self { keywords, compatible }
    }
}

impl CategoryKeywords {
    /// First keyword from the table that appears in `q`, in table iteration
    /// order (deterministic because the table is a `BTreeMap`).
    pub fn first_match(&self, q: &str) -> Option<String> {
        self.keywords
            .iter()
            .find(|(kw, _)| q.contains(kw.as_str()))
            .map(|(_, tag)| tag.clone())
    }

    /// Whether category `a` and `b` are compatible per the static map. An
    /// undetected category (`None`) on either side is always compatible.
    pub fn compatible(&self, a: Option<&str>, b: Option<&str>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => {
                a == b
                    || self.compatible.get(a).is_some_and(|v| v.iter().any(|x| x == b))
                    || self.compatible.get(b).is_some_and(|v| v.iter().any(|x| x == a))
            }
            _ => true,
        }
    }
}

/// Small brand lexicon used both to pick off a brand token for Level 2 and
/// to gate a hard-mapped canonical (it must contain a brand token).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandLexicon {
    brands: Vec<String>,
}

impl Default for BrandLexicon {
    fn default() -> Self {
        Self {
            brands: [
                "samsung", "apple", "lg", "xiaomi", "sony", "google", "huawei", "oneplus", "galaxy", "iphone",
                "macbook", "ipad",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl BrandLexicon {
    pub fn contains(&self, s: &str) -> bool {
        let lowered = s.to_lowercase();
        self.brands.iter().any(|b| lowered.contains(b.as_str()))
    }

    pub fn first_match(&self, q: &str) -> Option<String> {
        self.brands.iter().find(|b| q.contains(b.as_str())).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_keyword_first_match() {
        let categories = CategoryKeywords::default();
        assert_eq!(categories.first_match("samsung galaxy s24"), Some("phone".to_string()));
    }

    #[test]
    fn category_compatibility_is_symmetric() {
        let categories = CategoryKeywords::default();
        assert!(categories.compatible(Some("phone"), Some("smartphone")));
        assert!(categories.compatible(Some("smartphone"), Some("phone")));
        assert!(!categories.compatible(Some("phone"), Some("laptop")));
    }

    #[test]
    fn undetected_category_is_compatible() {
        let categories = CategoryKeywords::default();
        assert!(categories.compatible(None, Some("phone")));
    }

    #[test]
    fn brand_lexicon_detects_known_brand() {
        let brands = BrandLexicon::default();
        assert!(brands.contains("Samsung Galaxy S24 Ultra"));
        assert_eq!(brands.first_match("samsung galaxy s24"), Some("samsung".to_string()));
    }
}
