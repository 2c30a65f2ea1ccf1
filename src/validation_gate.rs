//! Post-hoc plausibility check run behind Level-2 (meaning-reducing)
//! normalizer candidates, per the validation gate contract.

use std::collections::HashSet;

use crate::model::SuccessPayload;
use crate::normalizer::{BrandLexicon, CategoryKeywords};

/// Minimum Jaccard similarity of whitespace tokens between the raw input
/// and the returned product name.
const MIN_JACCARD: f64 = 0.30;

pub struct ValidationGate<'a> {
    categories: &'a CategoryKeywords,
    brands: &'a BrandLexicon,
}

impl<'a> ValidationGate<'a> {
    pub fn new(categories: &'a CategoryKeywords, brands: &'a BrandLexicon) -> Self {
        Self { categories, brands }
    }

    /// Accept a candidate result iff every condition in section 4.3 holds.
    pub fn accept(&self, raw_input: &str, payload: &SuccessPayload) -> bool {
        let raw_category = self.categories.first_match(&raw_input.to_lowercase());
        let result_category = self.categories.first_match(&payload.product_name.to_lowercase());
        if !self.categories.compatible(raw_category.as_deref(), result_category.as_deref()) {
            return false;
        }

        if jaccard_similarity(raw_input, &payload.product_name) < MIN_JACCARD {
            return false;
        }

        let raw_brand = self.brands.first_match(&raw_input.to_lowercase());
        let result_brand = self.brands.first_match(&payload.product_name.to_lowercase());
        if let (Some(a), Some(b)) = (&raw_brand, &result_brand)
            && a != b
        {
            return false;
        }

        if payload.lowest_price <= 0 {
            return false;
        }

        true
    }
}

fn tokenize(s: &str) -> HashSet<String> {
    s.to_lowercase().split_whitespace().map(String::from).collect()
}

fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a = tokenize(a);
    let b = tokenize(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Offer, Source};

    fn payload(product_name: &str, price: i64) -> SuccessPayload {
        SuccessPayload {
            product_id: Some("id".into()),
            product_name: product_name.to_string(),
            lowest_price: price,
            link: "https://example.com/x".into(),
            top_offers: vec![Offer {
                rank: 1,
                mall: "mall".into(),
                price,
                free_shipping: false,
                delivery: "".into(),
                link: "https://example.com/x".into(),
            }],
            mall: Some("mall".into()),
            free_shipping: Some(false),
            source: Source::Fastpath,
        }
    }

    #[test]
    fn accepts_close_match() {
        let categories = CategoryKeywords::default();
        let brands = BrandLexicon::default();
        let gate = ValidationGate::new(&categories, &brands);
        assert!(gate.accept("samsung galaxy s24 ultra", &payload("Samsung Galaxy S24 Ultra", 1_000_000)));
    }

    #[test]
    fn rejects_zero_price() {
        let categories = CategoryKeywords::default();
        let brands = BrandLexicon::default();
        let gate = ValidationGate::new(&categories, &brands);
        assert!(!gate.accept("samsung galaxy s24", &payload("Samsung Galaxy S24", 0)));
    }

    #[test]
    fn rejects_low_token_overlap() {
        let categories = CategoryKeywords::default();
        let brands = BrandLexicon::default();
        let gate = ValidationGate::new(&categories, &brands);
        assert!(!gate.accept("samsung galaxy s24 ultra", &payload("completely unrelated item here", 1000)));
    }

    #[test]
    fn rejects_brand_mismatch() {
        let categories = CategoryKeywords::default();
        let brands = BrandLexicon::default();
        let gate = ValidationGate::new(&categories, &brands);
        assert!(!gate.accept("apple iphone 15 pro", &payload("samsung iphone 15 pro", 1000)));
    }
}
