//! Additive listing-completeness score.

use affdb_core::{NormalizedProduct, ScoringTable, StoredProductSummary};
use rust_decimal::Decimal;

/// The attributes the scorer reads. Implemented for incoming products and
/// for stored rows so both sides of a conflict are scored identically.
pub trait QualitySignals {
    fn description(&self) -> &str;
    fn price(&self) -> Option<Decimal>;
    fn has_known_brand(&self) -> bool;
    fn has_image(&self) -> bool;
    fn rating(&self) -> Option<f64>;
}

impl QualitySignals for NormalizedProduct {
    fn description(&self) -> &str {
        &self.description
    }
    fn price(&self) -> Option<Decimal> {
        self.price
    }
    fn has_known_brand(&self) -> bool {
        NormalizedProduct::has_known_brand(self)
    }
    fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
    fn rating(&self) -> Option<f64> {
        self.rating
    }
}

impl QualitySignals for StoredProductSummary {
    fn description(&self) -> &str {
        &self.description
    }
    fn price(&self) -> Option<Decimal> {
        self.price
    }
    fn has_known_brand(&self) -> bool {
        StoredProductSummary::has_known_brand(self)
    }
    fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
    fn rating(&self) -> Option<f64> {
        self.rating
    }
}

/// Scores `listing` in `0..=table.max_score()`.
///
/// Description length is counted in characters, after trimming.
#[must_use]
pub fn score<L: QualitySignals + ?Sized>(listing: &L, table: &ScoringTable) -> u32 {
    let mut total = 0;

    let description_chars = listing.description().trim().chars().count();
    if description_chars > 0 {
        total += table.description_present;
    }
    if description_chars > table.description_long_chars {
        total += table.description_long;
    }
    if description_chars > table.description_rich_chars {
        total += table.description_rich;
    }

    if let Some(price) = listing.price().filter(|p| *p > Decimal::ZERO) {
        total += table.price_present;
        if table.reasonable_price.contains(price) {
            total += table.price_reasonable;
        }
    }

    if listing.has_known_brand() {
        total += table.known_brand;
    }
    if listing.has_image() {
        total += table.image_present;
    }
    if listing
        .rating()
        .is_some_and(|r| r >= table.rating_threshold)
    {
        total += table.rating_high;
    }

    total
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use affdb_core::{PriceBand, SourceNetwork, UNKNOWN_BRAND};

    use super::*;

    fn bare() -> NormalizedProduct {
        NormalizedProduct {
            title: "Tee".to_string(),
            description: String::new(),
            brand: UNKNOWN_BRAND.to_string(),
            price: None,
            currency: "USD".to_string(),
            image_url: None,
            product_url: "https://shop.example.com/tee".to_string(),
            tags: BTreeSet::new(),
            source_network: SourceNetwork::Generic,
            source_id: "tee".to_string(),
            category: None,
            rating: None,
        }
    }

    fn complete() -> NormalizedProduct {
        NormalizedProduct {
            description: "x".repeat(151),
            brand: "Everlane".to_string(),
            price: Some(Decimal::new(40, 0)),
            image_url: Some("https://cdn.example.com/tee.jpg".to_string()),
            rating: Some(4.5),
            ..bare()
        }
    }

    #[test]
    fn default_max_is_eight() {
        let table = ScoringTable::default();
        assert_eq!(table.max_score(), 8);
        assert_eq!(score(&bare(), &table), 0);
        assert_eq!(score(&complete(), &table), 8);
    }

    #[test]
    fn description_thresholds_are_cumulative() {
        let table = ScoringTable::default();
        let mut p = bare();
        p.description = "x".repeat(50);
        assert_eq!(score(&p, &table), 1);
        p.description = "x".repeat(51);
        assert_eq!(score(&p, &table), 2);
        p.description = "x".repeat(151);
        assert_eq!(score(&p, &table), 3);
    }

    #[test]
    fn price_outside_reasonable_band_earns_one_point() {
        let table = ScoringTable::default();
        let mut p = bare();
        p.price = Some(Decimal::new(9, 0));
        assert_eq!(score(&p, &table), 1);
        p.price = Some(Decimal::new(15, 0));
        assert_eq!(score(&p, &table), 2);
    }

    #[test]
    fn source_band_changes_reasonable_point() {
        let activewear = ScoringTable::with_reasonable_price(PriceBand::new(
            Decimal::new(20, 0),
            Decimal::new(2000, 0),
        ));
        let mut p = bare();
        p.price = Some(Decimal::new(1200, 0));
        assert_eq!(score(&p, &activewear), 2);
        assert_eq!(score(&p, &ScoringTable::default()), 1);
    }

    #[test]
    fn rating_threshold_is_inclusive() {
        let table = ScoringTable::default();
        let mut p = bare();
        p.rating = Some(3.4);
        assert_eq!(score(&p, &table), 0);
        p.rating = Some(3.5);
        assert_eq!(score(&p, &table), 1);
    }

    #[test]
    fn adding_any_single_field_never_lowers_score() {
        let table = ScoringTable::default();
        let full = complete();
        let additions: [fn(&mut NormalizedProduct, &NormalizedProduct); 5] = [
            |p, f| p.description.clone_from(&f.description),
            |p, f| p.price = f.price,
            |p, f| p.brand.clone_from(&f.brand),
            |p, f| p.image_url.clone_from(&f.image_url),
            |p, f| p.rating = f.rating,
        ];

        for (i, add) in additions.iter().enumerate() {
            let mut p = bare();
            for earlier in &additions[..i] {
                earlier(&mut p, &full);
            }
            let before = score(&p, &table);
            add(&mut p, &full);
            assert!(score(&p, &table) >= before, "addition {i} lowered the score");
        }
    }

    #[test]
    fn stored_summary_scores_like_product() {
        let table = ScoringTable::default();
        let p = complete();
        let stored = StoredProductSummary {
            id: 1,
            product_url: p.product_url.clone(),
            description: p.description.clone(),
            price: p.price,
            brand: p.brand.clone(),
            image_url: p.image_url.clone(),
            rating: p.rating,
        };
        assert_eq!(score(&stored, &table), score(&p, &table));
    }

    #[test]
    fn configured_point_values_change_the_score() {
        let table = ScoringTable {
            image_present: 3,
            rating_threshold: 4.8,
            ..ScoringTable::default()
        };
        let p = complete();
        assert_eq!(table.max_score(), 10);
        // image now worth 3; rating 4.5 no longer clears the threshold
        assert_eq!(score(&p, &table), 9);
        assert_eq!(score(&p, &ScoringTable::default()), 8);
    }
}
