//! Per-deployment tuning tables: the tag vocabulary, the word lists behind
//! the hard filters, and the quality point values. Each can be set at the top
//! of `sources.yaml` and replaced per source; anything left out keeps the
//! shipped defaults.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::sources::PriceBand;

// ---------------------------------------------------------------------------
// Keyword vocabulary
// ---------------------------------------------------------------------------

/// Maps a lowercase keyword to the tag it produces. Matching is plain
/// substring containment, so `"dresses"` also earns the `dress` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct KeywordTable {
    entries: BTreeMap<String, String>,
}

impl KeywordTable {
    /// Builds a table from `(keyword, tag)` pairs. Both sides are lowercased
    /// and trimmed; empty keywords and tags are dropped.
    pub fn from_pairs<I, K, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: AsRef<str>,
    {
        let entries = pairs
            .into_iter()
            .filter_map(|(k, t)| {
                let keyword = k.as_ref().trim().to_lowercase();
                let tag = t.as_ref().trim().to_lowercase();
                (!keyword.is_empty() && !tag.is_empty()).then_some((keyword, tag))
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tags whose keyword appears anywhere in `text` (case-insensitive).
    #[must_use]
    pub fn tags_for(&self, text: &str) -> BTreeSet<String> {
        let haystack = text.to_lowercase();
        self.entries
            .iter()
            .filter(|(keyword, _)| haystack.contains(keyword.as_str()))
            .map(|(_, tag)| tag.clone())
            .collect()
    }
}

impl From<BTreeMap<String, String>> for KeywordTable {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::from_pairs(map)
    }
}

impl From<KeywordTable> for BTreeMap<String, String> {
    fn from(table: KeywordTable) -> Self {
        table.entries
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::from_pairs([
            ("dress", "dress"),
            ("skirt", "skirt"),
            ("blouse", "top"),
            ("shirt", "shirt"),
            ("tee", "tshirt"),
            ("t-shirt", "tshirt"),
            ("sweater", "knitwear"),
            ("cardigan", "knitwear"),
            ("jacket", "outerwear"),
            ("coat", "outerwear"),
            ("jeans", "denim"),
            ("denim", "denim"),
            ("trouser", "pants"),
            ("pants", "pants"),
            ("legging", "activewear"),
            ("sports bra", "activewear"),
            ("sneaker", "shoes"),
            ("boot", "shoes"),
            ("sandal", "shoes"),
            ("handbag", "bags"),
            ("tote", "bags"),
            ("linen", "linen"),
            ("silk", "silk"),
            ("cashmere", "cashmere"),
            ("wool", "wool"),
            ("cotton", "cotton"),
            ("navy", "navy"),
            ("black", "black"),
            ("floral", "floral"),
            ("midi", "midi"),
            ("maxi", "maxi"),
        ])
    }
}

// ---------------------------------------------------------------------------
// Hard filter word lists
// ---------------------------------------------------------------------------

/// Word lists for the hard filters that run before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Title phrases marking multi-item lots (substring match).
    pub bundle_keywords: Vec<String>,
    /// Words that mark a listing as men's (whole-word match).
    pub mens_keywords: Vec<String>,
    /// Words that mark a listing as women's (whole-word match).
    pub womens_keywords: Vec<String>,
    /// Phrases that cancel a gender match (substring match).
    pub unisex_phrases: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| (*w).to_string()).collect();
        Self {
            bundle_keywords: owned(&[
                "mystery box",
                "bundle",
                "lot of",
                "wholesale lot",
                "set of",
                "assorted",
                "grab bag",
            ]),
            mens_keywords: owned(&["men", "mens", "men's", "male", "boys", "gentlemen"]),
            womens_keywords: owned(&[
                "women", "womens", "women's", "woman", "ladies", "female", "girls",
            ]),
            unisex_phrases: owned(&["unisex", "gender neutral", "all genders"]),
        }
    }
}

// ---------------------------------------------------------------------------
// Quality point values
// ---------------------------------------------------------------------------

/// Point values and thresholds for the quality scorer.
///
/// `reasonable_price` is not read from configuration: it always comes from
/// the source's own `reasonable_price` band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringTable {
    pub description_present: u32,
    pub description_long: u32,
    pub description_long_chars: usize,
    pub description_rich: u32,
    pub description_rich_chars: usize,
    pub price_present: u32,
    pub price_reasonable: u32,
    #[serde(skip)]
    pub reasonable_price: PriceBand,
    pub known_brand: u32,
    pub image_present: u32,
    pub rating_high: u32,
    pub rating_threshold: f64,
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self {
            description_present: 1,
            description_long: 1,
            description_long_chars: 50,
            description_rich: 1,
            description_rich_chars: 150,
            price_present: 1,
            price_reasonable: 1,
            reasonable_price: PriceBand::new(Decimal::new(15, 0), Decimal::new(500, 0)),
            known_brand: 1,
            image_present: 1,
            rating_high: 1,
            rating_threshold: 3.5,
        }
    }
}

impl ScoringTable {
    /// Default point values with a source-specific reasonable price band.
    #[must_use]
    pub fn with_reasonable_price(band: PriceBand) -> Self {
        Self::default().for_band(band)
    }

    /// This table with `band` as the reasonable price range.
    #[must_use]
    pub fn for_band(self, band: PriceBand) -> Self {
        Self {
            reasonable_price: band,
            ..self
        }
    }

    /// Highest score any listing can reach under this table.
    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.description_present
            + self.description_long
            + self.description_rich
            + self.price_present
            + self.price_reasonable
            + self.known_brand
            + self.image_present
            + self.rating_high
    }
}

// ---------------------------------------------------------------------------
// Resolved set
// ---------------------------------------------------------------------------

/// The three tables in effect for one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tuning {
    pub keywords: KeywordTable,
    pub filter_rules: FilterRules,
    pub scoring: ScoringTable,
}
