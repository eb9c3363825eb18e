//! Duplicate-detection key: `coreTitle|normalizedBrand|priceBucket`.

use affdb_core::NormalizedProduct;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

const NO_PRICE: &str = "no-price";

/// Tokens that vary between listings of the same item and are dropped from
/// the core title.
const GENDER_TOKENS: &[&str] = &[
    "women", "womens", "woman", "ladies", "men", "mens", "man", "unisex", "girls", "boys",
];
const SIZE_TOKENS: &[&str] = &[
    "xxs", "xs", "s", "m", "l", "xl", "xxl", "xxxl", "small", "medium", "large", "petite",
    "plus", "tall", "regular", "size",
];
const COLOR_TOKENS: &[&str] = &[
    "black", "white", "grey", "gray", "red", "blue", "navy", "green", "olive", "yellow", "pink",
    "purple", "orange", "brown", "beige", "tan", "cream", "ivory", "khaki", "burgundy",
];
const GARMENT_NOISE: &[&str] = &["clothing", "apparel", "wear"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps a key read back from storage.
    #[must_use]
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

/// Derives the fingerprint of `product`. Pure: the same fields always give
/// the same key.
#[must_use]
pub fn fingerprint(product: &NormalizedProduct) -> Fingerprint {
    let core_title = core_title(&product.title);
    let brand = squash(&product.brand).join(" ");
    let bucket = product.price.map_or_else(|| NO_PRICE.to_string(), price_bucket);
    Fingerprint(format!("{core_title}|{brand}|{bucket}"))
}

/// Title without gender, size, color and garment-noise tokens. Falls back to
/// the full squashed title if stripping would leave nothing.
fn core_title(title: &str) -> String {
    let words = squash(title);
    let kept: Vec<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|w| !is_noise(w))
        .collect();
    if kept.is_empty() {
        words.join(" ")
    } else {
        kept.join(" ")
    }
}

fn is_noise(word: &str) -> bool {
    GENDER_TOKENS.contains(&word)
        || SIZE_TOKENS.contains(&word)
        || COLOR_TOKENS.contains(&word)
        || GARMENT_NOISE.contains(&word)
}

/// Lowercases, deletes punctuation, and splits on whitespace.
fn squash(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Nearest multiple of 5, midpoints rounded away from zero.
fn price_bucket(price: Decimal) -> String {
    let width = Decimal::new(5, 0);
    let bucket = (price / width)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        * width;
    bucket.normalize().to_string()
}
