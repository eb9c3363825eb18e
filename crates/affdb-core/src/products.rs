use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Brand value used when a feed does not name a manufacturer.
pub const UNKNOWN_BRAND: &str = "Unknown";

/// Currency assumed when a feed gives no currency signal at all.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Affiliate integration that produced a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceNetwork {
    /// Feeds that already use plain field names (`title`, `price`, `url`, ...).
    Generic,
    Awin,
    Cj,
    Rakuten,
    Impact,
}

impl SourceNetwork {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceNetwork::Generic => "generic",
            SourceNetwork::Awin => "awin",
            SourceNetwork::Cj => "cj",
            SourceNetwork::Rakuten => "rakuten",
            SourceNetwork::Impact => "impact",
        }
    }
}

impl std::fmt::Display for SourceNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceNetwork {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(SourceNetwork::Generic),
            "awin" => Ok(SourceNetwork::Awin),
            "cj" => Ok(SourceNetwork::Cj),
            "rakuten" => Ok(SourceNetwork::Rakuten),
            "impact" => Ok(SourceNetwork::Impact),
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }
}

/// A listing mapped from a source-specific record into the canonical shape
/// every downstream stage operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub title: String,
    /// Falls back to the title when the feed sends nothing useful.
    pub description: String,
    /// [`UNKNOWN_BRAND`] when the feed does not name one.
    pub brand: String,
    /// Always positive when present.
    pub price: Option<Decimal>,
    /// ISO 4217 code, e.g. `"USD"`.
    pub currency: String,
    pub image_url: Option<String>,
    /// Absolute URL; natural key for storage upserts.
    pub product_url: String,
    /// Lowercase keyword tags, deduplicated.
    pub tags: BTreeSet<String>,
    pub source_network: SourceNetwork,
    /// Opaque per-network identifier.
    pub source_id: String,
    pub category: Option<String>,
    /// Average review rating, when the network exposes one.
    pub rating: Option<f64>,
}

impl NormalizedProduct {
    /// Returns `true` when the brand is set to something other than the
    /// [`UNKNOWN_BRAND`] sentinel.
    #[must_use]
    pub fn has_known_brand(&self) -> bool {
        has_known_brand(&self.brand)
    }
}

/// The slice of a stored product needed to re-score it and break price ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProductSummary {
    pub id: i64,
    pub product_url: String,
    pub description: String,
    pub price: Option<Decimal>,
    pub brand: String,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
}

impl StoredProductSummary {
    #[must_use]
    pub fn has_known_brand(&self) -> bool {
        has_known_brand(&self.brand)
    }
}

fn has_known_brand(brand: &str) -> bool {
    let trimmed = brand.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(UNKNOWN_BRAND)
}
