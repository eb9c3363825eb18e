//! Hard filters applied after normalization and before scoring.
//!
//! Order matters only for which reason gets reported: bundles, then wrong
//! gender, then the absolute price window.

use affdb_core::{Audience, FilterRules, NormalizedProduct, PriceBand};
use regex::Regex;
use thiserror::Error;

use crate::summary::SkipReason;

#[derive(Debug, Error)]
#[error("invalid filter keyword pattern: {0}")]
pub struct FilterError(#[from] regex::Error);

/// Compiled filters for one source.
#[derive(Debug, Clone)]
pub struct HardFilters {
    bundle_keywords: Vec<String>,
    unisex_phrases: Vec<String>,
    /// Whole-word matcher for the opposite audience; `None` for [`Audience::Any`].
    wrong_gender: Option<Regex>,
    price_window: PriceBand,
}

impl HardFilters {
    /// # Errors
    ///
    /// Returns [`FilterError`] if the gender keywords cannot be compiled into
    /// a word-boundary pattern.
    pub fn new(
        rules: &FilterRules,
        audience: Audience,
        price_window: PriceBand,
    ) -> Result<Self, FilterError> {
        let opposite = match audience {
            Audience::Any => None,
            Audience::Women => Some(&rules.mens_keywords),
            Audience::Men => Some(&rules.womens_keywords),
        };
        let wrong_gender = opposite
            .filter(|words| !words.is_empty())
            .map(|words| word_pattern(words))
            .transpose()?;

        Ok(Self {
            bundle_keywords: lowered(&rules.bundle_keywords),
            unisex_phrases: lowered(&rules.unisex_phrases),
            wrong_gender,
            price_window,
        })
    }

    /// Returns the reason the product must be dropped, or `None` if it passes.
    #[must_use]
    pub fn check(&self, product: &NormalizedProduct) -> Option<SkipReason> {
        let title = product.title.to_lowercase();

        if self.bundle_keywords.iter().any(|k| title.contains(k.as_str())) {
            return Some(SkipReason::Bundles);
        }

        if let Some(pattern) = &self.wrong_gender {
            let haystack = format!(
                "{title} {}",
                product.category.as_deref().unwrap_or_default().to_lowercase()
            );
            let unisex = self
                .unisex_phrases
                .iter()
                .any(|p| haystack.contains(p.as_str()));
            if !unisex && pattern.is_match(&haystack) {
                return Some(SkipReason::WrongGender);
            }
        }

        match product.price {
            Some(price) if !self.price_window.contains(price) => Some(SkipReason::PriceWindow),
            _ => None,
        }
    }
}

fn lowered(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn word_pattern(words: &[String]) -> Result<Regex, FilterError> {
    let alternatives: Vec<String> = lowered(words).iter().map(|w| regex::escape(w)).collect();
    Ok(Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|")))?)
}
