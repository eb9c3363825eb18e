//! The storage-free half of per-item processing: normalize, filter, score,
//! apply the admission floor, fingerprint.

use affdb_core::{
    KeywordTable, NormalizedProduct, ScoringTable, SourceConfig, SourceNetwork, Tuning,
};

use crate::filter::{FilterError, HardFilters};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::normalize::{normalize, RawItem};
use crate::quality::score;
use crate::summary::SkipReason;

/// An item that survived every storage-free stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub product: NormalizedProduct,
    pub quality_score: u32,
    pub fingerprint: Fingerprint,
}

/// Per-source processing configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub keywords: KeywordTable,
    pub filters: HardFilters,
    pub scoring: ScoringTable,
    pub min_quality_score: u32,
}

impl Pipeline {
    /// Builds the pipeline for `source` from the tables in `tuning`, using
    /// the source's own admission floor when set and `default_min_quality`
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the gender keywords do not compile.
    pub fn for_source(
        source: &SourceConfig,
        tuning: Tuning,
        default_min_quality: u32,
    ) -> Result<Self, FilterError> {
        let Tuning {
            keywords,
            filter_rules,
            scoring,
        } = tuning;
        Ok(Self {
            keywords,
            filters: HardFilters::new(&filter_rules, source.audience, source.price_window)?,
            scoring: scoring.for_band(source.reasonable_price),
            min_quality_score: source.min_quality_score.unwrap_or(default_min_quality),
        })
    }

    /// Runs one raw record through normalization, hard filters, scoring and
    /// the admission floor.
    ///
    /// # Errors
    ///
    /// Returns the [`SkipReason`] of the first stage that dropped the item.
    pub fn evaluate(&self, raw: &RawItem, network: SourceNetwork) -> Result<Candidate, SkipReason> {
        let product = normalize(raw, network, &self.keywords).map_err(|rejection| {
            tracing::debug!(network = %network, reason = %rejection, "record rejected");
            rejection.skip_reason()
        })?;

        if let Some(reason) = self.filters.check(&product) {
            tracing::debug!(
                product_url = %product.product_url,
                reason = %reason,
                "product filtered"
            );
            return Err(reason);
        }

        let quality_score = score(&product, &self.scoring);
        if quality_score < self.min_quality_score {
            tracing::debug!(
                product_url = %product.product_url,
                quality_score,
                min_quality_score = self.min_quality_score,
                "below admission floor"
            );
            return Err(SkipReason::LowQuality);
        }

        let fingerprint = fingerprint(&product);
        Ok(Candidate {
            product,
            quality_score,
            fingerprint,
        })
    }
}
