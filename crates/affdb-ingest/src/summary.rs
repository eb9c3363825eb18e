//! Per-run counters and the summary emitted when a run ends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Why an item was dropped without touching storage state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    MissingFields,
    InvalidImage,
    InvalidUrl,
    Bundles,
    WrongGender,
    PriceWindow,
    LowQuality,
    Duplicates,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::MissingFields => "missingFields",
            SkipReason::InvalidImage => "invalidImage",
            SkipReason::InvalidUrl => "invalidUrl",
            SkipReason::Bundles => "bundles",
            SkipReason::WrongGender => "wrongGender",
            SkipReason::PriceWindow => "priceWindow",
            SkipReason::LowQuality => "lowQuality",
            SkipReason::Duplicates => "duplicates",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the page loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// The source reported no further pages.
    Exhausted,
    MaxPages,
    MaxSynced,
    /// The request (credit) budget was spent.
    RequestBudget,
    /// A page fetch failed after retries.
    FetchFailed,
}

/// Mutable counters for one run against one source. Owned by the
/// orchestrator loop and turned into an [`IngestionSummary`] at the end.
#[derive(Debug, Clone, Default)]
pub struct IngestionState {
    /// Cursor for the next fetch; `None` means the first page.
    pub cursor: Option<String>,
    pub pages_fetched: u32,
    pub requests_used: u32,
    pub inserted: u64,
    pub replaced: u64,
    pub errors: u64,
    pub skip_reasons: BTreeMap<SkipReason, u64>,
}

impl IngestionState {
    #[must_use]
    pub fn starting_at(cursor: Option<String>) -> Self {
        Self {
            cursor,
            ..Self::default()
        }
    }

    /// Items written this run, inserts and replacements together.
    #[must_use]
    pub fn synced(&self) -> u64 {
        self.inserted + self.replaced
    }

    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skip_reasons.values().sum()
    }

    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skip_reasons.entry(reason).or_insert(0) += 1;
    }

    #[must_use]
    pub fn into_summary(
        self,
        source: &str,
        stop_reason: StopReason,
        fetch_error: Option<String>,
    ) -> IngestionSummary {
        IngestionSummary {
            source: source.to_string(),
            synced: self.synced(),
            inserted: self.inserted,
            replaced: self.replaced,
            errors: self.errors,
            skipped: self.skipped(),
            skip_reasons: self.skip_reasons,
            pages_fetched: self.pages_fetched,
            requests_used: self.requests_used,
            last_cursor: self.cursor,
            stop_reason,
            fetch_error,
        }
    }
}

/// Outcome of one run against one source. Emitted on every termination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    pub source: String,
    pub synced: u64,
    pub inserted: u64,
    pub replaced: u64,
    pub errors: u64,
    pub skipped: u64,
    pub skip_reasons: BTreeMap<SkipReason, u64>,
    pub pages_fetched: u32,
    pub requests_used: u32,
    /// Cursor to pass back in to resume where this run stopped.
    pub last_cursor: Option<String>,
    pub stop_reason: StopReason,
    pub fetch_error: Option<String>,
}

impl IngestionSummary {
    /// `true` when the source failed before a single page came back.
    #[must_use]
    pub fn failed_on_first_page(&self) -> bool {
        self.stop_reason == StopReason::FetchFailed && self.pages_fetched == 0
    }

    #[must_use]
    pub fn skipped_for(&self, reason: SkipReason) -> u64 {
        self.skip_reasons.get(&reason).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_and_totals() {
        let mut state = IngestionState::starting_at(Some("p2".to_string()));
        state.inserted = 3;
        state.replaced = 1;
        state.record_skip(SkipReason::Duplicates);
        state.record_skip(SkipReason::Duplicates);
        state.record_skip(SkipReason::Bundles);

        assert_eq!(state.synced(), 4);
        assert_eq!(state.skipped(), 3);

        let summary = state.into_summary("awin-apparel", StopReason::Exhausted, None);
        assert_eq!(summary.skipped_for(SkipReason::Duplicates), 2);
        assert_eq!(summary.skipped_for(SkipReason::LowQuality), 0);
        assert_eq!(summary.last_cursor.as_deref(), Some("p2"));
        assert!(!summary.failed_on_first_page());
    }

    #[test]
    fn summary_serializes_camel_case() {
        let mut state = IngestionState::default();
        state.record_skip(SkipReason::WrongGender);
        let summary = state.into_summary(
            "cj-shoes",
            StopReason::FetchFailed,
            Some("HTTP 500".to_string()),
        );
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["skipReasons"]["wrongGender"], 1);
        assert_eq!(json["stopReason"], "fetchFailed");
        assert_eq!(json["pagesFetched"], 0);
        assert_eq!(json["fetchError"], "HTTP 500");
        assert!(json["lastCursor"].is_null());
        assert!(summary.failed_on_first_page());
    }

    #[test]
    fn display_matches_serde_tag() {
        let json = serde_json::to_string(&SkipReason::PriceWindow).unwrap();
        assert_eq!(json, format!("\"{}\"", SkipReason::PriceWindow));
    }
}
