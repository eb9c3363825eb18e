//! Paged ingestion loop for one source.
//!
//! Strictly sequential: each item is fully looked up, resolved and written
//! before the next one starts. Budgets are checked only before page fetches.

use std::time::Duration;

use affdb_core::SourceNetwork;

use crate::error::StoreError;
use crate::normalize::RawItem;
use crate::pipeline::{Candidate, Pipeline};
use crate::quality::score;
use crate::resolve::{resolve, ResolutionAction};
use crate::retry::{retry_transient, RetryPolicy};
use crate::source::SourceClient;
use crate::store::{ProductRecord, ProductStore};
use crate::summary::{IngestionState, IngestionSummary, SkipReason, StopReason};

/// Hard page ceiling for sources without a configured `max_pages`, so a
/// cycling cursor cannot loop forever.
pub const MAX_PAGES: u32 = 10_000;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_pages: Option<u32>,
    pub max_synced: Option<u64>,
    /// Request (credit) budget; every HTTP attempt counts, retries included.
    pub max_requests: Option<u32>,
    /// Resume point; `None` starts from the first page.
    pub start_cursor: Option<String>,
    /// Pause before every page fetch after the first.
    pub inter_request_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            max_synced: None,
            max_requests: None,
            start_cursor: None,
            inter_request_delay: Duration::from_millis(1000),
            retry: RetryPolicy::new(3, 2000),
        }
    }
}

impl RunOptions {
    fn budget_exhausted(&self, state: &IngestionState) -> Option<StopReason> {
        let max_pages = self.max_pages.unwrap_or(MAX_PAGES).min(MAX_PAGES);
        if state.pages_fetched >= max_pages {
            return Some(StopReason::MaxPages);
        }
        if self.max_synced.is_some_and(|max| state.synced() >= max) {
            return Some(StopReason::MaxSynced);
        }
        if self
            .max_requests
            .is_some_and(|max| state.requests_used >= max)
        {
            return Some(StopReason::RequestBudget);
        }
        None
    }
}

/// Runs one ingestion pass of `client` into `store`.
///
/// Always returns a summary. A failed page fetch ends the loop with
/// [`StopReason::FetchFailed`]; store failures on individual items are
/// counted as errors and the loop moves on.
pub async fn run_ingestion<C, S>(
    client: &C,
    store: &S,
    pipeline: &Pipeline,
    options: &RunOptions,
) -> IngestionSummary
where
    C: SourceClient + ?Sized,
    S: ProductStore + ?Sized,
{
    let source = client.name().to_string();
    let network = client.network();
    let mut state = IngestionState::starting_at(options.start_cursor.clone());

    tracing::info!(
        source = %source,
        network = %network,
        cursor = ?state.cursor,
        "starting ingestion run"
    );

    let (stop_reason, fetch_error) = loop {
        if let Some(reason) = options.budget_exhausted(&state) {
            break (reason, None);
        }

        if state.pages_fetched > 0 && !options.inter_request_delay.is_zero() {
            tokio::time::sleep(options.inter_request_delay).await;
        }

        let cursor = state.cursor.clone();
        let mut attempts = 0u32;
        let fetched = retry_transient(options.retry, "fetch_page", || {
            attempts += 1;
            client.fetch_page(cursor.as_deref())
        })
        .await;
        state.requests_used = state.requests_used.saturating_add(attempts);

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(
                    source = %source,
                    page = state.pages_fetched + 1,
                    cursor = ?state.cursor,
                    error = %e,
                    "page fetch failed; aborting source"
                );
                break (StopReason::FetchFailed, Some(e.to_string()));
            }
        };
        state.pages_fetched += 1;

        tracing::info!(
            source = %source,
            page = state.pages_fetched,
            items = page.items.len(),
            has_more = page.has_more,
            "fetched page"
        );

        for item in &page.items {
            process_item(store, pipeline, options.retry, network, item, &mut state).await;
        }

        if !page.has_more {
            break (StopReason::Exhausted, None);
        }
        match page.next_cursor {
            Some(next) => state.cursor = Some(next),
            None => {
                tracing::warn!(
                    source = %source,
                    page = state.pages_fetched,
                    "source reported more pages but no cursor; stopping"
                );
                break (StopReason::Exhausted, None);
            }
        }
    };

    let summary = state.into_summary(&source, stop_reason, fetch_error);
    tracing::info!(
        source = %summary.source,
        synced = summary.synced,
        inserted = summary.inserted,
        replaced = summary.replaced,
        skipped = summary.skipped,
        errors = summary.errors,
        pages = summary.pages_fetched,
        requests = summary.requests_used,
        stop_reason = ?summary.stop_reason,
        "ingestion run finished"
    );
    summary
}

async fn process_item<S>(
    store: &S,
    pipeline: &Pipeline,
    retry: RetryPolicy,
    network: SourceNetwork,
    raw: &RawItem,
    state: &mut IngestionState,
) where
    S: ProductStore + ?Sized,
{
    let candidate = match pipeline.evaluate(raw, network) {
        Ok(candidate) => candidate,
        Err(reason) => {
            state.record_skip(reason);
            return;
        }
    };

    match store_candidate(store, pipeline, retry, candidate).await {
        Ok(Some(ResolutionAction::Insert)) => state.inserted += 1,
        Ok(Some(ResolutionAction::Replace { .. })) => state.replaced += 1,
        Ok(Some(ResolutionAction::Discard) | None) => state.record_skip(SkipReason::Duplicates),
        Err((product_url, e)) => {
            tracing::error!(product_url = %product_url, error = %e, "store operation failed");
            state.errors += 1;
        }
    }
}

/// Lookup, resolve, write. Returns the applied action, or `None` when the
/// candidate was discarded as a duplicate.
async fn store_candidate<S>(
    store: &S,
    pipeline: &Pipeline,
    retry: RetryPolicy,
    candidate: Candidate,
) -> Result<Option<ResolutionAction>, (String, StoreError)>
where
    S: ProductStore + ?Sized,
{
    let url = candidate.product.product_url.clone();
    let with_url = |e: StoreError| (url.clone(), e);

    let existing = retry_transient(retry, "find_by_fingerprint", || {
        store.find_by_fingerprint(&candidate.fingerprint)
    })
    .await
    .map_err(with_url)?;

    let existing_scored = existing
        .as_ref()
        .map(|stored| (stored, score(stored, &pipeline.scoring)));
    let resolution = resolve(
        &candidate.product,
        candidate.quality_score,
        existing_scored,
    );

    let record = ProductRecord {
        product: candidate.product,
        fingerprint: candidate.fingerprint,
        quality_score: candidate.quality_score,
    };

    match resolution.action {
        ResolutionAction::Insert => {}
        ResolutionAction::Replace { existing_id } => {
            retry_transient(retry, "delete_by_id", || store.delete_by_id(existing_id))
                .await
                .map_err(with_url)?;
        }
        ResolutionAction::Discard => {
            tracing::debug!(
                product_url = %record.product.product_url,
                fingerprint = %record.fingerprint,
                reason = resolution.reason,
                "duplicate discarded"
            );
            return Ok(None);
        }
    }

    let id = retry_transient(retry, "upsert_by_url", || store.upsert_by_url(&record))
        .await
        .map_err(with_url)?;

    tracing::debug!(
        id,
        product_url = %record.product.product_url,
        fingerprint = %record.fingerprint,
        quality_score = record.quality_score,
        reason = resolution.reason,
        "product stored"
    );
    Ok(Some(resolution.action))
}
