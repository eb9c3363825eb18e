//! `ingest` command handler.
//!
//! Configuration problems (unknown source, missing credential, bad keyword
//! tables) abort before any source is contacted. After that each source runs
//! on its own: a failing source is logged and reported, and the next one
//! still runs.

use std::fmt::Write as _;
use std::time::Duration;

use affdb_core::{AppConfig, SourceConfig, SourcesFile};
use affdb_ingest::{
    run_ingestion, IngestionSummary, MemoryProductStore, Pipeline, ProductStore, RetryPolicy,
    RunOptions, StopReason,
};
use affdb_sources::FeedClient;
use anyhow::Context;
use clap::Args;

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Run only this source (by name)
    #[arg(long)]
    pub source: Option<String>,

    /// Run the full pipeline against an in-memory store; the database is
    /// not touched
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after this many pages (overrides the source's `max_pages`)
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Stop once this many products were written (overrides `max_synced`)
    #[arg(long)]
    pub max_synced: Option<u64>,

    /// Start from this cursor instead of the first page
    #[arg(long, requires = "source")]
    pub cursor: Option<String>,

    /// Start each source from the cursor its last unfinished run stopped at
    #[arg(long, conflicts_with_all = ["cursor", "dry_run"])]
    pub resume: bool,

    /// Print summaries as a JSON array instead of text
    #[arg(long)]
    pub json: bool,
}

/// A source with its client and pipeline built and ready to run.
pub(crate) struct PreparedSource<'a> {
    pub config: &'a SourceConfig,
    pub client: FeedClient,
    pub pipeline: Pipeline,
}

/// Sources to run: the named one, or every enabled source.
pub(crate) fn select_sources<'a>(
    registry: &'a SourcesFile,
    name: Option<&str>,
) -> anyhow::Result<Vec<&'a SourceConfig>> {
    match name {
        Some(name) => {
            let source = registry
                .find(name)
                .ok_or_else(|| anyhow::anyhow!("source '{name}' not found in sources file"))?;
            if !source.enabled {
                anyhow::bail!("source '{name}' is disabled; set enabled: true to run it");
            }
            Ok(vec![source])
        }
        None => Ok(registry.enabled().collect()),
    }
}

/// Resolves credentials and builds the client and pipeline for every
/// selected source, with the tuning tables `registry` assigns it. Any failure
/// here is fatal for the whole command.
pub(crate) fn prepare_sources<'a, F>(
    config: &AppConfig,
    registry: &SourcesFile,
    sources: &[&'a SourceConfig],
    lookup: F,
) -> anyhow::Result<Vec<PreparedSource<'a>>>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    sources
        .iter()
        .map(|source| {
            let credential = source.resolve_credential(&lookup)?;
            let client = FeedClient::from_app_config(source, credential, config)
                .with_context(|| format!("building client for source '{}'", source.name))?;
            let pipeline = Pipeline::for_source(
                source,
                registry.tuning_for(source),
                config.min_quality_score,
            )
            .with_context(|| format!("building filters for source '{}'", source.name))?;
            Ok(PreparedSource {
                config: source,
                client,
                pipeline,
            })
        })
        .collect()
}

/// Run options for one source: CLI limits win over the source's own.
pub(crate) fn run_options(
    config: &AppConfig,
    source: &SourceConfig,
    args: &IngestArgs,
    start_cursor: Option<String>,
) -> RunOptions {
    RunOptions {
        max_pages: args.max_pages.or(source.max_pages),
        max_synced: args.max_synced.or(source.max_synced),
        max_requests: source.max_requests,
        start_cursor,
        inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
        retry: RetryPolicy::new(config.max_retries, config.retry_delay_ms),
    }
}

pub(crate) async fn run_ingest(config: &AppConfig, args: &IngestArgs) -> anyhow::Result<()> {
    let registry = affdb_core::load_sources(&config.sources_path)?;
    let selected = select_sources(&registry, args.source.as_deref())?;
    if selected.is_empty() {
        println!("no enabled sources in {}", config.sources_path.display());
        return Ok(());
    }
    let prepared = prepare_sources(config, &registry, &selected, |key| std::env::var(key))?;

    let summaries = if args.dry_run {
        run_dry(config, &prepared, args).await
    } else {
        let pool_config = affdb_db::PoolConfig::from_app_config(config);
        let pool = affdb_db::connect_pool(&config.database_url, pool_config).await?;
        run_persisted(&pool, config, &prepared, args).await
    };

    report(&summaries, args.json)?;

    let failed = first_page_failures(&summaries);
    if failed > 0 {
        anyhow::bail!("{failed} source(s) failed before the first page");
    }
    Ok(())
}

/// Runs every source against its own throwaway in-memory store.
pub(crate) async fn run_dry(
    config: &AppConfig,
    prepared: &[PreparedSource<'_>],
    args: &IngestArgs,
) -> Vec<IngestionSummary> {
    let mut summaries = Vec::with_capacity(prepared.len());
    for source in prepared {
        let store = MemoryProductStore::new();
        let options = run_options(config, source.config, args, args.cursor.clone());
        summaries.push(run_source(source, &store, &options).await);
    }
    summaries
}

async fn run_source<S>(
    source: &PreparedSource<'_>,
    store: &S,
    options: &RunOptions,
) -> IngestionSummary
where
    S: ProductStore + ?Sized,
{
    run_ingestion(&source.client, store, &source.pipeline, options).await
}

async fn run_persisted(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    prepared: &[PreparedSource<'_>],
    args: &IngestArgs,
) -> Vec<IngestionSummary> {
    let store = affdb_db::PgProductStore::new(pool.clone());
    let mut summaries = Vec::with_capacity(prepared.len());

    for source in prepared {
        let name = source.config.name.as_str();
        match run_tracked(pool, &store, config, source, args).await {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                let message = format!("{e:#}");
                tracing::error!(source = %name, error = %message, "source run aborted");
                summaries.push(aborted_summary(name, &e));
            }
        }
    }
    summaries
}

/// One source run recorded in `ingestion_runs`
/// (queued -> running -> succeeded | failed).
async fn run_tracked(
    pool: &sqlx::PgPool,
    store: &affdb_db::PgProductStore,
    config: &AppConfig,
    source: &PreparedSource<'_>,
    args: &IngestArgs,
) -> anyhow::Result<IngestionSummary> {
    let name = source.config.name.as_str();
    let start_cursor = if args.resume {
        let cursor = affdb_db::last_cursor_for_source(pool, name).await?;
        if let Some(cursor) = &cursor {
            tracing::info!(source = %name, cursor = %cursor, "resuming from last recorded cursor");
        }
        cursor
    } else {
        args.cursor.clone()
    };
    let options = run_options(config, source.config, args, start_cursor);

    let run =
        affdb_db::create_ingestion_run(pool, name, "cli", options.start_cursor.as_deref()).await?;
    if let Err(e) = affdb_db::start_ingestion_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, format!("{e:#}"), None).await;
        return Err(e.into());
    }

    let summary = run_source(source, store, &options).await;

    if summary.stop_reason == StopReason::FetchFailed {
        let message = summary
            .fetch_error
            .clone()
            .unwrap_or_else(|| "page fetch failed".to_string());
        fail_run_best_effort(pool, run.id, message, Some(&summary)).await;
    } else if let Err(e) = affdb_db::complete_ingestion_run(pool, run.id, &summary).await {
        tracing::error!(run_id = run.id, source = %name, error = %e, "failed to record run summary");
        fail_run_best_effort(pool, run.id, format!("{e:#}"), Some(&summary)).await;
    }
    Ok(summary)
}

/// Attempt to mark an ingestion run as failed, logging any secondary error.
async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    message: String,
    summary: Option<&IngestionSummary>,
) {
    if let Err(mark_err) = affdb_db::fail_ingestion_run(pool, run_id, &message, summary).await {
        tracing::error!(run_id, error = %mark_err, "failed to mark ingestion run as failed");
    }
}

/// Summary for a source whose run could not even be started.
fn aborted_summary(source: &str, error: &anyhow::Error) -> IngestionSummary {
    affdb_ingest::IngestionState::default().into_summary(
        source,
        StopReason::FetchFailed,
        Some(format!("{error:#}")),
    )
}

pub(crate) fn first_page_failures(summaries: &[IngestionSummary]) -> usize {
    summaries
        .iter()
        .filter(|s| s.failed_on_first_page())
        .count()
}

fn report(summaries: &[IngestionSummary], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summaries)?);
    } else {
        for summary in summaries {
            println!("{}", render_summary(summary));
        }
    }
    Ok(())
}

/// Human-readable block for one summary.
pub(crate) fn render_summary(summary: &IngestionSummary) -> String {
    let mut out = format!(
        "{}: synced {} (inserted {}, replaced {}), skipped {}, errors {}; \
         {} page(s), {} request(s), stopped: {}",
        summary.source,
        summary.synced,
        summary.inserted,
        summary.replaced,
        summary.skipped,
        summary.errors,
        summary.pages_fetched,
        summary.requests_used,
        stop_label(summary.stop_reason),
    );
    for (reason, count) in &summary.skip_reasons {
        let _ = write!(out, "\n  {reason}: {count}");
    }
    if let Some(cursor) = &summary.last_cursor {
        if summary.stop_reason != StopReason::Exhausted {
            let _ = write!(out, "\n  resume with --cursor {cursor}");
        }
    }
    if let Some(error) = &summary.fetch_error {
        let _ = write!(out, "\n  fetch error: {error}");
    }
    out
}

fn stop_label(reason: StopReason) -> &'static str {
    match reason {
        StopReason::Exhausted => "catalog exhausted",
        StopReason::MaxPages => "page limit",
        StopReason::MaxSynced => "sync limit",
        StopReason::RequestBudget => "request budget",
        StopReason::FetchFailed => "fetch failed",
    }
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
