//! Database operations for `ingestion_runs`.
//!
//! A run moves `queued -> running -> succeeded | failed`; every transition
//! is guarded on the expected prior status.

use affdb_ingest::IngestionSummary;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `ingestion_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub source_name: String,
    pub trigger_source: String,
    pub status: String,
    pub start_cursor: Option<String>,
    pub last_cursor: Option<String>,
    pub records_synced: i32,
    /// Serialized [`IngestionSummary`]; `NULL` until the run ends.
    pub summary: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

const RUN_COLUMNS: &str = "id, public_id, source_name, trigger_source, status, start_cursor, \
     last_cursor, records_synced, summary, error_message, started_at, completed_at, created_at";

fn records_synced(summary: &IngestionSummary) -> i32 {
    i32::try_from(summary.synced).unwrap_or(i32::MAX)
}

/// Creates a new run in `queued` status and returns the full row.
///
/// `last_cursor` starts out equal to `start_cursor`, so a run that fails
/// before reporting progress still resumes where it began.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_ingestion_run(
    pool: &PgPool,
    source_name: &str,
    trigger_source: &str,
    start_cursor: Option<&str>,
) -> Result<IngestionRunRow, DbError> {
    let sql = format!(
        "INSERT INTO ingestion_runs \
             (public_id, source_name, trigger_source, status, start_cursor, last_cursor) \
         VALUES ($1, $2, $3, 'queued', $4, $4) \
         RETURNING {RUN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, IngestionRunRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(source_name)
        .bind(trigger_source)
        .bind(start_cursor)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Marks a queued run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not queued, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_ingestion_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }
    Ok(())
}

/// Marks a running run as `succeeded` and records its summary.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not running, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_ingestion_run(
    pool: &PgPool,
    id: i64,
    summary: &IngestionSummary,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'succeeded', completed_at = NOW(), \
             records_synced = $1, last_cursor = $2, summary = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(records_synced(summary))
    .bind(summary.last_cursor.as_deref())
    .bind(Json(summary))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }
    Ok(())
}

/// Marks a running run as `failed`. The summary is kept when the run got
/// far enough to produce one, so its `last_cursor` can seed a resume.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not running, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_ingestion_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
    summary: Option<&IngestionSummary>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1, \
             records_synced = COALESCE($2, records_synced), \
             last_cursor = COALESCE($3, last_cursor), \
             summary = $4 \
         WHERE id = $5 AND status = 'running'",
    )
    .bind(error_message)
    .bind(summary.map(records_synced))
    .bind(summary.and_then(|s| s.last_cursor.as_deref()))
    .bind(summary.map(Json))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }
    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_ingestion_run(pool: &PgPool, id: i64) -> Result<IngestionRunRow, DbError> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM ingestion_runs WHERE id = $1");
    sqlx::query_as::<_, IngestionRunRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingestion_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<IngestionRunRow>, DbError> {
    let sql = format!(
        "SELECT {RUN_COLUMNS} FROM ingestion_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, IngestionRunRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Cursor recorded by the newest finished run of `source_name` that stopped
/// before exhausting its catalog. `None` means start from the first page.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn last_cursor_for_source(
    pool: &PgPool,
    source_name: &str,
) -> Result<Option<String>, DbError> {
    let cursor = sqlx::query_scalar::<_, Option<String>>(
        "SELECT CASE WHEN summary->>'stopReason' = 'exhausted' THEN NULL ELSE last_cursor END \
         FROM ingestion_runs \
         WHERE source_name = $1 AND status IN ('succeeded', 'failed') \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(source_name)
    .fetch_optional(pool)
    .await?;

    Ok(cursor.flatten())
}
