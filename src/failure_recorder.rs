//! Durable log of terminal pipeline failures, plus analytics queries used by
//! the rule-curation surface.
//!
//! Grounded on the teacher's `link_index` SQLite pool setup (WAL mode, busy
//! timeout, idempotent schema) with a fire-and-forget bounded-queue writer
//! added so a slow disk never delays the request path, per the "fire and
//! forget persistence" design note.

use chrono::Utc;
use serde_json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::model::{FailureRecord, FailureStatus};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS failure_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_query TEXT NOT NULL,
    normalized_query TEXT NOT NULL,
    candidates TEXT NOT NULL,
    attempted_count INTEGER NOT NULL,
    error_message TEXT NOT NULL,
    category TEXT,
    brand TEXT,
    model TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    correct_name TEXT,
    correct_product_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_failure_records_original_query ON failure_records(original_query);
CREATE INDEX IF NOT EXISTS idx_failure_records_created_at ON failure_records(created_at);
CREATE INDEX IF NOT EXISTS idx_failure_records_status ON failure_records(status);
"#;

/// One pending insert, queued by the request path and drained by the
/// background writer task.
pub struct PendingFailure {
    pub original_query: String,
    pub normalized_query: String,
    pub candidates: Vec<String>,
    pub attempted_count: i64,
    pub error_message: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
}

/// Aggregate counts over a time window, for the analytics dashboard.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FailureStats {
    pub total: i64,
    pub pending: i64,
    pub resolved: i64,
    pub by_category: Vec<(String, i64)>,
}

/// A repeated `(original_query, normalized_query)` pair with its count.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommonFailure {
    pub original_query: String,
    pub normalized_query: String,
    pub count: i64,
}

/// Priority tag attached to a curation suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SuggestionPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Suggestion {
    pub pattern: String,
    pub occurrences: i64,
    pub priority: SuggestionPriority,
}

/// Durable failure recorder: queues writes to a bounded channel so the
/// request path never waits on disk I/O, and exposes read-only analytics
/// queries that go straight to the pool.
pub struct FailureRecorder {
    pool: SqlitePool,
    sender: mpsc::Sender<PendingFailure>,
}

impl FailureRecorder {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options: SqliteConnectOptions = database_url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;

        let (sender, receiver) = mpsc::channel(256);
        let writer_pool = pool.clone();
        tokio::spawn(async move {
            run_writer(writer_pool, receiver).await;
        });

        Ok(Self { pool, sender })
    }

    /// Queue a failure record for durable, asynchronous persistence. Drops
    /// the oldest queued item under sustained overload rather than
    /// back-pressuring the request path; the drop itself is logged.
    pub fn record(&self, pending: PendingFailure) {
        if let Err(e) = self.sender.try_send(pending) {
            warn!(error = %e, "dropping failure record: writer queue full or closed");
        }
    }

    pub async fn stats(&self, window_days: i64) -> anyhow::Result<FailureStats> {
        let since = Utc::now() - chrono::Duration::days(window_days);
        let since = since.to_rfc3339();

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM failure_records WHERE created_at >= ?1")
            .bind(&since)
            .fetch_one(&self.pool)
            .await?;
        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM failure_records WHERE created_at >= ?1 AND status = 'pending'",
        )
        .bind(&since)
        .fetch_one(&self.pool)
        .await?;
        let resolved = total - pending;

        let rows = sqlx::query(
            "SELECT COALESCE(category, 'unknown') AS category, COUNT(*) AS n FROM failure_records \
             WHERE created_at >= ?1 GROUP BY category ORDER BY n DESC",
        )
        .bind(&since)
        .fetch_all(&self.pool)
        .await?;
        let by_category = rows
            .into_iter()
            .map(|row| (row.get::<String, _>("category"), row.get::<i64, _>("n")))
            .collect();

        Ok(FailureStats { total, pending, resolved, by_category })
    }

    pub async fn common(&self, limit: i64) -> anyhow::Result<Vec<CommonFailure>> {
        let rows = sqlx::query(
            "SELECT original_query, normalized_query, COUNT(*) AS n FROM failure_records \
             GROUP BY original_query, normalized_query ORDER BY n DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CommonFailure {
                original_query: row.get("original_query"),
                normalized_query: row.get("normalized_query"),
                count: row.get("n"),
            })
            .collect())
    }

    /// Patterns with at least 3 occurrences, tagged by how strongly they
    /// warrant a hard-map or synonym rule addition.
    pub async fn suggestions(&self) -> anyhow::Result<Vec<Suggestion>> {
        let rows = sqlx::query(
            "SELECT normalized_query, COUNT(*) AS n FROM failure_records \
             GROUP BY normalized_query HAVING COUNT(*) >= 3 ORDER BY n DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let occurrences: i64 = row.get("n");
                let priority = if occurrences >= 20 {
                    SuggestionPriority::High
                } else if occurrences >= 8 {
                    SuggestionPriority::Medium
                } else {
                    SuggestionPriority::Low
                };
                Suggestion { pattern: row.get("normalized_query"), occurrences, priority }
            })
            .collect())
    }

    pub async fn resolve(
        &self,
        id: i64,
        status: FailureStatus,
        correct_name: Option<String>,
        correct_product_id: Option<String>,
    ) -> anyhow::Result<()> {
        let status_str = match status {
            FailureStatus::Pending => "pending",
            FailureStatus::ManualFixed => "manual_fixed",
            FailureStatus::AutoLearned => "auto_learned",
            FailureStatus::NotProduct => "not_product",
        };
        sqlx::query(
            "UPDATE failure_records SET status = ?1, correct_name = ?2, correct_product_id = ?3, \
             updated_at = ?4 WHERE id = ?5",
        )
        .bind(status_str)
        .bind(correct_name)
        .bind(correct_product_id)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn run_writer(pool: SqlitePool, mut receiver: mpsc::Receiver<PendingFailure>) {
    while let Some(pending) = receiver.recv().await {
        let candidates_json = serde_json::to_string(&pending.candidates).unwrap_or_default();
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO failure_records \
             (original_query, normalized_query, candidates, attempted_count, error_message, \
              category, brand, model, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?9)",
        )
        .bind(&pending.original_query)
        .bind(&pending.normalized_query)
        .bind(&candidates_json)
        .bind(pending.attempted_count)
        .bind(&pending.error_message)
        .bind(&pending.category)
        .bind(&pending.brand)
        .bind(&pending.model)
        .bind(&now)
        .execute(&pool)
        .await;

        if let Err(e) = result {
            error!(error = %e, "failed to persist failure record");
        }
    }
}

#[allow(dead_code)]
fn row_to_record(row: sqlx::sqlite::SqliteRow) -> anyhow::Result<FailureRecord> {
    let status_str: String = row.get("status");
    let status = match status_str.as_str() {
        "manual_fixed" => FailureStatus::ManualFixed,
        "auto_learned" => FailureStatus::AutoLearned,
        "not_product" => FailureStatus::NotProduct,
        _ => FailureStatus::Pending,
    };
    let candidates_json: String = row.get("candidates");
    Ok(FailureRecord {
        id: row.get("id"),
        original_query: row.get("original_query"),
        normalized_query: row.get("normalized_query"),
        candidates: serde_json::from_str(&candidates_json).unwrap_or_default(),
        attempted_count: row.get("attempted_count"),
        error_message: row.get("error_message"),
        category: row.get("category"),
        brand: row.get("brand"),
        model: row.get("model"),
        status,
        correct_name: row.get("correct_name"),
        correct_product_id: row.get("correct_product_id"),
        created_at: row.get::<String, _>("created_at").parse()?,
        updated_at: row.get::<String, _>("updated_at").parse()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_and_query_stats() {
        let recorder = FailureRecorder::connect("sqlite::memory:").await.expect("connect");
        recorder.record(PendingFailure {
            original_query: "화이트 × B182W13".to_string(),
            normalized_query: "화이트 b182w13".to_string(),
            candidates: vec!["b182w13".to_string()],
            attempted_count: 2,
            error_message: "no candidate succeeded".to_string(),
            category: None,
            brand: None,
            model: None,
        });
        // give the background writer a chance to drain the channel
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let stats = recorder.stats(30).await.expect("stats");
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn suggestions_require_minimum_occurrences() {
        let recorder = FailureRecorder::connect("sqlite::memory:").await.expect("connect");
        for _ in 0..2 {
            recorder.record(PendingFailure {
                original_query: "raw".into(),
                normalized_query: "norm".into(),
                candidates: vec![],
                attempted_count: 1,
                error_message: "err".into(),
                category: None,
                brand: None,
                model: None,
            });
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let suggestions = recorder.suggestions().await.expect("suggestions");
        assert!(suggestions.is_empty());
    }
}
