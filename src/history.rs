use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

use crate::db::ResultRow;

#[derive(Debug)]
pub enum HistoryError {
    Open(String),
    Write(String),
    Read(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::Open(msg) => write!(f, "history open error: {}", msg),
            HistoryError::Write(msg) => write!(f, "history write error: {}", msg),
            HistoryError::Read(msg) => write!(f, "history read error: {}", msg),
        }
    }
}

impl Error for HistoryError {}

/// One persisted pipeline run.
#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub id: i64,
    pub question: String,
    pub sql: String,
    pub rows: Vec<ResultRow>,
    pub created_at: String,
}

/// Append-only log of pipeline runs, on a local SQLite database independent
/// of the databases being queried.
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    /// Opens (creating if absent) the history database at `path` and
    /// ensures the `query_history` table exists. `":memory:"` opens an
    /// in-memory store, which tests use.
    pub async fn open(path: &str) -> Result<Self, HistoryError> {
        let options = if path == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| HistoryError::Open(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };

        // Single connection: inserts are light and an in-memory database is
        // per-connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Open(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS query_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                sql TEXT NOT NULL,
                result TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| HistoryError::Open(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Inserts one entry. The orchestrator deliberately discards this
    /// result: a transient storage hiccup must never fail an otherwise
    /// successful query response.
    pub async fn append(
        &self,
        question: &str,
        query_text: &str,
        rows: &[ResultRow],
    ) -> Result<(), HistoryError> {
        let result =
            serde_json::to_string(rows).map_err(|e| HistoryError::Write(e.to_string()))?;
        let created_at = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO query_history (question, sql, result, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(question)
        .bind(query_text)
        .bind(result)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Write(e.to_string()))?;

        Ok(())
    }

    /// Up to `limit` most recent entries, newest first.
    pub async fn list(&self, limit: i64) -> Result<Vec<HistoryItem>, HistoryError> {
        let rows = sqlx::query(
            "SELECT id, question, sql, result, created_at FROM query_history \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::Read(e.to_string()))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let result: String = row
                .try_get("result")
                .map_err(|e| HistoryError::Read(e.to_string()))?;
            let parsed: Vec<ResultRow> = serde_json::from_str(&result)
                .map_err(|e| HistoryError::Read(e.to_string()))?;

            items.push(HistoryItem {
                id: row
                    .try_get("id")
                    .map_err(|e| HistoryError::Read(e.to_string()))?,
                question: row
                    .try_get("question")
                    .map_err(|e| HistoryError::Read(e.to_string()))?,
                sql: row
                    .try_get("sql")
                    .map_err(|e| HistoryError::Read(e.to_string()))?,
                rows: parsed,
                created_at: row
                    .try_get("created_at")
                    .map_err(|e| HistoryError::Read(e.to_string()))?,
            });
        }

        Ok(items)
    }

    /// Simulates a storage outage by removing the backing table.
    #[cfg(test)]
    pub async fn break_for_tests(&self) {
        sqlx::query("DROP TABLE query_history")
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(key: &str, value: serde_json::Value) -> ResultRow {
        let mut r = ResultRow::new();
        r.insert(key.to_string(), value);
        r
    }

    #[tokio::test]
    async fn append_then_list_round_trips_rows() {
        let store = HistoryStore::open(":memory:").await.unwrap();
        store
            .append("count users", "SELECT COUNT(*) FROM users;", &[row("n", json!(3))])
            .await
            .unwrap();

        let items = store.list(100).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].question, "count users");
        assert_eq!(items[0].sql, "SELECT COUNT(*) FROM users;");
        assert_eq!(items[0].rows[0]["n"], json!(3));
        assert!(!items[0].created_at.is_empty());
    }

    #[tokio::test]
    async fn list_limits_and_orders_newest_first() {
        let store = HistoryStore::open(":memory:").await.unwrap();
        for i in 1..=3 {
            store
                .append(&format!("q{}", i), &format!("SELECT {};", i), &[])
                .await
                .unwrap();
        }

        let items = store.list(2).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].question, "q3");
        assert_eq!(items[1].question, "q2");
    }

    #[tokio::test]
    async fn open_is_idempotent_on_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let path = path.to_str().unwrap();

        {
            let store = HistoryStore::open(path).await.unwrap();
            store.append("q", "SELECT 1;", &[]).await.unwrap();
        }

        let store = HistoryStore::open(path).await.unwrap();
        let items = store.list(10).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn broken_store_reports_write_and_read_errors() {
        let store = HistoryStore::open(":memory:").await.unwrap();
        store.break_for_tests().await;

        assert!(matches!(
            store.append("q", "SELECT 1;", &[]).await,
            Err(HistoryError::Write(_))
        ));
        assert!(matches!(store.list(10).await, Err(HistoryError::Read(_))));
    }
}
