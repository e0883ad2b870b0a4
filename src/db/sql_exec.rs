use serde_json::Value;
use sqlx::any::{AnyConnectOptions, AnyRow};
use sqlx::{AnyConnection, Column, Connection, Executor, Row, Statement};
use std::str::FromStr;
use std::sync::Once;
use tracing::debug;

use super::{ExecError, ResultRow};

static INSTALL_DRIVERS: Once = Once::new();

/// Registers the compiled-in sqlx drivers with the Any driver exactly once.
pub fn ensure_drivers() {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// Executes `sql` against the database at `connection_url` inside a single
/// transaction, so DDL/DML commits atomically with the read and a failing
/// statement rolls back cleanly.
///
/// Returns ordered column names and one record per row. A statement that
/// produces no rows (pure DDL/DML) yields empty columns and rows; that is a
/// valid success.
pub async fn execute(
    connection_url: &str,
    sql: &str,
) -> Result<(Vec<String>, Vec<ResultRow>), ExecError> {
    ensure_drivers();

    let options = AnyConnectOptions::from_str(connection_url)
        .map_err(|e| ExecError::Connect(e.to_string()))?;
    let mut conn = AnyConnection::connect_with(&options)
        .await
        .map_err(|e| ExecError::Connect(e.to_string()))?;

    debug!("Executing SQL: {}", sql);

    let mut tx = conn
        .begin()
        .await
        .map_err(|e| ExecError::Execute(e.to_string()))?;

    let rows = sqlx::query(sql)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| ExecError::Execute(e.to_string()))?;

    // An empty row set still carries column metadata; recover it from the
    // prepared statement so an empty SELECT keeps its column names and only
    // statements with no row set at all (DDL/DML) report none. Metadata
    // recovery is best-effort; the statement itself already succeeded.
    let columns: Vec<String> = match rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        None => match (&mut *tx).prepare(sql).await {
            Ok(stmt) => stmt.columns().iter().map(|c| c.name().to_string()).collect(),
            Err(e) => {
                debug!("Statement metadata unavailable: {}", e);
                Vec::new()
            }
        },
    };

    tx.commit()
        .await
        .map_err(|e| ExecError::Execute(e.to_string()))?;

    let _ = conn.close().await;

    let records = rows
        .iter()
        .map(|row| {
            let mut record = ResultRow::new();
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), decode_value(row, idx));
            }
            record
        })
        .collect();

    Ok((columns, records))
}

/// Decodes one cell into JSON by trying the Any driver's supported types in
/// order. Anything undecodable degrades to null rather than failing the row.
fn decode_value(row: &AnyRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v
            .map(|bytes| Value::from(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn select_without_tables_returns_typed_row() {
        let (columns, rows) = execute("sqlite::memory:", "SELECT 1 AS one, 'a' AS s;")
            .await
            .unwrap();
        assert_eq!(columns, vec!["one", "s"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["one"], json!(1));
        assert_eq!(rows[0]["s"], json!("a"));
    }

    #[tokio::test]
    async fn empty_select_keeps_column_names() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/t.db?mode=rwc", dir.path().display());

        execute(&url, "CREATE TABLE users (id INTEGER, name TEXT);")
            .await
            .unwrap();

        let (columns, rows) = execute(&url, "SELECT id, name FROM users WHERE 1=0;")
            .await
            .unwrap();
        assert_eq!(columns, vec!["id", "name"]);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn ddl_succeeds_with_empty_result() {
        let (columns, rows) = execute("sqlite::memory:", "CREATE TABLE t (id INTEGER);")
            .await
            .unwrap();
        assert!(columns.is_empty());
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn rejected_statement_is_an_execute_error() {
        let err = execute("sqlite::memory:", "SELECT * FROM missing_tbl;")
            .await
            .unwrap_err();
        match err {
            ExecError::Execute(msg) => assert!(msg.contains("missing_tbl")),
            other => panic!("expected Execute, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connect_error() {
        let err = execute("oracle://u:p@nowhere/db", "SELECT 1;")
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Connect(_)));
    }

    #[tokio::test]
    async fn state_persists_across_calls_on_file_backed_db() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/t.db?mode=rwc", dir.path().display());

        execute(&url, "CREATE TABLE users (id INTEGER, name TEXT);")
            .await
            .unwrap();
        execute(&url, "INSERT INTO users VALUES (1, 'ada'), (2, 'lin');")
            .await
            .unwrap();

        let (columns, rows) = execute(&url, "SELECT COUNT(*) AS n FROM users;")
            .await
            .unwrap();
        assert_eq!(columns, vec!["n"]);
        assert_eq!(rows[0]["n"], json!(2));
    }
}
