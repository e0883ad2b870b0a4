use sqlx::any::AnyConnectOptions;
use sqlx::{AnyConnection, Connection, Row};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

use crate::dialect::SqlDialect;

/// Table-to-columns mapping pulled from a live relational connection.
///
/// Schema context is an optimization, not a requirement: any introspection
/// failure produces an empty `SchemaInfo` and the pipeline carries on.
#[derive(Debug, Default, Clone)]
pub struct SchemaInfo {
    pub tables: BTreeMap<String, Vec<String>>,
}

impl SchemaInfo {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Compact prompt-context form: `table(col1, col2); other(colA)`.
    pub fn describe(&self) -> String {
        self.tables
            .iter()
            .map(|(table, cols)| format!("{}({})", table, cols.join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Known table names, for execution-error diagnostics.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }
}

/// Enumerates tables and their column names on the target database.
pub async fn introspect(connection_url: &str, dialect: SqlDialect) -> SchemaInfo {
    match try_introspect(connection_url, dialect).await {
        Ok(info) => info,
        Err(e) => {
            debug!("Schema introspection failed, continuing without context: {}", e);
            SchemaInfo::default()
        }
    }
}

async fn try_introspect(
    connection_url: &str,
    dialect: SqlDialect,
) -> Result<SchemaInfo, sqlx::Error> {
    super::sql_exec::ensure_drivers();

    let options = AnyConnectOptions::from_str(connection_url)?;
    let mut conn = AnyConnection::connect_with(&options).await?;

    let mut tables: BTreeMap<String, Vec<String>> = BTreeMap::new();

    if dialect == SqlDialect::Sqlite {
        // sqlite has no information_schema; list tables first, then pull
        // column names per table via pragma.
        let names = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&mut conn)
        .await?;

        for row in &names {
            let table: String = row.try_get(0)?;
            let quoted = table.replace('"', "\"\"");
            let cols = sqlx::query(&format!("PRAGMA table_info(\"{}\")", quoted))
                .fetch_all(&mut conn)
                .await?;
            let mut columns = Vec::with_capacity(cols.len());
            for col in &cols {
                // pragma layout: (cid, name, type, notnull, dflt_value, pk)
                columns.push(col.try_get::<String, _>(1)?);
            }
            tables.insert(table, columns);
        }
    } else {
        let query = match dialect {
            SqlDialect::Postgres => {
                "SELECT table_name, column_name FROM information_schema.columns \
                 WHERE table_schema = 'public' ORDER BY table_name, ordinal_position"
            }
            SqlDialect::Mysql => {
                "SELECT table_name, column_name FROM information_schema.columns \
                 WHERE table_schema = DATABASE() ORDER BY table_name, ordinal_position"
            }
            _ => {
                "SELECT table_name, column_name FROM information_schema.columns \
                 ORDER BY table_name, ordinal_position"
            }
        };

        let rows = sqlx::query(query).fetch_all(&mut conn).await?;
        for row in &rows {
            let table: String = row.try_get(0)?;
            let column: String = row.try_get(1)?;
            tables.entry(table).or_default().push(column);
        }
    }

    let _ = conn.close().await;

    Ok(SchemaInfo { tables })
}
