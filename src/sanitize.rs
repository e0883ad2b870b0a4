use serde_json::Value;

use crate::dialect::SqlDialect;

/// Canonical sqlite replacement for model output that reaches for
/// `information_schema.tables`, which sqlite does not have.
pub const SQLITE_LIST_TABLES: &str = "SELECT name FROM sqlite_master WHERE type='table';";

/// A document-store query as produced by the model: which collection to
/// search and an equality/comparison filter document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuerySpec {
    pub collection: String,
    pub filter: Value,
    /// The fence-stripped model output the spec was parsed from; echoed back
    /// to the caller as the finalized query text.
    pub raw: String,
}

#[derive(Debug)]
pub enum SanitizeError {
    /// Model output was not valid JSON.
    InvalidJson(String),
    /// JSON parsed but did not have the expected shape.
    InvalidShape(String),
}

impl std::fmt::Display for SanitizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SanitizeError::InvalidJson(msg) => write!(f, "invalid JSON: {}", msg),
            SanitizeError::InvalidShape(msg) => write!(f, "unexpected shape: {}", msg),
        }
    }
}

impl std::error::Error for SanitizeError {}

/// Removes a surrounding markdown code fence, if present.
///
/// Models frequently wrap output in ``` fences despite being told not to.
/// When the text starts with a fence marker, the first and last lines are
/// dropped and the interior kept.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() >= 2 {
            return lines[1..lines.len() - 1].join("\n").trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Turns raw model output into the SQL string that will actually run.
///
/// Strips fences, applies the sqlite `information_schema` rewrite, and
/// guarantees exactly one trailing statement terminator.
pub fn finalize_sql(raw: &str, dialect: SqlDialect) -> String {
    let mut sql = strip_code_fence(raw);

    if dialect == SqlDialect::Sqlite && sql.to_lowercase().contains("information_schema.tables") {
        return SQLITE_LIST_TABLES.to_string();
    }

    while sql.ends_with(';') {
        sql.pop();
        let kept = sql.trim_end().len();
        sql.truncate(kept);
    }
    sql.push(';');
    sql
}

/// Parses fence-stripped model output into a [`DocumentQuerySpec`].
///
/// Fails closed: anything that is not a JSON object with a string
/// `collection` (and an optional object `filter`) is rejected.
pub fn parse_document_query(raw: &str) -> Result<DocumentQuerySpec, SanitizeError> {
    let text = strip_code_fence(raw);

    let value: Value = serde_json::from_str(&text)
        .map_err(|e| SanitizeError::InvalidJson(e.to_string()))?;

    let obj = value
        .as_object()
        .ok_or_else(|| SanitizeError::InvalidShape("expected a JSON object".to_string()))?;

    let collection = obj
        .get("collection")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            SanitizeError::InvalidShape("missing string key 'collection'".to_string())
        })?
        .to_string();

    let filter = match obj.get("filter") {
        None => Value::Object(serde_json::Map::new()),
        Some(f) if f.is_object() => f.clone(),
        Some(_) => {
            return Err(SanitizeError::InvalidShape(
                "'filter' must be a JSON object".to_string(),
            ));
        }
    };

    Ok(DocumentQuerySpec {
        collection,
        filter,
        raw: text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fence_strip_round_trips_interior_text() {
        let inner = "SELECT * FROM users";
        let fenced = format!("```sql\n{}\n```", inner);
        assert_eq!(strip_code_fence(&fenced), inner);

        let plain_fence = format!("```\n{}\n```", inner);
        assert_eq!(strip_code_fence(&plain_fence), inner);
    }

    #[test]
    fn fence_strip_leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fence("  SELECT 1  "), "SELECT 1");
        assert_eq!(strip_code_fence("no fences here"), "no fences here");
    }

    #[test]
    fn fence_strip_keeps_multiline_interior() {
        let fenced = "```sql\nSELECT a,\n       b\nFROM t\n```";
        assert_eq!(strip_code_fence(fenced), "SELECT a,\n       b\nFROM t");
    }

    #[test]
    fn finalize_appends_terminator_when_absent() {
        assert_eq!(
            finalize_sql("SELECT COUNT(*) FROM users", SqlDialect::Sqlite),
            "SELECT COUNT(*) FROM users;"
        );
    }

    #[test]
    fn finalize_never_doubles_terminators() {
        assert_eq!(finalize_sql("SELECT 1;", SqlDialect::Generic), "SELECT 1;");
        assert_eq!(finalize_sql("SELECT 1;;", SqlDialect::Generic), "SELECT 1;");
        assert_eq!(
            finalize_sql("SELECT 1; ;", SqlDialect::Generic),
            "SELECT 1;"
        );
    }

    #[test]
    fn finalize_strips_fences_first() {
        assert_eq!(
            finalize_sql("```sql\nSELECT 1\n```", SqlDialect::Postgres),
            "SELECT 1;"
        );
    }

    #[test]
    fn sqlite_information_schema_rewrite() {
        let generated = "SELECT table_name FROM information_schema.tables;";
        assert_eq!(
            finalize_sql(generated, SqlDialect::Sqlite),
            SQLITE_LIST_TABLES
        );
        // Case-insensitive match.
        assert_eq!(
            finalize_sql(
                "SELECT * FROM INFORMATION_SCHEMA.TABLES",
                SqlDialect::Sqlite
            ),
            SQLITE_LIST_TABLES
        );
    }

    #[test]
    fn sqlite_rewrite_is_idempotent() {
        let once = finalize_sql("select 1 from information_schema.tables", SqlDialect::Sqlite);
        let twice = finalize_sql(&once, SqlDialect::Sqlite);
        assert_eq!(once, twice);
        assert_eq!(twice, SQLITE_LIST_TABLES);
    }

    #[test]
    fn rewrite_only_applies_to_sqlite() {
        let generated = "SELECT table_name FROM information_schema.tables";
        assert_eq!(
            finalize_sql(generated, SqlDialect::Postgres),
            "SELECT table_name FROM information_schema.tables;"
        );
    }

    #[test]
    fn document_query_with_filter() {
        let spec =
            parse_document_query(r#"{"collection":"users","filter":{"status":"active"}}"#).unwrap();
        assert_eq!(spec.collection, "users");
        assert_eq!(spec.filter, json!({"status": "active"}));
        assert_eq!(spec.raw, r#"{"collection":"users","filter":{"status":"active"}}"#);
    }

    #[test]
    fn document_query_defaults_missing_filter_to_empty() {
        let spec = parse_document_query(r#"{"collection":"orders"}"#).unwrap();
        assert_eq!(spec.collection, "orders");
        assert_eq!(spec.filter, json!({}));
    }

    #[test]
    fn document_query_strips_fences() {
        let spec =
            parse_document_query("```json\n{\"collection\":\"users\"}\n```").unwrap();
        assert_eq!(spec.collection, "users");
        assert_eq!(spec.raw, "{\"collection\":\"users\"}");
    }

    #[test]
    fn document_query_rejects_missing_collection() {
        assert!(parse_document_query(r#"{"filter":{}}"#).is_err());
    }

    #[test]
    fn document_query_rejects_non_json() {
        assert!(parse_document_query("db.users.find({})").is_err());
    }

    #[test]
    fn document_query_rejects_non_object_filter() {
        assert!(parse_document_query(r#"{"collection":"users","filter":[1,2]}"#).is_err());
    }
}
