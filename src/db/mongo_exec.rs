use futures::TryStreamExt;
use mongodb::Client;
use mongodb::bson::{self, Document};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

use super::{ExecError, ResultRow};
use crate::sanitize::DocumentQuerySpec;

/// Runs a find-style query against the collection named by `spec`, on the
/// database named by the URI's path component.
///
/// Returns all matching documents as-is plus the sorted union of keys seen
/// across them.
pub async fn execute(
    connection_url: &str,
    spec: &DocumentQuerySpec,
) -> Result<(Vec<String>, Vec<ResultRow>), ExecError> {
    let db_name = database_name(connection_url)
        .ok_or_else(|| ExecError::Connect("no database name in connection URL".to_string()))?;

    let client = Client::with_uri_str(connection_url)
        .await
        .map_err(|e| ExecError::Connect(e.to_string()))?;

    let filter = bson::to_document(&spec.filter)
        .map_err(|e| ExecError::Execute(format!("invalid filter document: {}", e)))?;

    debug!(
        "Running find on {}.{} with filter {}",
        db_name, spec.collection, filter
    );

    let mut cursor = client
        .database(&db_name)
        .collection::<Document>(&spec.collection)
        .find(filter, None)
        .await
        .map_err(|e| ExecError::Execute(e.to_string()))?;

    let mut rows: Vec<ResultRow> = Vec::new();
    let mut keys: BTreeSet<String> = BTreeSet::new();

    while let Some(doc) = cursor
        .try_next()
        .await
        .map_err(|e| ExecError::Execute(e.to_string()))?
    {
        let value =
            serde_json::to_value(&doc).map_err(|e| ExecError::Execute(e.to_string()))?;
        if let Value::Object(map) = value {
            keys.extend(map.keys().cloned());
            rows.push(map);
        }
    }

    Ok((keys.into_iter().collect(), rows))
}

fn database_name(connection_url: &str) -> Option<String> {
    let url = Url::parse(connection_url).ok()?;
    let name = url.path().trim_start_matches('/').to_string();
    if name.is_empty() { None } else { Some(name) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_name_comes_from_the_path() {
        assert_eq!(
            database_name("mongodb://localhost/testdb"),
            Some("testdb".to_string())
        );
        assert_eq!(
            database_name("mongodb://u:p@host:27017/app?retryWrites=true"),
            Some("app".to_string())
        );
    }

    #[test]
    fn missing_database_name_is_rejected() {
        assert_eq!(database_name("mongodb://localhost"), None);
        assert_eq!(database_name("mongodb://localhost/"), None);
        assert_eq!(database_name("not a url"), None);
    }
}
