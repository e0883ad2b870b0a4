use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use tracing::{info, warn};

use crate::db::{self, ExecError, ResultRow};
use crate::dialect::{self, DialectTarget, SqlDialect};
use crate::history::HistoryStore;
use crate::llm::{LlmManager, prompt};
use crate::sanitize;

#[derive(Debug, Deserialize, Clone)]
pub struct QueryRequest {
    pub question: String,
    pub connection_url: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// The finalized query text that was actually executed: a SQL string,
    /// or for document stores the raw JSON query spec from the model.
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
}

/// Stage-specific failures, each mapped to exactly one HTTP status/detail
/// pair at the web boundary.
#[derive(Debug)]
pub enum PipelineError {
    /// The completion service failed before structural parsing. 500.
    ModelGeneration(String),
    /// Model output failed to parse into the expected structure. 500.
    QueryGeneration(String),
    /// Could not reach the target database/document-store. 400.
    Connection(String),
    /// Backend reachable, statement rejected. 400.
    Execution(String),
}

impl PipelineError {
    pub fn detail(&self) -> &str {
        match self {
            PipelineError::ModelGeneration(msg)
            | PipelineError::QueryGeneration(msg)
            | PipelineError::Connection(msg)
            | PipelineError::Execution(msg) => msg,
        }
    }

    /// True for user-correctable errors (bad query, unreachable target).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Connection(_) | PipelineError::Execution(_)
        )
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail())
    }
}

impl Error for PipelineError {}

static LIST_TABLES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:list|show)\b.*\btables?\b").unwrap());

/// Questions like "list tables" / "show me all the tables in db" skip the
/// model and run a fixed dialect-specific query instead.
fn is_list_tables_question(question: &str) -> bool {
    LIST_TABLES_RE.is_match(question)
}

/// Fixed table-listing statement per dialect. Generic dialects have no
/// shortcut and always go through the model.
fn list_tables_sql(dialect: SqlDialect) -> Option<&'static str> {
    match dialect {
        SqlDialect::Postgres => {
            Some("SELECT table_name FROM information_schema.tables WHERE table_schema='public';")
        }
        SqlDialect::Mysql => Some("SHOW TABLES;"),
        SqlDialect::Sqlite => Some(sanitize::SQLITE_LIST_TABLES),
        SqlDialect::Generic => None,
    }
}

/// Substrings that mark an execution error as "relation/table not found".
/// Best-effort heuristic across backends, not a contract; backend versions
/// are free to rephrase.
const MISSING_RELATION_MARKERS: &[&str] = &["does not exist", "UndefinedTable", "no such table"];

fn is_missing_relation(message: &str) -> bool {
    MISSING_RELATION_MARKERS.iter().any(|m| message.contains(m))
}

/// End-to-end pipeline for one request: dialect resolution, prompt + model
/// (unless short-circuited), sanitization, execution, then a best-effort
/// history append.
pub async fn run_query(
    llm: &LlmManager,
    history: &HistoryStore,
    req: &QueryRequest,
) -> Result<QueryResponse, PipelineError> {
    let target = dialect::resolve(&req.connection_url);
    info!("Resolved {:?} for question: {}", target, req.question);

    let response = match target {
        DialectTarget::DocumentStore => run_document_query(llm, req).await?,
        DialectTarget::Relational(d) => run_sql_query(llm, req, d).await?,
    };

    // Intentional best-effort write: the result is inspected only to log.
    if let Err(e) = history
        .append(&req.question, &response.sql, &response.rows)
        .await
    {
        warn!("History append failed, response unaffected: {}", e);
    }

    Ok(response)
}

async fn run_document_query(
    llm: &LlmManager,
    req: &QueryRequest,
) -> Result<QueryResponse, PipelineError> {
    let raw = llm
        .complete(&prompt::document_prompt(), &req.question)
        .await
        .map_err(|e| {
            PipelineError::ModelGeneration(format!("Error generating MongoDB query: {}", e))
        })?;

    let spec = sanitize::parse_document_query(&raw).map_err(|e| {
        PipelineError::QueryGeneration(format!("Error generating MongoDB query: {}", e))
    })?;

    let (columns, rows) = db::mongo_exec::execute(&req.connection_url, &spec)
        .await
        .map_err(|e| match e {
            ExecError::Connect(m) => {
                PipelineError::Connection(format!("MongoDB execution error: {}", m))
            }
            ExecError::Execute(m) => {
                PipelineError::Execution(format!("MongoDB execution error: {}", m))
            }
        })?;

    Ok(QueryResponse {
        sql: spec.raw,
        columns,
        rows,
    })
}

async fn run_sql_query(
    llm: &LlmManager,
    req: &QueryRequest,
    dialect: SqlDialect,
) -> Result<QueryResponse, PipelineError> {
    if is_list_tables_question(&req.question) {
        if let Some(fixed) = list_tables_sql(dialect) {
            info!("List-tables shortcut, skipping generation: {}", fixed);
            let (columns, rows) = db::sql_exec::execute(&req.connection_url, fixed)
                .await
                .map_err(|e| match e {
                    ExecError::Connect(m) => PipelineError::Connection(format!(
                        "Error executing list tables query: {}",
                        m
                    )),
                    ExecError::Execute(m) => PipelineError::Execution(format!(
                        "Error executing list tables query: {}",
                        m
                    )),
                })?;

            return Ok(QueryResponse {
                sql: fixed.to_string(),
                columns,
                rows,
            });
        }
    }

    let schema = db::introspect::introspect(&req.connection_url, dialect).await;

    let system_prompt = prompt::sql_prompt(dialect, &schema.describe());
    let raw = llm
        .complete(&system_prompt, &req.question)
        .await
        .map_err(|e| PipelineError::ModelGeneration(format!("Error generating SQL: {}", e)))?;

    let sql = sanitize::finalize_sql(&raw, dialect);
    info!("Finalized SQL: {}", sql);

    match db::sql_exec::execute(&req.connection_url, &sql).await {
        Ok((columns, rows)) => Ok(QueryResponse { sql, columns, rows }),
        Err(ExecError::Connect(m)) => {
            Err(PipelineError::Connection(format!("SQL execution error: {}", m)))
        }
        Err(ExecError::Execute(m)) => {
            if is_missing_relation(&m) && !schema.is_empty() {
                Err(PipelineError::Execution(format!(
                    "{}. Available tables: {}",
                    m,
                    schema.table_names().join(", ")
                )))
            } else {
                Err(PipelineError::Execution(format!("SQL execution error: {}", m)))
            }
        }
    }
}
