pub mod introspect;
pub mod mongo_exec;
pub mod sql_exec;

use std::error::Error;
use std::fmt;

/// One result record: column/field name mapped to a JSON-representable value.
pub type ResultRow = serde_json::Map<String, serde_json::Value>;

/// Executor failure taxonomy. Both variants are recoverable per-request.
#[derive(Debug)]
pub enum ExecError {
    /// Could not reach the backend at all.
    Connect(String),
    /// Backend reachable, statement or query rejected.
    Execute(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Connect(msg) => write!(f, "connection error: {}", msg),
            ExecError::Execute(msg) => write!(f, "execution error: {}", msg),
        }
    }
}

impl Error for ExecError {}
