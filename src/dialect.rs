/// Relational query-language variants we phrase prompts and fixed queries for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Postgres,
    Mysql,
    Sqlite,
    Generic,
}

/// Backend family a connection URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectTarget {
    DocumentStore,
    Relational(SqlDialect),
}

/// Classifies a connection URL by its scheme prefix.
///
/// Total: anything unrecognized degrades to the generic relational dialect
/// and is handled without specialized prompting or fixed queries.
pub fn resolve(connection_url: &str) -> DialectTarget {
    let scheme = connection_url
        .split(':')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    if scheme.starts_with("mongodb") {
        DialectTarget::DocumentStore
    } else if scheme.starts_with("postgres") {
        DialectTarget::Relational(SqlDialect::Postgres)
    } else if scheme.starts_with("mysql") {
        DialectTarget::Relational(SqlDialect::Mysql)
    } else if scheme.starts_with("sqlite") {
        DialectTarget::Relational(SqlDialect::Sqlite)
    } else {
        DialectTarget::Relational(SqlDialect::Generic)
    }
}
