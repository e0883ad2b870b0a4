use crate::dialect::SqlDialect;

/// System instruction for document-store targets: the model must answer
/// with a two-key JSON object and nothing else.
pub fn document_prompt() -> String {
    "You are an assistant that converts natural language questions into MongoDB find queries. \
     Respond with a JSON object with keys 'collection' and 'filter' only, without explanation."
        .to_string()
}

/// System instruction for relational targets.
///
/// The sqlite variant steers the model toward sqlite metadata syntax; when a
/// non-empty schema description is available it is appended verbatim so the
/// model can reference real table and column names.
pub fn sql_prompt(dialect: SqlDialect, schema_description: &str) -> String {
    let mut prompt = if dialect == SqlDialect::Sqlite {
        "You are an assistant that converts natural language questions into SQL queries for SQLite databases. \
         Use SQLite-specific syntax (e.g., pragma, sqlite_master) for metadata. \
         Respond with only the SQL query without explanation or formatting."
            .to_string()
    } else {
        "You are an assistant that converts natural language questions into SQL queries for SQL databases. \
         Respond with only the SQL query without explanation or formatting."
            .to_string()
    };

    if !schema_description.is_empty() {
        prompt.push_str(&format!(
            " This database has the following tables: {}",
            schema_description
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_prompt_mentions_sqlite_metadata() {
        let prompt = sql_prompt(SqlDialect::Sqlite, "");
        assert!(prompt.contains("SQLite"));
        assert!(prompt.contains("sqlite_master"));
    }

    #[test]
    fn generic_prompt_has_no_sqlite_steering() {
        let prompt = sql_prompt(SqlDialect::Postgres, "");
        assert!(!prompt.contains("sqlite_master"));
        assert!(prompt.contains("SQL queries"));
    }

    #[test]
    fn schema_description_is_appended_verbatim() {
        let prompt = sql_prompt(SqlDialect::Postgres, "users(id, name); orders(id, total)");
        assert!(prompt.ends_with(
            "This database has the following tables: users(id, name); orders(id, total)"
        ));
    }

    #[test]
    fn empty_schema_is_not_mentioned() {
        let prompt = sql_prompt(SqlDialect::Mysql, "");
        assert!(!prompt.contains("following tables"));
    }

    #[test]
    fn document_prompt_names_both_keys() {
        let prompt = document_prompt();
        assert!(prompt.contains("'collection'"));
        assert!(prompt.contains("'filter'"));
    }
}
