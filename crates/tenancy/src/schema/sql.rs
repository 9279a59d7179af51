//! PostgreSQL statement rendering for tenant schemas.
//!
//! Only validated identifiers reach these functions, and they are still
//! double-quote escaped. Values (schema names in catalog lookups, table names,
//! prefixes) are never rendered into SQL; the catalog queries take them as
//! bound parameters.

use super::identifier::{CONTROL_PLANE_SCHEMA, TenantSchema};

/// `SELECT EXISTS` over `information_schema.schemata`; `$1` is the schema name.
pub const SCHEMA_EXISTS_SQL: &str =
    "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)";

/// `SELECT EXISTS` over `information_schema.tables`; `$1` schema, `$2` table.
pub const TABLE_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM information_schema.tables \
     WHERE table_schema = $1 AND table_name = $2)";

/// Lists schema names matching the `LIKE` pattern bound to `$1`.
pub const LIST_SCHEMAS_SQL: &str = "SELECT schema_name FROM information_schema.schemata \
     WHERE schema_name LIKE $1 ORDER BY schema_name";

/// Non-blocking, session-scoped advisory lock attempt; `$1` is the key.
pub const TRY_ADVISORY_LOCK_SQL: &str = "SELECT pg_try_advisory_lock($1)";

/// Releases a session-scoped advisory lock; `$1` is the key.
pub const ADVISORY_UNLOCK_SQL: &str = "SELECT pg_advisory_unlock($1)";

/// Quotes an identifier for inclusion in SQL text.
pub fn quote_identifier(id: &str) -> String {
    format!("\"{}\"", id.replace('"', "\"\""))
}

/// `CREATE SCHEMA IF NOT EXISTS "<schema>"`.
pub fn create_schema(schema: &TenantSchema) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(schema.as_str()))
}

/// `DROP SCHEMA IF EXISTS "<schema>" CASCADE`.
pub fn drop_schema(schema: &TenantSchema) -> String {
    format!(
        "DROP SCHEMA IF EXISTS {} CASCADE",
        quote_identifier(schema.as_str())
    )
}

/// Scopes the search path to the tenant schema for the current transaction.
///
/// The control-plane schema stays on the path after the tenant schema so that
/// extension functions installed there keep resolving.
pub fn set_local_search_path(schema: &TenantSchema) -> String {
    format!(
        "SET LOCAL search_path TO {}, {}",
        quote_identifier(schema.as_str()),
        quote_identifier(CONTROL_PLANE_SCHEMA)
    )
}

/// Session-level variant of [`set_local_search_path`], for migration runners
/// that operate outside an explicit transaction.
///
/// The setting lasts until [`reset_search_path`] or until the pool recycles
/// the connection, which resets all session state.
pub fn set_search_path(schema: &TenantSchema) -> String {
    format!(
        "SET search_path TO {}, {}",
        quote_identifier(schema.as_str()),
        quote_identifier(CONTROL_PLANE_SCHEMA)
    )
}

/// Restores the session's default search path.
pub fn reset_search_path() -> &'static str {
    "RESET search_path"
}

/// Builds the `LIKE` pattern matching every schema that starts with `prefix`.
///
/// `_` and `%` are wildcards in `LIKE`, so they are escaped.
pub fn prefix_like_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '_' | '%' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> TenantSchema {
        TenantSchema::parse("t_acme").unwrap()
    }

    #[test]
    fn test_create_schema_sql() {
        assert_eq!(create_schema(&acme()), "CREATE SCHEMA IF NOT EXISTS \"t_acme\"");
    }

    #[test]
    fn test_drop_schema_sql() {
        assert_eq!(drop_schema(&acme()), "DROP SCHEMA IF EXISTS \"t_acme\" CASCADE");
    }

    #[test]
    fn test_search_path_sql() {
        assert_eq!(
            set_local_search_path(&acme()),
            "SET LOCAL search_path TO \"t_acme\", \"public\""
        );
        assert_eq!(
            set_search_path(&acme()),
            "SET search_path TO \"t_acme\", \"public\""
        );
        assert_eq!(reset_search_path(), "RESET search_path");
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier("test\"schema"), "\"test\"\"schema\"");
    }

    #[test]
    fn test_prefix_like_pattern() {
        assert_eq!(prefix_like_pattern("t_"), "t\\_%");
        assert_eq!(prefix_like_pattern("org"), "org%");
        assert_eq!(prefix_like_pattern(""), "%");
    }

    #[test]
    fn test_catalog_queries_use_parameters() {
        assert!(SCHEMA_EXISTS_SQL.contains("$1"));
        assert!(TABLE_EXISTS_SQL.contains("$1") && TABLE_EXISTS_SQL.contains("$2"));
        assert!(LIST_SCHEMAS_SQL.contains("LIKE $1"));
    }
}
