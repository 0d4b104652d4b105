//! SQL statements issued by the fetcher.
//!
//! Identifiers are double-quoted with embedded quotes doubled; ids and
//! limits are always bound as parameters.

use replica_audit_core::{TableRef, ID_COLUMN};

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."table"`, or `"table"` without a schema.
pub fn qualified_table(table: &TableRef) -> String {
    match &table.schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&table.name)),
        None => quote_ident(&table.name),
    }
}

/// Point lookup of one row. `$1`: id.
pub fn point_lookup_query(table: &TableRef) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = $1::bigint LIMIT 1",
        qualified_table(table),
        quote_ident(ID_COLUMN)
    )
}

/// Highest ids, newest first. `$1`: limit.
pub fn latest_ids_query(table: &TableRef) -> String {
    let id = quote_ident(ID_COLUMN);
    format!(
        "SELECT {id} FROM {} ORDER BY {id} DESC LIMIT $1",
        qualified_table(table)
    )
}

/// Rows for a list of ids, newest first. `$1`: ids, `$2`: limit.
pub fn rows_by_ids_query(table: &TableRef) -> String {
    let id = quote_ident(ID_COLUMN);
    format!(
        "SELECT * FROM {} WHERE {id} = ANY($1::bigint[]) ORDER BY {id} DESC LIMIT $2",
        qualified_table(table)
    )
}

/// Newest value of the last-modified column.
pub fn max_timestamp_query(table: &TableRef, column: &str) -> String {
    format!(
        "SELECT MAX({}) FROM {}",
        quote_ident(column),
        qualified_table(table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_qualified_table() {
        assert_eq!(qualified_table(&TableRef::new("users")), "\"users\"");
        assert_eq!(
            qualified_table(&TableRef::new("users").with_schema("app")),
            "\"app\".\"users\""
        );
    }

    #[test]
    fn test_queries() {
        let table = TableRef::new("users");
        assert_eq!(
            point_lookup_query(&table),
            "SELECT * FROM \"users\" WHERE \"id\" = $1::bigint LIMIT 1"
        );
        assert_eq!(
            latest_ids_query(&table),
            "SELECT \"id\" FROM \"users\" ORDER BY \"id\" DESC LIMIT $1"
        );
        assert_eq!(
            rows_by_ids_query(&table),
            "SELECT * FROM \"users\" WHERE \"id\" = ANY($1::bigint[]) ORDER BY \"id\" DESC LIMIT $2"
        );
        assert_eq!(
            max_timestamp_query(&table, "updated_at"),
            "SELECT MAX(\"updated_at\") FROM \"users\""
        );
    }
}
