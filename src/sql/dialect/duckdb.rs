//! DuckDB dialect.

use super::SqlDialect;

/// DuckDB dialect - ANSI-flavored, nothing to override beyond the name.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }
}
