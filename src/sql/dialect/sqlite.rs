//! SQLite dialect.

use super::SqlDialect;

/// SQLite dialect.
///
/// ANSI quoting throughout; views cannot be replaced in place.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_create_or_replace_view(&self) -> bool {
        false
    }
}
