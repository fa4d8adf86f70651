//! SQL dialect definitions and formatting rules.
//!
//! A trait-based abstraction over the handful of syntax differences the
//! builder cares about: identifier quoting, boolean literals, pagination,
//! string concatenation. The default implementations follow ANSI SQL;
//! each dialect overrides what it must.

mod duckdb;
mod postgres;
mod sqlite;

pub use duckdb::DuckDb;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use super::token::{Token, TokenStream};

/// SQL dialect trait - defines how SQL constructs are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    ///
    /// All supported dialects use ANSI double quotes.
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a string literal.
    ///
    /// Single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// String concatenation operator.
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Emit LIMIT/OFFSET or equivalent pagination clause.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        let mut ts = TokenStream::new();

        if let Some(lim) = limit {
            ts.push(Token::Limit)
                .space()
                .push(Token::LitInt(lim as i64));
        }

        if let Some(off) = offset {
            if limit.is_some() {
                ts.space();
            }
            ts.push(Token::Offset)
                .space()
                .push(Token::LitInt(off as i64));
        }

        ts
    }

    /// Whether `CREATE OR REPLACE VIEW` is supported.
    ///
    /// SQLite only has `CREATE VIEW IF NOT EXISTS`; we drop-and-create there.
    fn supports_create_or_replace_view(&self) -> bool {
        true
    }
}

/// Supported dialects as a copyable enum.
///
/// Use [`Dialect::as_dialect`] to get trait-object behavior when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// SQLite - the original warehouse target for local catalogs.
    #[default]
    Sqlite,
    /// DuckDB - local analytics.
    DuckDb,
    /// PostgreSQL.
    Postgres,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn as_dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::DuckDb => &DuckDb,
            Dialect::Postgres => &Postgres,
        }
    }

    /// Parse a dialect name as written in configuration files.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sqlite" => Some(Dialect::Sqlite),
            "duckdb" => Some(Dialect::DuckDb),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            _ => None,
        }
    }
}

// Delegate the trait through the enum so call sites can use either form.
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.as_dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.as_dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.as_dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.as_dialect().format_bool(b)
    }

    fn concat_operator(&self) -> &'static str {
        self.as_dialect().concat_operator()
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.as_dialect().emit_limit_offset(limit, offset)
    }

    fn supports_create_or_replace_view(&self) -> bool {
        self.as_dialect().supports_create_or_replace_view()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
