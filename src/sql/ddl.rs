//! DDL statement builders for materialization.
//!
//! CREATE TABLE AS / CREATE VIEW AS plus the matching DROP statements.
//! The select body is carried as pre-rendered SQL so a compiled query can
//! be materialized without re-threading its AST through the builder.

use super::dialect::{Dialect, SqlDialect};
use super::token::{Token, TokenStream};

/// CREATE TABLE <name> AS <select>.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableAs {
    pub schema: Option<String>,
    pub name: String,
    pub select: String,
}

impl CreateTableAs {
    pub fn new(schema: Option<&str>, name: &str, select: &str) -> Self {
        CreateTableAs {
            schema: schema.map(Into::into),
            name: name.into(),
            select: select.into(),
        }
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Create)
            .space()
            .push(Token::Table)
            .space()
            .push(Token::QualifiedIdent {
                schema: self.schema.clone(),
                name: self.name.clone(),
            })
            .space()
            .push(Token::As)
            .newline()
            .push(Token::Raw(self.select.clone()));
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens().serialize(dialect)
    }
}

/// CREATE [OR REPLACE] VIEW <name> AS <select>.
///
/// OR REPLACE is emitted only where the dialect supports it; callers on
/// other dialects pair this with [`DropView`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateViewAs {
    pub schema: Option<String>,
    pub name: String,
    pub select: String,
    pub or_replace: bool,
}

impl CreateViewAs {
    pub fn new(schema: Option<&str>, name: &str, select: &str) -> Self {
        CreateViewAs {
            schema: schema.map(Into::into),
            name: name.into(),
            select: select.into(),
            or_replace: false,
        }
    }

    pub fn or_replace(mut self) -> Self {
        self.or_replace = true;
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Create).space();
        if self.or_replace && dialect.supports_create_or_replace_view() {
            ts.push(Token::Or).space().push(Token::Replace).space();
        }
        ts.push(Token::View)
            .space()
            .push(Token::QualifiedIdent {
                schema: self.schema.clone(),
                name: self.name.clone(),
            })
            .space()
            .push(Token::As)
            .newline()
            .push(Token::Raw(self.select.clone()));
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

/// DROP TABLE [IF EXISTS] <name>.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub schema: Option<String>,
    pub name: String,
    pub if_exists: bool,
}

impl DropTable {
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        DropTable {
            schema: schema.map(Into::into),
            name: name.into(),
            if_exists: false,
        }
    }

    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Drop).space().push(Token::Table).space();
        if self.if_exists {
            ts.push(Token::If)
                .space()
                .push(Token::Exists)
                .space();
        }
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.name.clone(),
        });
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens().serialize(dialect)
    }
}

/// DROP VIEW [IF EXISTS] <name>.
#[derive(Debug, Clone, PartialEq)]
pub struct DropView {
    pub schema: Option<String>,
    pub name: String,
    pub if_exists: bool,
}

impl DropView {
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        DropView {
            schema: schema.map(Into::into),
            name: name.into(),
            if_exists: false,
        }
    }

    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Drop).space().push(Token::View).space();
        if self.if_exists {
            ts.push(Token::If)
                .space()
                .push(Token::Exists)
                .space();
        }
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.name.clone(),
        });
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens().serialize(dialect)
    }
}
