//! SELECT query builder.
//!
//! A fluent builder over the token stream for the read-side statements the
//! compiler emits. Rendering is deterministic: one select item per line,
//! clauses on their own lines, two-space indentation.

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::token::{Token, TokenStream};

/// A SELECT list item: expression with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        SelectExpr { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: &str) -> Self {
        SelectExpr {
            expr,
            alias: Some(alias.into()),
        }
    }

    fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        if let Some(alias) = &self.alias {
            ts.space().push(Token::As).space();
            ts.push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

/// A table reference with optional schema and alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        TableRef {
            schema: None,
            table: table.into(),
            alias: None,
        }
    }

    pub fn with_schema(schema: &str, table: &str) -> Self {
        TableRef {
            schema: Some(schema.into()),
            table: table.into(),
            alias: None,
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });
        if let Some(alias) = &self.alias {
            ts.space().push(Token::As).space();
            ts.push(Token::Ident(alias.clone()));
        }
        ts
    }
}

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Option<Expr>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// An ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
}

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub distinct: bool,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    /// Add a select item.
    pub fn select(mut self, item: impl Into<SelectExpr>) -> Self {
        self.select.push(item.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Option<Expr>) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on,
        });
        self
    }

    pub fn inner_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Inner, table, Some(on))
    }

    pub fn left_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Left, table, Some(on))
    }

    /// Add a WHERE predicate. Multiple calls AND-combine.
    pub fn filter(mut self, predicate: Expr) -> Self {
        use super::expr::ExprExt;
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    /// Add a HAVING predicate. Multiple calls AND-combine.
    pub fn having(mut self, predicate: Expr) -> Self {
        use super::expr::ExprExt;
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn order_by(mut self, expr: Expr, dir: SortDir) -> Self {
        self.order_by.push(OrderByExpr { expr, dir });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Convert to tokens for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.newline().indent(1);
            ts.append(&item.to_tokens(dialect));
        }

        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space();
            ts.append(&from.to_tokens());
        }

        for join in &self.joins {
            ts.newline();
            match join.join_type {
                JoinType::Inner => ts.push(Token::Inner),
                JoinType::Left => ts.push(Token::Left),
            };
            ts.space().push(Token::Join).space();
            ts.append(&join.table.to_tokens());
            if let Some(on) = &join.on {
                ts.space().push(Token::On).space();
                ts.append(&on.to_tokens_for_dialect(dialect));
            }
        }

        if let Some(predicate) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&predicate.to_tokens_for_dialect(dialect));
        }

        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy);
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma();
                }
                ts.space();
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }
        }

        if let Some(predicate) = &self.having {
            ts.newline().push(Token::Having).space();
            ts.append(&predicate.to_tokens_for_dialect(dialect));
        }

        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy);
            for (i, item) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma();
                }
                ts.space();
                ts.append(&item.expr.to_tokens_for_dialect(dialect));
                ts.space().push(match item.dir {
                    SortDir::Asc => Token::Asc,
                    SortDir::Desc => Token::Desc,
                });
            }
        }

        if self.limit.is_some() || self.offset.is_some() {
            ts.newline();
            ts.append(&dialect.emit_limit_offset(self.limit, self.offset));
        }

        ts
    }

    /// Serialize to SQL for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}
