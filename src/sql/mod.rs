//! SQL generation via token streams.
//!
//! Statements are built as typed ASTs, lowered to a [`token::TokenStream`],
//! then serialized for a [`dialect::Dialect`]. Tokens are the single point
//! where identifier quoting and literal escaping happen, so the builders
//! above never concatenate strings.

pub mod ddl;
pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

pub use ddl::{CreateTableAs, CreateViewAs, DropTable, DropView};
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    avg, col, count, count_distinct, count_star, func, lit_bool, lit_float, lit_int, lit_null,
    lit_str, max, min, star, sum, table_col, table_star, BinaryOperator, Expr, ExprExt, Literal,
    UnaryOperator,
};
pub use query::{Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
