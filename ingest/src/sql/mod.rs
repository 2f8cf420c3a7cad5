//! Intermediate representation of the statements issued by the engine.
//!
//! Identifiers are quoted with [`pg_escape::quote_identifier`] and every data value travels as
//! a typed bind parameter, so the shape of each statement can be checked without a database.

mod builders;
mod statement;
mod value;

pub use builders::*;
pub use statement::{Predicate, Statement, StatementBuilder};
pub use value::SqlValue;
