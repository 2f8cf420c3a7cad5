use bytes::BytesMut;
use chrono::NaiveDate;
use std::error::Error;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

use crate::types::Cell;

/// A typed bind parameter.
///
/// Placeholders are always rendered with an explicit cast (see [`SqlValue::cast`]), so the
/// server-side parameter type always matches the encoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    IntegerArray(Vec<i64>),
    TextArray(Vec<String>),
}

impl SqlValue {
    /// SQL type the placeholder is cast to. Nulls stay untyped so the server infers them from
    /// context.
    pub fn cast(&self) -> Option<&'static str> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(_) => Some("bigint"),
            SqlValue::Float(_) => Some("double precision"),
            SqlValue::Text(_) => Some("text"),
            SqlValue::Boolean(_) => Some("boolean"),
            SqlValue::Date(_) => Some("date"),
            SqlValue::IntegerArray(_) => Some("bigint[]"),
            SqlValue::TextArray(_) => Some("text[]"),
        }
    }
}

impl From<&Cell> for SqlValue {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Null => SqlValue::Null,
            Cell::Integer(value) => SqlValue::Integer(*value),
            Cell::Float(value) => SqlValue::Float(*value),
            Cell::Text(value) => SqlValue::Text(value.clone()),
            Cell::Boolean(value) => SqlValue::Boolean(*value),
            Cell::Date(value) => SqlValue::Date(*value),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Integer(value) => value.to_sql(ty, out),
            SqlValue::Float(value) => value.to_sql(ty, out),
            SqlValue::Text(value) => value.to_sql(ty, out),
            SqlValue::Boolean(value) => value.to_sql(ty, out),
            SqlValue::Date(value) => value.to_sql(ty, out),
            SqlValue::IntegerArray(values) => values.to_sql(ty, out),
            SqlValue::TextArray(values) => values.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
