use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sql::SqlValue;

/// Semantic type of a column, as far as reconciliation and zero values are concerned.
///
/// Incoming types are inferred from values, destination types are derived from the declared
/// Postgres data type. Postgres types outside these five (geometries, json, arrays, ...) have no
/// semantic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Integer,
    Float,
    Text,
    Boolean,
    Date,
}

impl SemanticType {
    /// Maps an `information_schema.columns.data_type` value to a semantic type.
    pub fn from_pg_data_type(data_type: &str) -> Option<SemanticType> {
        let semantic_type = match data_type.trim().to_lowercase().as_str() {
            "smallint" | "integer" | "bigint" | "int2" | "int4" | "int8" => SemanticType::Integer,
            "real" | "double precision" | "numeric" | "decimal" | "float4" | "float8" => {
                SemanticType::Float
            }
            "text" | "character varying" | "character" | "varchar" | "char" | "bpchar"
            | "name" | "citext" => SemanticType::Text,
            "boolean" | "bool" => SemanticType::Boolean,
            "date" | "timestamp without time zone" | "timestamp with time zone" | "timestamp"
            | "timestamptz" => SemanticType::Date,
            _ => return None,
        };

        Some(semantic_type)
    }

    /// Postgres type used for staging columns and for casting bind parameters.
    pub fn sql_type(&self) -> &'static str {
        match self {
            SemanticType::Integer => "bigint",
            SemanticType::Float => "double precision",
            SemanticType::Text => "text",
            SemanticType::Boolean => "boolean",
            SemanticType::Date => "date",
        }
    }

    /// Common type of two value types, used to stage a column holding both.
    ///
    /// Integers widen to floats and booleans to integers or floats. Any other mix is staged as
    /// text.
    pub fn widen(self, other: SemanticType) -> SemanticType {
        use SemanticType::*;

        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            (Boolean, Integer) | (Integer, Boolean) => Integer,
            (Boolean, Float) | (Float, Boolean) => Float,
            _ => Text,
        }
    }

    /// The canonical zero value: `0`, `0.0`, the empty string, `false` or the epoch date.
    pub fn zero_value(&self) -> SqlValue {
        match self {
            SemanticType::Integer => SqlValue::Integer(0),
            SemanticType::Float => SqlValue::Float(0.0),
            SemanticType::Text => SqlValue::Text(String::new()),
            SemanticType::Boolean => SqlValue::Boolean(false),
            SemanticType::Date => SqlValue::Date(NaiveDate::default()),
        }
    }
}

/// Zero value for an optional semantic type. Unknown types have no zero value and are wiped
/// to null instead.
pub(crate) fn zero_value_of(semantic_type: Option<SemanticType>) -> SqlValue {
    semantic_type
        .map(|semantic_type| semantic_type.zero_value())
        .unwrap_or(SqlValue::Null)
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::Text => "text",
            SemanticType::Boolean => "boolean",
            SemanticType::Date => "date",
        };

        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_information_schema_types() {
        assert_eq!(
            SemanticType::from_pg_data_type("bigint"),
            Some(SemanticType::Integer)
        );
        assert_eq!(
            SemanticType::from_pg_data_type("double precision"),
            Some(SemanticType::Float)
        );
        assert_eq!(
            SemanticType::from_pg_data_type("character varying"),
            Some(SemanticType::Text)
        );
        assert_eq!(
            SemanticType::from_pg_data_type("timestamp without time zone"),
            Some(SemanticType::Date)
        );
        assert_eq!(SemanticType::from_pg_data_type("USER-DEFINED"), None);
        assert_eq!(SemanticType::from_pg_data_type("jsonb"), None);
    }

    #[test]
    fn widening_is_symmetric() {
        use SemanticType::*;

        let cases = [
            (Integer, Integer, Integer),
            (Integer, Float, Float),
            (Boolean, Integer, Integer),
            (Boolean, Float, Float),
            (Date, Text, Text),
            (Date, Integer, Text),
            (Boolean, Text, Text),
        ];
        for (a, b, expected) in cases {
            assert_eq!(a.widen(b), expected, "{a} with {b}");
            assert_eq!(b.widen(a), expected, "{b} with {a}");
        }
    }

    #[test]
    fn zero_values_per_type() {
        assert_eq!(SemanticType::Integer.zero_value(), SqlValue::Integer(0));
        assert_eq!(SemanticType::Float.zero_value(), SqlValue::Float(0.0));
        assert_eq!(SemanticType::Text.zero_value(), SqlValue::Text(String::new()));
        assert_eq!(SemanticType::Boolean.zero_value(), SqlValue::Boolean(false));
        assert_eq!(
            SemanticType::Date.zero_value(),
            SqlValue::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
        );
        assert_eq!(zero_value_of(None), SqlValue::Null);
    }
}
