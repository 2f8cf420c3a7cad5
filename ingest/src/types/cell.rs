use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::SemanticType;

/// A single value in an incoming dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Semantic type of the value, [`None`] for null.
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self {
            Cell::Null => None,
            Cell::Integer(_) => Some(SemanticType::Integer),
            Cell::Float(_) => Some(SemanticType::Float),
            Cell::Boolean(_) => Some(SemanticType::Boolean),
            Cell::Date(_) => Some(SemanticType::Date),
            Cell::Text(_) => Some(SemanticType::Text),
        }
    }

    /// Returns the value as an integer key if it holds one.
    ///
    /// Floats with no fractional part are accepted, since loosely typed sources tend to emit
    /// `3.0` for integer ids.
    pub fn as_key(&self) -> Option<i64> {
        match self {
            Cell::Integer(value) => Some(*value),
            Cell::Float(value) if value.fract() == 0.0 && value.is_finite() => Some(*value as i64),
            _ => None,
        }
    }

    /// Postgres text representation of the value, [`None`] for null.
    ///
    /// Non-finite floats use the spellings Postgres accepts (`NaN`, `Infinity`, `-Infinity`).
    pub fn render_text(&self) -> Option<String> {
        let text = match self {
            Cell::Null => return None,
            Cell::Integer(value) => value.to_string(),
            Cell::Float(value) if value.is_nan() => "NaN".to_owned(),
            Cell::Float(value) if value.is_infinite() && *value > 0.0 => "Infinity".to_owned(),
            Cell::Float(value) if value.is_infinite() => "-Infinity".to_owned(),
            Cell::Float(value) => value.to_string(),
            Cell::Boolean(true) => "t".to_owned(),
            Cell::Boolean(false) => "f".to_owned(),
            Cell::Date(value) => value.format("%Y-%m-%d").to_string(),
            Cell::Text(value) => value.clone(),
        };

        Some(text)
    }

    /// Converts the value to `target`, following [`SemanticType::widen`].
    ///
    /// Null stays null. Values that `target` cannot hold directly are rendered as text.
    pub fn widened_to(self, target: SemanticType) -> Cell {
        match (self, target) {
            (Cell::Null, _) => Cell::Null,
            (Cell::Integer(value), SemanticType::Float) => Cell::Float(value as f64),
            (Cell::Boolean(value), SemanticType::Integer) => Cell::Integer(i64::from(value)),
            (Cell::Boolean(value), SemanticType::Float) => Cell::Float(f64::from(u8::from(value))),
            (cell, SemanticType::Text) => match cell.render_text() {
                Some(text) => Cell::Text(text),
                None => Cell::Null,
            },
            (cell, _) => cell,
        }
    }

    /// Converts a JSON scalar into a cell. Nested arrays and objects are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Cell {
        match value {
            serde_json::Value::Null => Cell::Null,
            serde_json::Value::Bool(value) => Cell::Boolean(*value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Cell::Integer(value),
                None => number.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            serde_json::Value::String(value) => Cell::Text(value.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Boolean(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_scalars_become_cells() {
        assert_eq!(Cell::from_json(&json!(null)), Cell::Null);
        assert_eq!(Cell::from_json(&json!(3)), Cell::Integer(3));
        assert_eq!(Cell::from_json(&json!(1.5)), Cell::Float(1.5));
        assert_eq!(Cell::from_json(&json!(true)), Cell::Boolean(true));
        assert_eq!(Cell::from_json(&json!("a")), Cell::Text("a".to_owned()));
        assert_eq!(
            Cell::from_json(&json!([1, 2])),
            Cell::Text("[1,2]".to_owned())
        );
    }

    #[test]
    fn text_rendering() {
        assert_eq!(Cell::Null.render_text(), None);
        assert_eq!(Cell::Float(1.5).render_text().unwrap(), "1.5");
        assert_eq!(Cell::Float(f64::NEG_INFINITY).render_text().unwrap(), "-Infinity");
        assert_eq!(Cell::Boolean(false).render_text().unwrap(), "f");
        assert_eq!(
            Cell::Date(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap())
                .render_text()
                .unwrap(),
            "2020-03-01"
        );
    }

    #[test]
    fn widening_converts_values() {
        assert_eq!(Cell::Integer(2).widened_to(SemanticType::Float), Cell::Float(2.0));
        assert_eq!(Cell::Boolean(true).widened_to(SemanticType::Integer), Cell::Integer(1));
        assert_eq!(Cell::Boolean(false).widened_to(SemanticType::Float), Cell::Float(0.0));
        assert_eq!(
            Cell::Date(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()).widened_to(SemanticType::Text),
            Cell::Text("2020-03-01".to_owned())
        );
        assert_eq!(Cell::Null.widened_to(SemanticType::Text), Cell::Null);
        assert_eq!(Cell::Float(1.5).widened_to(SemanticType::Float), Cell::Float(1.5));
    }

    #[test]
    fn integral_floats_are_keys() {
        assert_eq!(Cell::Float(3.0).as_key(), Some(3));
        assert_eq!(Cell::Float(3.5).as_key(), None);
        assert_eq!(Cell::Text("3".to_owned()).as_key(), None);
        assert_eq!(Cell::Null.as_key(), None);
    }
}
