use crate::bail;
use crate::connection::TextRow;
use crate::error::{ErrorKind, IngestResult};

/// Parses a boolean rendered by Postgres, either `t`/`f` or `true`/`false`.
pub fn parse_bool(s: &str) -> IngestResult<bool> {
    match s {
        "t" | "true" => Ok(true),
        "f" | "false" => Ok(false),
        _ => bail!(
            ErrorKind::ConversionError,
            "Invalid boolean value",
            format!("Boolean value must be 't', 'f', 'true' or 'false' (received: {s})")
        ),
    }
}

pub fn parse_i64(s: &str) -> IngestResult<i64> {
    Ok(s.trim().parse::<i64>()?)
}

/// Returns the non-null text at `index` of `row`.
pub fn required_text<'a>(row: &'a TextRow, index: usize, column: &str) -> IngestResult<&'a str> {
    match row.get(index) {
        Some(Some(value)) => Ok(value.as_str()),
        Some(None) => bail!(
            ErrorKind::InvalidData,
            "Unexpected null in query result",
            format!("Column '{column}' is null")
        ),
        None => bail!(
            ErrorKind::InvalidData,
            "Query result has too few columns",
            format!("Column '{column}' is missing at position {index}")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_boolean_spellings() {
        assert!(parse_bool("t").unwrap());
        assert!(parse_bool("true").unwrap());
        assert!(!parse_bool("f").unwrap());
        assert!(!parse_bool("false").unwrap());

        let err = parse_bool("yes").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }

    #[test]
    fn parses_integers() {
        assert_eq!(parse_i64(" 42").unwrap(), 42);
        assert_eq!(parse_i64("x").unwrap_err().kind(), ErrorKind::ConversionError);
    }

    #[test]
    fn required_text_rejects_nulls_and_short_rows() {
        let row: TextRow = vec![Some("a".to_owned()), None];

        assert_eq!(required_text(&row, 0, "first").unwrap(), "a");
        assert_eq!(
            required_text(&row, 1, "second").unwrap_err().kind(),
            ErrorKind::InvalidData
        );
        assert_eq!(
            required_text(&row, 2, "third").unwrap_err().kind(),
            ErrorKind::InvalidData
        );
    }
}
