use std::fmt;

use pg_escape::quote_identifier;
use serde::{Deserialize, Serialize};

/// Fully qualified Postgres table name.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    /// The schema containing the table.
    pub schema: String,
    /// The name of the table within the schema.
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns the table name as a properly quoted Postgres identifier.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Quotes a column reference qualified by a table alias, e.g. `base."GDP"`.
///
/// Aliases are generated by the engine and never need quoting.
pub fn qualified_column(alias: &str, column: &str) -> String {
    format!("{alias}.{}", quote_identifier(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_only_when_needed() {
        let table = TableName::new("prod", "country_month");
        assert_eq!(table.as_quoted_identifier(), "prod.country_month");

        let table = TableName::new("prod", "Weird Name");
        assert_eq!(table.as_quoted_identifier(), "prod.\"Weird Name\"");
    }

    #[test]
    fn display_is_unquoted() {
        assert_eq!(TableName::new("public", "tbl_ab").to_string(), "public.tbl_ab");
    }

    #[test]
    fn qualified_column_quotes_mixed_case() {
        assert_eq!(qualified_column("base", "GDP"), "base.\"GDP\"");
        assert_eq!(qualified_column("nnew", "gdp"), "nnew.gdp");
    }
}
