use pg_escape::quote_identifier;
use tokio_postgres::types::ToSql;

use crate::sql::SqlValue;

/// A SQL statement together with its bind parameters, `$1` being `params[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// A statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Statement {
        Statement {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn params_as_sql(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|param| param as &(dyn ToSql + Sync))
            .collect()
    }
}

/// Accumulates SQL text and numbers bind parameters as they are added.
#[derive(Debug, Default)]
pub struct StatementBuilder {
    sql: String,
    params: Vec<SqlValue>,
}

impl StatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Registers a parameter and returns its placeholder, e.g. `$3::bigint`.
    pub fn bind(&mut self, value: SqlValue) -> String {
        let cast = value.cast();
        self.params.push(value);

        match cast {
            Some(cast) => format!("${}::{cast}", self.params.len()),
            None => format!("${}", self.params.len()),
        }
    }

    /// Registers a parameter rendered with the given cast instead of its own.
    pub fn bind_as(&mut self, value: SqlValue, cast: &str) -> String {
        self.params.push(value);
        format!("${}::{cast}", self.params.len())
    }

    pub fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Row filter over the base table of a level, aliased `base`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `base.<column> = ANY($n::bigint[])`
    AnyOf { column: String, values: Vec<i64> },
    And(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn negate(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    /// Renders the predicate, binding its values into `builder`.
    pub fn render(&self, alias: &str, builder: &mut StatementBuilder) -> String {
        match self {
            Predicate::AnyOf { column, values } => {
                let placeholder = builder.bind(SqlValue::IntegerArray(values.clone()));
                format!("{alias}.{} = ANY({placeholder})", quote_identifier(column))
            }
            Predicate::And(predicates) => {
                let rendered: Vec<String> = predicates
                    .iter()
                    .map(|predicate| predicate.render(alias, builder))
                    .collect();
                format!("({})", rendered.join(" AND "))
            }
            Predicate::Not(predicate) => format!("NOT {}", predicate.render(alias, builder)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_and_cast() {
        let mut builder = StatementBuilder::new();
        let first = builder.bind(SqlValue::Integer(1));
        let second = builder.bind(SqlValue::Null);
        let third = builder.bind(SqlValue::Text("a".to_owned()));

        assert_eq!(first, "$1::bigint");
        assert_eq!(second, "$2");
        assert_eq!(third, "$3::text");
        assert_eq!(builder.finish().params.len(), 3);
    }

    #[test]
    fn renders_negated_conjunction() {
        let predicate = Predicate::And(vec![
            Predicate::AnyOf {
                column: "month_id".to_owned(),
                values: vec![1, 2],
            },
            Predicate::AnyOf {
                column: "country_id".to_owned(),
                values: vec![57],
            },
        ])
        .negate();

        let mut builder = StatementBuilder::new();
        let sql = predicate.render("base", &mut builder);
        let statement = builder.finish();

        assert_eq!(
            sql,
            "NOT (base.month_id = ANY($1::bigint[]) AND base.country_id = ANY($2::bigint[]))"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::IntegerArray(vec![1, 2]),
                SqlValue::IntegerArray(vec![57])
            ]
        );
    }
}
