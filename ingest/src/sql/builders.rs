use ingest_postgres::types::{TableName, qualified_column};
use pg_escape::quote_identifier;

use crate::sql::{Predicate, SqlValue, Statement, StatementBuilder};
use crate::types::{Cell, SemanticType};

/// Kind of constraint whose columns are looked up by [`constraint_columns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
}

impl ConstraintKind {
    fn contype(&self) -> &'static str {
        match self {
            ConstraintKind::PrimaryKey => "p",
            ConstraintKind::ForeignKey => "f",
        }
    }
}

/// A column of a table created by the new-table merge.
///
/// A zero value replaces missing staged values on the corresponding side of the extent.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedColumn {
    pub name: String,
    pub inside_zero: Option<SqlValue>,
    pub outside_zero: Option<SqlValue>,
}

/// Tables and key columns shared by the new-table merge statements.
#[derive(Debug, Clone, Copy)]
pub struct MergeSources<'a> {
    /// Base table of the level, aliased `base`.
    pub base: &'a TableName,
    /// Staging table, aliased `nnew`.
    pub staging: &'a TableName,
    /// Canonical id column of the staging table, `<level>_id`.
    pub level_id_column: &'a str,
    /// Key column of the merged table, `<tablespace>_id`.
    pub key_column: &'a str,
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| quote_identifier(column).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_staging_table(staging: &TableName, columns: &[(String, SemanticType)]) -> Statement {
    let definitions = columns
        .iter()
        .map(|(name, semantic_type)| {
            format!("{} {}", quote_identifier(name), semantic_type.sql_type())
        })
        .collect::<Vec<_>>()
        .join(", ");

    Statement::raw(format!(
        "CREATE TABLE {} ({definitions})",
        staging.as_quoted_identifier()
    ))
}

/// `COPY ... FROM STDIN` in text format with `|` as delimiter.
pub fn copy_in_staging(staging: &TableName, columns: &[String]) -> Statement {
    Statement::raw(format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT text, DELIMITER '|')",
        staging.as_quoted_identifier(),
        column_list(columns)
    ))
}

/// Multi-row insert of `rows` into the staging table.
///
/// Cells whose type differs from the staged column type are bound as text and cast, which
/// mirrors how COPY parses them.
pub fn insert_staging_rows<'a, I>(
    staging: &TableName,
    columns: &[(String, SemanticType)],
    rows: I,
) -> Statement
where
    I: IntoIterator<Item = Vec<&'a Cell>>,
{
    let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();

    let mut builder = StatementBuilder::new();
    builder.push(&format!(
        "INSERT INTO {} ({}) VALUES ",
        staging.as_quoted_identifier(),
        column_list(&names)
    ));

    for (index, row) in rows.into_iter().enumerate() {
        if index > 0 {
            builder.push(", ");
        }

        let values: Vec<String> = row
            .into_iter()
            .zip(columns)
            .map(|(cell, (_, column_type))| {
                let sql_type = column_type.sql_type();
                match cell.semantic_type() {
                    None => builder.bind_as(SqlValue::Null, sql_type),
                    Some(cell_type) if cell_type == *column_type => {
                        builder.bind_as(SqlValue::from(cell), sql_type)
                    }
                    Some(_) => {
                        let text = SqlValue::Text(cell.render_text().unwrap_or_default());
                        format!("{}::{sql_type}", builder.bind_as(text, "text"))
                    }
                }
            })
            .collect();
        builder.push(&format!("({})", values.join(", ")));
    }

    builder.finish()
}

pub fn add_primary_key(table: &TableName, column: &str) -> Statement {
    Statement::raw(format!(
        "ALTER TABLE {} ADD PRIMARY KEY ({})",
        table.as_quoted_identifier(),
        quote_identifier(column)
    ))
}

pub fn create_staging_index(staging: &TableName, column: &str) -> Statement {
    Statement::raw(format!(
        "CREATE INDEX {} ON {} ({})",
        quote_identifier(&format!("{}_idx", staging.name)),
        staging.as_quoted_identifier(),
        quote_identifier(column)
    ))
}

/// Deletes staged rows whose id is not among the base rows selected by `inside`.
pub fn delete_spurious_rows(
    staging: &TableName,
    level_id_column: &str,
    base: &TableName,
    inside: &Predicate,
) -> Statement {
    let mut builder = StatementBuilder::new();
    let predicate = inside.render("base", &mut builder);
    builder.push(&format!(
        "DELETE FROM {} WHERE {}::bigint NOT IN (SELECT base.id FROM {} base WHERE {predicate})",
        staging.as_quoted_identifier(),
        quote_identifier(level_id_column),
        base.as_quoted_identifier()
    ));

    builder.finish()
}

pub fn drop_table_if_exists(table: &TableName) -> Statement {
    Statement::raw(format!(
        "DROP TABLE IF EXISTS {}",
        table.as_quoted_identifier()
    ))
}

fn merged_branch(
    sources: &MergeSources<'_>,
    columns: &[MergedColumn],
    outside: bool,
    predicate: Option<&Predicate>,
    builder: &mut StatementBuilder,
) -> String {
    let mut projection = vec![format!("base.id AS {}", quote_identifier(sources.key_column))];
    for column in columns {
        let staged = qualified_column("nnew", &column.name);
        let zero = if outside {
            &column.outside_zero
        } else {
            &column.inside_zero
        };

        let expression = match zero {
            Some(zero) => format!("COALESCE({staged}, {})", builder.bind(zero.clone())),
            None => staged,
        };
        projection.push(format!("{expression} AS {}", quote_identifier(&column.name)));
    }

    let mut branch = format!(
        "SELECT {} FROM {} base LEFT JOIN {} nnew ON (base.id::bigint = {}::bigint)",
        projection.join(", "),
        sources.base.as_quoted_identifier(),
        sources.staging.as_quoted_identifier(),
        qualified_column("nnew", sources.level_id_column)
    );
    if let Some(predicate) = predicate {
        branch.push_str(" WHERE ");
        branch.push_str(&predicate.render("base", builder));
    }

    branch
}

/// Creates `destination` from every base row joined with the staging table.
///
/// With an `inside` predicate, rows inside and outside the extent are selected by two branches
/// using the respective zero values and combined with `UNION ALL`. Without one, every base row
/// is inside.
pub fn create_merged_table(
    destination: &TableName,
    sources: &MergeSources<'_>,
    columns: &[MergedColumn],
    inside: Option<&Predicate>,
) -> Statement {
    let mut builder = StatementBuilder::new();

    let mut branches = vec![merged_branch(sources, columns, false, inside, &mut builder)];
    if let Some(inside) = inside {
        let outside = inside.clone().negate();
        branches.push(merged_branch(
            sources,
            columns,
            true,
            Some(&outside),
            &mut builder,
        ));
    }

    let union = branches
        .iter()
        .map(|branch| format!("({branch})"))
        .collect::<Vec<_>>()
        .join(" UNION ALL ");

    builder.push(&format!(
        "CREATE TABLE {} AS SELECT * FROM ({union}) merged_final WHERE {} IS NOT NULL",
        destination.as_quoted_identifier(),
        qualified_column("merged_final", sources.key_column)
    ));

    builder.finish()
}

pub fn add_foreign_key(table: &TableName, column: &str, references: &TableName) -> Statement {
    Statement::raw(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} (id)",
        table.as_quoted_identifier(),
        quote_identifier(&format!("fk_{column}")),
        quote_identifier(column),
        references.as_quoted_identifier()
    ))
}

/// Sets `column` to `value` on the rows of `destination` whose key is among the base rows
/// selected by `predicate`, every base row when there is none.
pub fn wipe_column(
    destination: &TableName,
    column: &str,
    key_column: &str,
    base: &TableName,
    value: SqlValue,
    predicate: Option<&Predicate>,
) -> Statement {
    let mut builder = StatementBuilder::new();
    let value = builder.bind(value);

    let mut selection = format!("SELECT base.id FROM {} base", base.as_quoted_identifier());
    if let Some(predicate) = predicate {
        selection.push_str(" WHERE ");
        selection.push_str(&predicate.render("base", &mut builder));
    }

    builder.push(&format!(
        "UPDATE {} SET {} = {value} WHERE {} IN ({selection})",
        destination.as_quoted_identifier(),
        quote_identifier(column),
        quote_identifier(key_column)
    ));

    builder.finish()
}

/// Copies the staged values of `column` into `destination`, optionally casting them to the
/// destination column type.
pub fn copy_column(
    destination: &TableName,
    column: &str,
    key_column: &str,
    staging: &TableName,
    level_id_column: &str,
    cast: Option<&str>,
) -> Statement {
    let mut value = qualified_column("base", column);
    if let Some(cast) = cast {
        value.push_str("::");
        value.push_str(cast);
    }

    Statement::raw(format!(
        "UPDATE {} dest SET {} = {value} FROM {} base WHERE {} = {}",
        destination.as_quoted_identifier(),
        quote_identifier(column),
        staging.as_quoted_identifier(),
        qualified_column("dest", key_column),
        qualified_column("base", level_id_column)
    ))
}

/// Tables of `schema` holding a foreign key into `base`, ordered by name.
pub fn child_tables(schema: &str, base: &TableName) -> Statement {
    let mut builder = StatementBuilder::new();
    let schema = builder.bind(SqlValue::Text(schema.to_owned()));
    let base_schema = builder.bind(SqlValue::Text(base.schema.clone()));
    let base_name = builder.bind(SqlValue::Text(base.name.clone()));

    builder.push(&format!(
        "SELECT DISTINCT child.relname::text \
         FROM pg_catalog.pg_constraint con \
         JOIN pg_catalog.pg_class child ON child.oid = con.conrelid \
         JOIN pg_catalog.pg_namespace child_ns ON child_ns.oid = child.relnamespace \
         JOIN pg_catalog.pg_class parent ON parent.oid = con.confrelid \
         JOIN pg_catalog.pg_namespace parent_ns ON parent_ns.oid = parent.relnamespace \
         WHERE con.contype = 'f' AND child_ns.nspname = {schema} \
         AND parent_ns.nspname = {base_schema} AND parent.relname = {base_name} \
         AND con.conrelid <> con.confrelid \
         ORDER BY 1"
    ));

    builder.finish()
}

/// Columns of `tables` in `schema` as `(table, column, data_type, is_primary_key)`, tables in
/// the given order and columns in ordinal order.
pub fn table_columns(schema: &str, tables: &[String]) -> Statement {
    let mut builder = StatementBuilder::new();
    let schema = builder.bind(SqlValue::Text(schema.to_owned()));
    let tables = builder.bind(SqlValue::TextArray(tables.to_vec()));

    builder.push(&format!(
        "SELECT c.table_name::text, c.column_name::text, c.data_type::text, \
         (EXISTS (SELECT 1 FROM pg_catalog.pg_constraint con \
         JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = ANY(con.conkey) \
         WHERE con.contype = 'p' \
         AND con.conrelid = format('%I.%I', c.table_schema, c.table_name)::regclass \
         AND a.attname = c.column_name::name))::text \
         FROM information_schema.columns c \
         WHERE c.table_schema = {schema} AND c.table_name::text = ANY({tables}) \
         ORDER BY array_position({tables}, c.table_name::text), c.ordinal_position"
    ));

    builder.finish()
}

/// Columns of the given constraint kind on `table`, in attribute order. A column shared by
/// several constraints is returned once per constraint.
pub fn constraint_columns(table: &TableName, kind: ConstraintKind) -> Statement {
    let mut builder = StatementBuilder::new();
    let table = builder.bind(SqlValue::Text(table.as_quoted_identifier()));

    builder.push(&format!(
        "SELECT a.attname::text \
         FROM pg_catalog.pg_constraint con \
         JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = ANY(con.conkey) \
         WHERE con.conrelid = {table}::regclass AND con.contype = '{}' \
         ORDER BY a.attnum",
        kind.contype()
    ));

    builder.finish()
}

/// Declared data type of a column, the column name matched case-insensitively.
pub fn column_data_type(table: &TableName, column: &str) -> Statement {
    let mut builder = StatementBuilder::new();
    let schema = builder.bind(SqlValue::Text(table.schema.clone()));
    let name = builder.bind(SqlValue::Text(table.name.clone()));
    let column = builder.bind(SqlValue::Text(column.to_owned()));

    builder.push(&format!(
        "SELECT data_type::text FROM information_schema.columns \
         WHERE table_schema = {schema} AND table_name = {name} AND column_name ILIKE {column} \
         LIMIT 1"
    ));

    builder.finish()
}

/// Columns of `table` as `(column, data_type)` in ordinal order.
pub fn table_column_types(table: &TableName) -> Statement {
    let mut builder = StatementBuilder::new();
    let schema = builder.bind(SqlValue::Text(table.schema.clone()));
    let name = builder.bind(SqlValue::Text(table.name.clone()));

    builder.push(&format!(
        "SELECT column_name::text, data_type::text FROM information_schema.columns \
         WHERE table_schema = {schema} AND table_name = {name} \
         ORDER BY ordinal_position"
    ));

    builder.finish()
}

pub fn schema_tables(schema: &str) -> Statement {
    let mut builder = StatementBuilder::new();
    let schema = builder.bind(SqlValue::Text(schema.to_owned()));

    builder.push(&format!(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = {schema} ORDER BY 1"
    ));

    builder.finish()
}

/// The DDL stamp cookie kept in the metadata schema.
pub fn ddl_stamp(metadata_schema: &str) -> Statement {
    Statement::raw(format!(
        "SELECT ddlm_stamp::text FROM {}.update_stamp LIMIT 1",
        quote_identifier(metadata_schema)
    ))
}
