use ingest_postgres::types::TableName;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::ResultCache;
use crate::connection::IngestConnection;
use crate::conversions::{parse_bool, required_text};
use crate::error::IngestResult;
use crate::level::Level;
use crate::sql::{
    ConstraintKind, child_tables, column_data_type, constraint_columns, schema_tables,
    table_column_types, table_columns,
};
use crate::types::SemanticType;

/// A destination column as seen by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogColumn {
    /// Name of the owning table in the production schema.
    pub table: String,
    pub column_name: String,
    /// [`None`] when the declared type has no semantic equivalent.
    pub semantic_type: Option<SemanticType>,
    pub is_primary_key: bool,
}

/// Returns the tables of a level: every production table with a foreign key into the base
/// table, ordered by name, followed by the base table itself.
pub async fn fetch_children<C>(
    connection: &C,
    production_schema: &str,
    level: Level,
) -> IngestResult<Vec<TableName>>
where
    C: IngestConnection,
{
    let base = TableName::new(production_schema, level.tablespace());
    let rows = connection
        .query(&child_tables(production_schema, &base))
        .await?;

    let mut tables = Vec::with_capacity(rows.len() + 1);
    for row in &rows {
        let name = required_text(row, 0, "relname")?;
        tables.push(TableName::new(production_schema, name));
    }
    tables.push(base);

    Ok(tables)
}

fn columns_cache_key(production_schema: &str, level: Level) -> String {
    format!("catalog:columns:{production_schema}.{}", level.tablespace())
}

/// Returns the columns of every table of a level, in [`fetch_children`] order and ordinal
/// order within each table.
///
/// Results are memoized in `cache`.
pub async fn fetch_columns<C, R>(
    connection: &C,
    cache: &R,
    production_schema: &str,
    level: Level,
) -> IngestResult<Vec<CatalogColumn>>
where
    C: IngestConnection,
    R: ResultCache,
{
    let key = columns_cache_key(production_schema, level);
    if let Some(cached) = cache.get(&key).await? {
        match serde_json::from_value::<Vec<CatalogColumn>>(cached) {
            Ok(columns) => {
                debug!(%key, "using cached catalog columns");
                return Ok(columns);
            }
            Err(err) => warn!(%key, "ignoring malformed cached catalog columns: {}", err),
        }
    }

    let tables: Vec<String> = fetch_children(connection, production_schema, level)
        .await?
        .into_iter()
        .map(|table| table.name)
        .collect();

    let rows = connection
        .query(&table_columns(production_schema, &tables))
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        columns.push(CatalogColumn {
            table: required_text(row, 0, "table_name")?.to_owned(),
            column_name: required_text(row, 1, "column_name")?.to_owned(),
            semantic_type: SemanticType::from_pg_data_type(required_text(row, 2, "data_type")?),
            is_primary_key: parse_bool(required_text(row, 3, "is_primary_key")?)?,
        });
    }

    cache.put(&key, serde_json::to_value(&columns)?).await?;

    Ok(columns)
}

fn dedup_in_order(columns: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(columns.len());
    for column in columns {
        if !unique.contains(&column) {
            unique.push(column);
        }
    }

    unique
}

/// Returns the primary key columns and the foreign key columns of `table`.
pub async fn fetch_keys<C>(connection: &C, table: &TableName) -> IngestResult<(Vec<String>, Vec<String>)>
where
    C: IngestConnection,
{
    let mut keys = Vec::with_capacity(2);
    for kind in [ConstraintKind::PrimaryKey, ConstraintKind::ForeignKey] {
        let rows = connection.query(&constraint_columns(table, kind)).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            columns.push(required_text(row, 0, "attname")?.to_owned());
        }
        keys.push(dedup_in_order(columns));
    }

    let foreign_keys = keys.pop().unwrap_or_default();
    let primary_keys = keys.pop().unwrap_or_default();

    Ok((primary_keys, foreign_keys))
}

/// Returns the declared type of a column, usable as a cast target.
///
/// Lookup failures and types that cannot be written as a cast, such as `USER-DEFINED` or
/// `ARRAY`, yield [`None`] after a warning.
pub async fn column_db_type<C>(connection: &C, table: &TableName, column: &str) -> Option<String>
where
    C: IngestConnection,
{
    let rows = match connection.query(&column_data_type(table, column)).await {
        Ok(rows) => rows,
        Err(err) => {
            warn!(%table, column, "could not look up the column type: {}", err);
            return None;
        }
    };

    let data_type = rows.into_iter().next()?.into_iter().next()??;
    let castable = data_type
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' ' || c == '_');
    if !castable {
        warn!(%table, column, %data_type, "column type cannot be used as a cast");
        return None;
    }

    Some(data_type)
}

/// Returns the semantic type of every column of the staging table, in ordinal order.
pub async fn staging_column_types<C>(
    connection: &C,
    staging: &TableName,
) -> IngestResult<Vec<(String, Option<SemanticType>)>>
where
    C: IngestConnection,
{
    let rows = connection.query(&table_column_types(staging)).await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        columns.push((
            required_text(row, 0, "column_name")?.to_owned(),
            SemanticType::from_pg_data_type(required_text(row, 1, "data_type")?),
        ));
    }

    Ok(columns)
}

/// Returns the names of every table of `schema`.
pub async fn schema_table_names<C>(connection: &C, schema: &str) -> IngestResult<Vec<String>>
where
    C: IngestConnection,
{
    let rows = connection.query(&schema_tables(schema)).await?;

    let mut tables = Vec::with_capacity(rows.len());
    for row in &rows {
        tables.push(required_text(row, 0, "table_name")?.to_owned());
    }

    Ok(tables)
}
