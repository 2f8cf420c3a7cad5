use ingest_postgres::types::TableName;
use serde::Serialize;
use tracing::{info, warn};

use crate::connection::IngestConnection;
use crate::dataset::Dataset;
use crate::error::{ErrorKind, IngestResult};
use crate::failpoints::{STAGING_COPY_IN, ingest_fail_point};
use crate::sql::{
    Predicate, add_primary_key, copy_in_staging, create_staging_index, create_staging_table,
    delete_spurious_rows as delete_spurious_rows_statement, drop_table_if_exists,
    insert_staging_rows,
};
use crate::staging::{StagingTable, encode_copy_text};
use crate::types::{Cell, SemanticType};

/// Maximum number of bind parameters Postgres accepts in a single statement.
const MAX_BIND_PARAMETERS: usize = u16::MAX as usize;

/// How the staging table was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingPath {
    Copy,
    RowInsert,
}

/// Staged column types, inferred from the values. Columns without any value are staged as
/// text.
pub fn staging_columns(dataset: &Dataset) -> Vec<(String, SemanticType)> {
    dataset
        .columns()
        .iter()
        .map(|column| {
            (
                column.name.clone(),
                column.infer_type().unwrap_or(SemanticType::Text),
            )
        })
        .collect()
}

/// Creates the staging table and fills it with `dataset`.
///
/// A staging table left by an earlier attempt is replaced. The COPY fast path is tried first. When Postgres rejects the stream format the rows are
/// inserted with batched parameterized statements instead, any other failure is returned.
pub async fn write_staging<C>(
    connection: &C,
    staging: &StagingTable,
    dataset: &Dataset,
    insert_batch_size: usize,
) -> IngestResult<StagingPath>
where
    C: IngestConnection,
{
    let columns = staging_columns(dataset);
    connection
        .execute(&drop_table_if_exists(staging.name()))
        .await?;
    connection
        .execute(&create_staging_table(staging.name(), &columns))
        .await?;

    info!(staging = %staging.name(), rows = dataset.row_count(), "created staging table");

    match copy_rows(connection, staging.name(), dataset).await {
        Ok(rows) => {
            info!(rows, "staged rows with copy");

            Ok(StagingPath::Copy)
        }
        Err(err) if err.kind() == ErrorKind::StagingFormatIncompatible => {
            warn!(
                "copy into the staging table was rejected, falling back to row inserts: {}",
                err
            );
            let rows =
                insert_rows(connection, staging.name(), &columns, dataset, insert_batch_size)
                    .await?;
            info!(rows, "staged rows with inserts");

            Ok(StagingPath::RowInsert)
        }
        Err(err) => Err(err),
    }
}

async fn copy_rows<C>(connection: &C, staging: &TableName, dataset: &Dataset) -> IngestResult<u64>
where
    C: IngestConnection,
{
    ingest_fail_point(STAGING_COPY_IN)?;

    let statement = copy_in_staging(staging, &dataset.column_names());
    connection
        .copy_in(&statement, encode_copy_text(dataset))
        .await
}

async fn insert_rows<C>(
    connection: &C,
    staging: &TableName,
    columns: &[(String, SemanticType)],
    dataset: &Dataset,
    insert_batch_size: usize,
) -> IngestResult<u64>
where
    C: IngestConnection,
{
    if dataset.row_count() == 0 || columns.is_empty() {
        return Ok(0);
    }

    let rows_per_statement = insert_batch_size
        .min(MAX_BIND_PARAMETERS / columns.len())
        .max(1);

    connection.begin().await?;

    let mut inserted = 0;
    for start in (0..dataset.row_count()).step_by(rows_per_statement) {
        let end = (start + rows_per_statement).min(dataset.row_count());
        let rows = (start..end).map(|index| dataset.row(index).collect::<Vec<&Cell>>());

        match connection
            .execute(&insert_staging_rows(staging, columns, rows))
            .await
        {
            Ok(rows) => inserted += rows,
            Err(err) => {
                connection.rollback().await?;
                return Err(err);
            }
        }
    }

    connection.commit().await?;

    Ok(inserted)
}

/// Adds a primary key and an index on the canonical id column of the staging table.
pub async fn index_staging<C>(
    connection: &C,
    staging: &StagingTable,
    level_id_column: &str,
) -> IngestResult<()>
where
    C: IngestConnection,
{
    connection
        .execute(&add_primary_key(staging.name(), level_id_column))
        .await?;
    connection
        .execute(&create_staging_index(staging.name(), level_id_column))
        .await?;

    Ok(())
}

/// Deletes staged rows whose id falls outside the extent. Nothing is deleted without an
/// extent.
pub async fn delete_spurious_rows<C>(
    connection: &C,
    staging: &StagingTable,
    level_id_column: &str,
    base: &TableName,
    inside: Option<&Predicate>,
) -> IngestResult<u64>
where
    C: IngestConnection,
{
    let Some(inside) = inside else {
        info!("no extent set, keeping every staged row");
        return Ok(0);
    };

    let deleted = connection
        .execute(&delete_spurious_rows_statement(
            staging.name(),
            level_id_column,
            base,
            inside,
        ))
        .await?;

    if deleted > 0 {
        warn!(deleted, "deleted staged rows outside of the extent");
    }

    Ok(deleted)
}

pub async fn drop_staging<C>(connection: &C, staging: &StagingTable) -> IngestResult<()>
where
    C: IngestConnection,
{
    connection
        .execute(&drop_table_if_exists(staging.name()))
        .await?;

    info!(staging = %staging.name(), "dropped staging table");

    Ok(())
}
