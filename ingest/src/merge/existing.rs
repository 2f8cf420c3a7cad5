use ingest_postgres::types::TableName;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::connection::IngestConnection;
use crate::error::{ErrorKind, IngestResult};
use crate::failpoints::{MERGE_COPY_COLUMN, ingest_fail_point};
use crate::merge::MergeContext;
use crate::reconcile::{ColumnMapping, Recipe, is_reserved};
use crate::schema::{column_db_type, fetch_keys};
use crate::sql::{SqlValue, Statement, copy_column, wipe_column};
use crate::types::{SemanticType, zero_value_of};

/// A column left unmodified because its staged values did not fit the destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnWarning {
    pub column: String,
    pub table: String,
    /// Declared type the values were cast to, if any.
    pub cast: Option<String>,
    pub message: String,
    /// What Postgres reported, e.g. `invalid input syntax for type bigint`.
    pub cause: Option<String>,
}

/// Result of merging into existing columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExistingMergeOutcome {
    pub updated_columns: Vec<String>,
    pub warnings: Vec<ColumnWarning>,
}

fn policy_value(zero: bool, destination_type: Option<SemanticType>) -> SqlValue {
    if zero {
        zero_value_of(destination_type)
    } else {
        SqlValue::Null
    }
}

/// Copies the staged values of every matched column into its production table.
///
/// Identifier and reserved columns are skipped. Each column is handled in its own transaction:
/// the extent policy is applied first, then the staged values are copied over. A data error
/// rolls the column back and is reported as a [`ColumnWarning`], any other error aborts the
/// merge.
pub async fn merge_existing_columns<C>(
    connection: &C,
    recipe: &Recipe,
    context: &MergeContext<'_>,
) -> IngestResult<ExistingMergeOutcome>
where
    C: IngestConnection,
{
    let mut outcome = ExistingMergeOutcome::default();
    let mut keys: HashMap<String, String> = HashMap::new();

    for mapping in recipe.matched_columns() {
        if mapping.is_id() || is_reserved(&mapping.destination_name) {
            continue;
        }
        let Some(table) = &mapping.destination_table else {
            continue;
        };

        let destination = TableName::new(context.production_schema, table.clone());
        let key_column = match keys.get(table) {
            Some(key_column) => key_column.clone(),
            None => {
                let key_column = destination_key(connection, &destination, context).await?;
                keys.insert(table.clone(), key_column.clone());
                key_column
            }
        };
        let cast = column_db_type(connection, &destination, &mapping.destination_name).await;
        let statements = column_statements(
            mapping,
            &destination,
            &key_column,
            cast.as_deref(),
            context,
        );

        info!(column = %mapping.destination_name, table = %destination, "updating column");

        match update_column(connection, &statements).await {
            Ok(()) => outcome.updated_columns.push(mapping.destination_name.clone()),
            Err(err) if err.kind() == ErrorKind::ConversionError => {
                let message = format!(
                    "column '{}' has an incompatible type in the database ({}) and was not \
                     modified, cast the incoming values or widen the database column (e.g. text)",
                    mapping.destination_name,
                    cast.as_deref().unwrap_or("unknown type")
                );
                warn!(
                    column = %mapping.destination_name,
                    table = %destination,
                    "{}: {}",
                    message,
                    err
                );

                outcome.warnings.push(ColumnWarning {
                    column: mapping.destination_name.clone(),
                    table: table.clone(),
                    cast,
                    message,
                    cause: err.detail().map(str::to_owned),
                });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(outcome)
}

/// Picks the column of `destination` joined against the base table ids.
///
/// The base table is keyed by its primary key, other tables by their foreign key into the
/// base table. When the constraints do not single out one column, the naming convention is
/// used: `id` on the base table, `<tablespace>_id` elsewhere.
async fn destination_key<C>(
    connection: &C,
    destination: &TableName,
    context: &MergeContext<'_>,
) -> IngestResult<String>
where
    C: IngestConnection,
{
    let is_base = destination.name == context.level.tablespace();
    let convention = if is_base {
        "id".to_owned()
    } else {
        context.level.tablespace_id_column()
    };

    let (primary_keys, foreign_keys) = fetch_keys(connection, destination).await?;
    let candidates: Vec<String> = if is_base {
        primary_keys
    } else {
        let keyed: Vec<String> = foreign_keys
            .iter()
            .filter(|column| primary_keys.contains(column))
            .cloned()
            .collect();
        if keyed.is_empty() { foreign_keys } else { keyed }
    };

    if candidates.contains(&convention) {
        return Ok(convention);
    }

    match candidates.as_slice() {
        [key_column] => {
            debug!(table = %destination, key_column = %key_column, "using the declared key column");
            Ok(key_column.clone())
        }
        _ => {
            debug!(
                table = %destination,
                key_column = %convention,
                "constraints do not single out a key column, using the naming convention"
            );
            Ok(convention)
        }
    }
}

fn column_statements(
    mapping: &ColumnMapping,
    destination: &TableName,
    key_column: &str,
    cast: Option<&str>,
    context: &MergeContext<'_>,
) -> Vec<Statement> {
    let base = context.base();

    let mut statements = Vec::with_capacity(3);

    if mapping.in_panel_wipe || mapping.in_panel_zero {
        statements.push(wipe_column(
            destination,
            &mapping.destination_name,
            key_column,
            &base,
            policy_value(mapping.in_panel_zero, mapping.destination_type),
            context.extent.inside(context.level).as_ref(),
        ));
    }

    // Without an extent nothing is outside.
    if (mapping.out_panel_wipe || mapping.out_panel_zero)
        && let Some(outside) = context.extent.outside(context.level)
    {
        statements.push(wipe_column(
            destination,
            &mapping.destination_name,
            key_column,
            &base,
            policy_value(mapping.out_panel_zero, mapping.destination_type),
            Some(&outside),
        ));
    }

    statements.push(copy_column(
        destination,
        &mapping.destination_name,
        key_column,
        context.staging.name(),
        &context.level.id_column(),
        cast,
    ));

    statements
}

/// Runs the statements of one column in a transaction.
///
/// A failed rollback is logged, the statement error is the one returned.
async fn update_column<C>(connection: &C, statements: &[Statement]) -> IngestResult<()>
where
    C: IngestConnection,
{
    connection.begin().await?;

    match execute_column_statements(connection, statements).await {
        Ok(()) => connection.commit().await,
        Err(err) => {
            if let Err(rollback_err) = connection.rollback().await {
                error!("failed to roll back the column update: {}", rollback_err);
            }
            Err(err)
        }
    }
}

/// Executes the statements in order, the last one being the copy of the staged values.
async fn execute_column_statements<C>(connection: &C, statements: &[Statement]) -> IngestResult<()>
where
    C: IngestConnection,
{
    for (index, statement) in statements.iter().enumerate() {
        if index + 1 == statements.len() {
            ingest_fail_point(MERGE_COPY_COLUMN)?;
        }
        connection.execute(statement).await?;
    }

    Ok(())
}
