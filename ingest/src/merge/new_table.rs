use ingest_postgres::types::TableName;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::bail;
use crate::connection::IngestConnection;
use crate::error::{ErrorKind, IngestResult};
use crate::level::Level;
use crate::merge::MergeContext;
use crate::reconcile::{Recipe, normalize_name};
use crate::schema::{schema_table_names, staging_column_types};
use crate::sql::{
    MergeSources, MergedColumn, Statement, add_foreign_key, add_primary_key, create_merged_table,
    drop_table_if_exists,
};
use crate::staging::StagingTable;

/// Longest identifier Postgres keeps, longer ones are silently truncated.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Truncates `name` to at most `max_len` bytes on a character boundary.
fn truncate_identifier(name: &str, max_len: usize) -> &str {
    if name.len() <= max_len {
        return name;
    }

    let mut end = max_len;
    while !name.is_char_boundary(end) {
        end -= 1;
    }

    &name[..end]
}

/// Picks the name of the table created by the new-table merge.
///
/// A name already used in the production schema is only reused when `overwrite` is set, and
/// never for the base table of a level. Otherwise the name is prefixed with the start of the
/// staging table name, shortened so that the result stays a valid identifier. Names longer
/// than an identifier are rejected, as is a prefixed name that is taken as well.
pub async fn resolve_table_name<C>(
    connection: &C,
    production_schema: &str,
    requested: &str,
    overwrite: bool,
    staging: &StagingTable,
) -> IngestResult<TableName>
where
    C: IngestConnection,
{
    let name = normalize_name(requested);
    if name.is_empty() {
        bail!(
            ErrorKind::ValidationError,
            "Invalid table name",
            format!("'{requested}' has no usable characters")
        );
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        bail!(
            ErrorKind::ValidationError,
            "Invalid table name",
            format!(
                "'{name}' is {} bytes long, at most {MAX_IDENTIFIER_LEN} are allowed",
                name.len()
            )
        );
    }

    let existing = schema_table_names(connection, production_schema).await?;
    if !existing.contains(&name) {
        return Ok(TableName::new(production_schema, name));
    }

    let is_base_table = Level::ALL.iter().any(|level| level.tablespace() == name);
    if overwrite && !is_base_table {
        warn!(
            table = %name,
            "table exists in the production schema and will be wiped"
        );

        return Ok(TableName::new(production_schema, name));
    }

    let prefix = staging.collision_prefix();
    let prefixed = format!(
        "{prefix}{}",
        truncate_identifier(&name, MAX_IDENTIFIER_LEN - prefix.len())
    );
    if existing.contains(&prefixed) {
        bail!(
            ErrorKind::ValidationError,
            "Table name collides with an existing table",
            format!("both '{name}' and '{prefixed}' exist in '{production_schema}'")
        );
    }

    warn!(
        table = %name,
        renamed = %prefixed,
        "table exists in the production schema and will not be wiped, using a prefixed name instead"
    );

    Ok(TableName::new(production_schema, prefixed))
}

/// Creates a production table holding every new column of the recipe, keyed by the base table
/// id of the level.
///
/// Returns [`None`] when the recipe has no new value column. The table is created in a single
/// transaction.
pub async fn merge_new_table<C>(
    connection: &C,
    recipe: &Recipe,
    context: &MergeContext<'_>,
    requested_name: &str,
    overwrite: bool,
) -> IngestResult<Option<TableName>>
where
    C: IngestConnection,
{
    let new_columns: Vec<_> = recipe
        .new_columns()
        .filter(|mapping| !mapping.is_id())
        .collect();
    if new_columns.is_empty() {
        info!("no new columns, skipping table creation");
        return Ok(None);
    }

    let destination = resolve_table_name(
        connection,
        context.production_schema,
        requested_name,
        overwrite,
        context.staging,
    )
    .await?;

    let staged_types: HashMap<String, _> =
        staging_column_types(connection, context.staging.name())
            .await?
            .into_iter()
            .collect();

    let columns: Vec<MergedColumn> = new_columns
        .iter()
        .map(|mapping| {
            let zero = staged_types
                .get(&mapping.destination_name)
                .copied()
                .flatten()
                .map(|semantic_type| semantic_type.zero_value());

            MergedColumn {
                name: mapping.destination_name.clone(),
                inside_zero: zero.clone().filter(|_| mapping.in_panel_zero),
                outside_zero: zero.filter(|_| mapping.out_panel_zero),
            }
        })
        .collect();

    let base = context.base();
    let level_id_column = context.level.id_column();
    let key_column = context.level.tablespace_id_column();
    let sources = MergeSources {
        base: &base,
        staging: context.staging.name(),
        level_id_column: &level_id_column,
        key_column: &key_column,
    };
    let inside = context.extent.inside(context.level);

    let statements = [
        drop_table_if_exists(&destination),
        create_merged_table(&destination, &sources, &columns, inside.as_ref()),
        add_primary_key(&destination, &key_column),
        add_foreign_key(&destination, &key_column, &base),
    ];

    info!(table = %destination, columns = columns.len(), "creating new table");
    run_in_transaction(connection, &statements).await?;
    info!(table = %destination, "created new table");

    Ok(Some(destination))
}

async fn run_in_transaction<C>(connection: &C, statements: &[Statement]) -> IngestResult<()>
where
    C: IngestConnection,
{
    connection.begin().await?;

    for statement in statements {
        if let Err(err) = connection.execute(statement).await {
            if let Err(rollback_err) = connection.rollback().await {
                error!("failed to roll back the table creation: {}", rollback_err);
            }
            return Err(err);
        }
    }

    connection.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, DatasetColumn};
    use crate::extent::ExtentFilter;
    use crate::reconcile::{MergePolicy, reconcile};
    use crate::sql::SqlValue;
    use crate::test_utils::connection::{ConnectionEvent, RecordingConnection};
    use crate::types::Cell;

    fn text_row(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|value| Some((*value).to_owned())).collect()
    }

    fn recipe(columns: &[&str]) -> Recipe {
        let dataset = Dataset::new(
            columns
                .iter()
                .map(|name| DatasetColumn::new(*name, vec![Cell::Integer(1)]))
                .collect(),
        )
        .unwrap();

        reconcile(&dataset, &[], MergePolicy::default())
    }

    #[tokio::test]
    async fn free_names_are_kept() {
        let connection = RecordingConnection::new();
        connection.respond_to("information_schema.tables", vec![text_row(&["cm_econ"])]);
        let staging = StagingTable::generate("public");

        let name = resolve_table_name(&connection, "prod", "Econ", false, &staging)
            .await
            .unwrap();

        assert_eq!(name, TableName::new("prod", "econ"));
    }

    #[tokio::test]
    async fn colliding_names_are_prefixed_unless_overwritten() {
        let connection = RecordingConnection::new();
        connection.respond_to(
            "information_schema.tables",
            vec![text_row(&["country_month"]), text_row(&["econ"])],
        );
        let staging = StagingTable::generate("public");

        let prefixed = resolve_table_name(&connection, "prod", "econ", false, &staging)
            .await
            .unwrap();
        assert_eq!(prefixed.name, format!("{}econ", staging.collision_prefix()));

        let overwritten = resolve_table_name(&connection, "prod", "econ", true, &staging)
            .await
            .unwrap();
        assert_eq!(overwritten.name, "econ");

        let base = resolve_table_name(&connection, "prod", "country_month", true, &staging)
            .await
            .unwrap();
        assert_ne!(base.name, "country_month");
    }

    #[tokio::test]
    async fn long_names_fit_an_identifier_once_prefixed() {
        let long = "x".repeat(MAX_IDENTIFIER_LEN);
        let connection = RecordingConnection::new();
        connection.respond_to("information_schema.tables", vec![text_row(&[long.as_str()])]);
        let staging = StagingTable::generate("public");

        let prefixed = resolve_table_name(&connection, "prod", &long, false, &staging)
            .await
            .unwrap();

        assert_eq!(prefixed.name.len(), MAX_IDENTIFIER_LEN);
        assert!(prefixed.name.starts_with(staging.collision_prefix()));

        let err = resolve_table_name(&connection, "prod", &format!("{long}x"), false, &staging)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn taken_prefixed_names_are_rejected() {
        let staging = StagingTable::generate("public");
        let connection = RecordingConnection::new();
        connection.respond_to(
            "information_schema.tables",
            vec![
                text_row(&["econ"]),
                text_row(&[format!("{}econ", staging.collision_prefix()).as_str()]),
            ],
        );

        let err = resolve_table_name(&connection, "prod", "econ", false, &staging)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn truncation_respects_character_boundaries() {
        assert_eq!(truncate_identifier("abc", 5), "abc");
        assert_eq!(truncate_identifier("abcdef", 3), "abc");
        assert_eq!(truncate_identifier("aé", 2), "a");
    }

    #[tokio::test]
    async fn failed_rollback_keeps_the_creation_error() {
        let connection = RecordingConnection::new();
        connection.fail_on("ADD CONSTRAINT", ErrorKind::DestinationSchemaError);
        connection.fail_rollback(ErrorKind::DestinationConnectionFailed);
        let staging = StagingTable::generate("public");
        let extent = ExtentFilter::default();
        let context = MergeContext {
            production_schema: "prod",
            level: Level::Cm,
            staging: &staging,
            extent: &extent,
        };

        let err = merge_new_table(
            &connection,
            &recipe(&["cm_id", "new_metric"]),
            &context,
            "econ",
            false,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationSchemaError);
    }

    #[tokio::test]
    async fn nothing_happens_without_new_value_columns() {
        let connection = RecordingConnection::new();
        let staging = StagingTable::generate("public");
        let extent = ExtentFilter::default();
        let context = MergeContext {
            production_schema: "prod",
            level: Level::Cm,
            staging: &staging,
            extent: &extent,
        };

        let created = merge_new_table(&connection, &recipe(&["cm_id"]), &context, "econ", false)
            .await
            .unwrap();

        assert_eq!(created, None);
        assert!(connection.events().is_empty());
    }

    #[tokio::test]
    async fn table_is_created_in_one_transaction() {
        let connection = RecordingConnection::new();
        connection.respond_to(
            "ORDER BY ordinal_position",
            vec![text_row(&["cm_id", "bigint"]), text_row(&["new_metric", "bigint"])],
        );
        let staging = StagingTable::generate("public");
        let extent = ExtentFilter::default();
        let context = MergeContext {
            production_schema: "prod",
            level: Level::Cm,
            staging: &staging,
            extent: &extent,
        };

        let created = merge_new_table(
            &connection,
            &recipe(&["cm_id", "new_metric"]),
            &context,
            "econ",
            false,
        )
        .await
        .unwrap();

        assert_eq!(created, Some(TableName::new("prod", "econ")));

        let events = connection.events();
        let begin = events
            .iter()
            .position(|event| *event == ConnectionEvent::Begin)
            .unwrap();
        assert_eq!(events.len(), begin + 6);
        assert_eq!(events.last(), Some(&ConnectionEvent::Commit));

        let ConnectionEvent::Execute(create) = &events[begin + 2] else {
            panic!("expected the create statement");
        };
        assert!(create.sql.starts_with("CREATE TABLE prod.econ AS"));
        assert_eq!(create.params, vec![SqlValue::Integer(0)]);
    }

    #[tokio::test]
    async fn failed_creation_rolls_back() {
        let connection = RecordingConnection::new();
        connection.fail_on("ADD CONSTRAINT", ErrorKind::DestinationSchemaError);
        let staging = StagingTable::generate("public");
        let extent = ExtentFilter::default();
        let context = MergeContext {
            production_schema: "prod",
            level: Level::Cm,
            staging: &staging,
            extent: &extent,
        };

        let err = merge_new_table(
            &connection,
            &recipe(&["cm_id", "new_metric"]),
            &context,
            "econ",
            false,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationSchemaError);
        assert_eq!(connection.events().last(), Some(&ConnectionEvent::Rollback));
    }
}
