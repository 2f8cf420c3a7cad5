use ingest::cache::{CacheManager, DiskResultCache};
use ingest::connection::PgConnection;
use ingest::dataset::{Dataset, DatasetColumn};
use ingest::error::ErrorKind;
use ingest::level::Level;
use ingest::reconcile::MergePolicy;
use ingest::staging::StagingPath;
use ingest::test_utils::database::{connect, spawn_database, test_working_dir, writer_config};
use ingest::test_utils::fixtures::{
    create_production_schema, econ_dataset, float_column, leftover_staging_tables, text_column,
};
use ingest::types::Cell;
use ingest::writer::IngestWriter;
use ingest_config::shared::DEFAULT_METADATA_SCHEMA;
use ingest_postgres::tokio::test_utils::PgDatabase;
use ingest_postgres::types::TableName;
use ingest_telemetry::tracing::init_test_tracing;
use std::path::Path;

async fn create_writer(
    database: &PgDatabase,
    working_dir: &Path,
    dataset: Dataset,
    policy: MergePolicy,
) -> IngestWriter<PgConnection, DiskResultCache> {
    let connection = connect(database).await;
    let cache_manager = CacheManager::new(
        DiskResultCache::new(working_dir),
        working_dir,
        DEFAULT_METADATA_SCHEMA,
    );

    IngestWriter::new(
        connection,
        cache_manager,
        dataset,
        Level::Cm,
        policy,
        writer_config(working_dir.to_path_buf()),
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn transfer_creates_new_table_and_updates_existing_columns() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let mut writer = create_writer(
        &database,
        &working_dir,
        econ_dataset(),
        MergePolicy::default(),
    )
    .await;
    writer.set_time_extent(vec![1, 2, 3]);

    let report = writer.transfer("Econ", false).await.unwrap();

    assert_eq!(report.staging_path, StagingPath::Copy);
    assert_eq!(report.new_table, Some(TableName::new("prod", "econ")));
    assert_eq!(report.updated_columns, vec!["gdp"]);
    assert!(report.warnings.is_empty());
    assert!(writer.recipe().is_none());

    // Inside the extent the column is zeroed before the staged values are copied over, so
    // the unstaged id 3 ends up at zero while the staged null of id 2 is kept.
    let gdp = float_column(database.client(), "prod.cm_econ", "country_month_id", "gdp").await;
    assert_eq!(
        gdp,
        vec![
            (1, Some(1.5)),
            (2, None),
            (3, Some(0.0)),
            (4, Some(40.0)),
            (5, Some(50.0)),
            (6, Some(60.0)),
        ]
    );

    // Id 4 lies outside the extent and was removed from staging.
    let new_metric = float_column(
        database.client(),
        "prod.econ",
        "country_month_id",
        "new_metric",
    )
    .await;
    assert_eq!(
        new_metric,
        vec![
            (1, Some(0.25)),
            (2, Some(0.5)),
            (3, Some(0.0)),
            (4, None),
            (5, None),
            (6, None),
        ]
    );

    assert!(leftover_staging_tables(database.client()).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_transfer_updates_the_created_table_in_place() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let mut writer = create_writer(
        &database,
        &working_dir,
        econ_dataset(),
        MergePolicy::default(),
    )
    .await;
    writer.set_time_extent(vec![1, 2, 3]);

    writer.transfer("econ", false).await.unwrap();
    let first = float_column(
        database.client(),
        "prod.econ",
        "country_month_id",
        "new_metric",
    )
    .await;

    let report = writer.transfer("econ", false).await.unwrap();

    assert_eq!(report.new_table, None);
    assert_eq!(report.updated_columns, vec!["gdp", "new_metric"]);

    let second = float_column(
        database.client(),
        "prod.econ",
        "country_month_id",
        "new_metric",
    )
    .await;
    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread")]
async fn transfer_without_extent_preserving_values() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let dataset = Dataset::new(vec![
        DatasetColumn::new("cm_id", vec![Cell::Integer(1), Cell::Integer(2)]),
        DatasetColumn::new("GDP ", vec![Cell::Integer(7), Cell::Integer(8)]),
    ])
    .unwrap();
    let mut writer =
        create_writer(&database, &working_dir, dataset, MergePolicy::preserve()).await;

    let report = writer.transfer("unused", false).await.unwrap();

    assert_eq!(report.new_table, None);
    assert_eq!(report.updated_columns, vec!["gdp"]);

    let gdp = float_column(database.client(), "prod.cm_econ", "country_month_id", "gdp").await;
    assert_eq!(
        gdp,
        vec![
            (1, Some(7.0)),
            (2, Some(8.0)),
            (3, Some(30.0)),
            (4, Some(40.0)),
            (5, Some(50.0)),
            (6, Some(60.0)),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn colliding_table_names_are_prefixed() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let mut writer = create_writer(
        &database,
        &working_dir,
        econ_dataset(),
        MergePolicy::default(),
    )
    .await;
    let prefix = writer.staging_table().collision_prefix().to_owned();

    // The base table of a level is never overwritten.
    let report = writer.transfer("country_month", true).await.unwrap();

    let expected = TableName::new("prod", format!("{prefix}country_month"));
    assert_eq!(report.new_table, Some(expected));

    let base_rows = float_column(
        database.client(),
        "prod.country_month",
        "id",
        "month_id::double precision",
    )
    .await;
    assert_eq!(base_rows.len(), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_key_column_fails_before_touching_the_database() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let dataset = Dataset::new(vec![DatasetColumn::new(
        "gdp",
        vec![Cell::Float(1.0), Cell::Float(2.0)],
    )])
    .unwrap();
    let cache_manager = CacheManager::new(
        DiskResultCache::new(&working_dir),
        &working_dir,
        DEFAULT_METADATA_SCHEMA,
    );

    let err = IngestWriter::new(
        connect(&database).await,
        cache_manager,
        dataset,
        Level::Cm,
        MergePolicy::default(),
        writer_config(working_dir.clone()),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::KeyConstraintViolation);
    assert!(leftover_staging_tables(database.client()).await.is_empty());
    assert!(!working_dir.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_is_stable_and_served_from_the_cache() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let mut writer = create_writer(
        &database,
        &working_dir,
        econ_dataset(),
        MergePolicy::default(),
    )
    .await;

    let first = writer.reconcile().await.unwrap().clone();
    let second = writer.reconcile().await.unwrap().clone();

    assert_eq!(first, second);
    assert_eq!(first.destination_names(), vec!["cm_id", "gdp", "new_metric"]);
    assert_eq!(first.matched_columns().count(), 1);
    assert!(working_dir.join(ingest::cache::STAMP_FILE_NAME).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn mixed_integer_and_float_values_are_merged_as_floats() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let dataset = Dataset::from_json_records(
        r#"[{"cm_id": 1, "gdp": 2}, {"cm_id": 2, "gdp": 2.5}]"#,
    )
    .unwrap();
    let mut writer =
        create_writer(&database, &working_dir, dataset, MergePolicy::preserve()).await;

    let report = writer.transfer("unused", false).await.unwrap();

    assert_eq!(report.staging_path, StagingPath::Copy);
    assert_eq!(report.updated_columns, vec!["gdp"]);
    assert!(report.warnings.is_empty());

    let gdp = float_column(database.client(), "prod.cm_econ", "country_month_id", "gdp").await;
    assert_eq!(&gdp[..3], &[(1, Some(2.0)), (2, Some(2.5)), (3, Some(30.0))]);
    assert!(leftover_staging_tables(database.client()).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn staging_can_be_written_again() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let mut writer = create_writer(
        &database,
        &working_dir,
        econ_dataset(),
        MergePolicy::default(),
    )
    .await;

    writer.write_staging().await.unwrap();
    writer.write_staging().await.unwrap();
    writer.index_staging().await.unwrap();

    let staged = float_column(
        database.client(),
        &writer.staging_table().name().to_string(),
        "cm_id",
        "new_metric",
    )
    .await;
    assert_eq!(staged, vec![(1, Some(0.25)), (2, Some(0.5)), (4, Some(0.75))]);

    writer.drop_staging().await.unwrap();
    assert!(leftover_staging_tables(database.client()).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn copy_keeps_delimiters_backslashes_and_newlines() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let dataset = Dataset::new(vec![
        DatasetColumn::new(
            "cm_id",
            vec![Cell::Integer(1), Cell::Integer(2), Cell::Integer(3)],
        ),
        DatasetColumn::new(
            "note",
            vec![
                Cell::Text("a|b".to_owned()),
                Cell::Text("back\\slash \\N".to_owned()),
                Cell::Text("two\nlines\r\tand a tab".to_owned()),
            ],
        ),
    ])
    .unwrap();
    let mut writer =
        create_writer(&database, &working_dir, dataset, MergePolicy::preserve()).await;

    let report = writer.transfer("unused", false).await.unwrap();

    assert_eq!(report.staging_path, StagingPath::Copy);
    let notes = text_column(database.client(), "prod.cm_econ", "country_month_id", "note").await;
    assert_eq!(
        &notes[..4],
        &[
            (1, Some("a|b".to_owned())),
            (2, Some("back\\slash \\N".to_owned())),
            (3, Some("two\nlines\r\tand a tab".to_owned())),
            (4, Some("n4".to_owned())),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn incompatible_values_are_reported_with_the_database_message() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let dataset = Dataset::new(vec![
        DatasetColumn::new("cm_id", vec![Cell::Integer(1)]),
        DatasetColumn::new("gdp", vec![Cell::Text("abc".to_owned())]),
    ])
    .unwrap();
    let mut writer =
        create_writer(&database, &working_dir, dataset, MergePolicy::preserve()).await;

    let report = writer.transfer("unused", false).await.unwrap();

    assert!(report.updated_columns.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].cast.as_deref(), Some("double precision"));
    let cause = report.warnings[0].cause.as_deref().unwrap();
    assert!(
        cause.contains("invalid input syntax for type double precision"),
        "unexpected cause: {cause}"
    );

    let gdp = float_column(database.client(), "prod.cm_econ", "country_month_id", "gdp").await;
    assert_eq!(gdp[0], (1, Some(10.0)));
}

#[tokio::test(flavor = "multi_thread")]
async fn created_columns_are_matched_after_a_transfer() {
    init_test_tracing();
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let mut writer = create_writer(
        &database,
        &working_dir,
        econ_dataset(),
        MergePolicy::default(),
    )
    .await;

    let before = writer.reconcile().await.unwrap().clone();
    assert!(before.new_columns().any(|mapping| mapping.destination_name == "new_metric"));

    writer.transfer("econ", false).await.unwrap();

    let after = writer.reconcile().await.unwrap();
    let new: Vec<&str> = after
        .new_columns()
        .map(|mapping| mapping.destination_name.as_str())
        .collect();
    assert_eq!(new, vec!["cm_id"]);

    let new_metric = after
        .matched_columns()
        .find(|mapping| mapping.destination_name == "new_metric")
        .unwrap();
    assert_eq!(new_metric.destination_table.as_deref(), Some("econ"));
}
