use ingest::cache::{CacheManager, MemoryResultCache};
use ingest::dataset::{Dataset, DatasetColumn};
use ingest::failpoints::{MERGE_COPY_COLUMN, STAGING_COPY_IN};
use ingest::level::Level;
use ingest::reconcile::MergePolicy;
use ingest::staging::StagingPath;
use ingest::test_utils::database::{connect, spawn_database, test_working_dir, writer_config};
use ingest::test_utils::failpoints::FailpointGuard;
use ingest::test_utils::fixtures::{create_production_schema, econ_dataset, float_column};
use ingest::types::Cell;
use ingest::writer::IngestWriter;
use ingest_config::shared::DEFAULT_METADATA_SCHEMA;
use ingest_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn rejected_copy_falls_back_to_row_inserts() {
    init_test_tracing();
    let _guard = FailpointGuard::setup(&[(STAGING_COPY_IN, "return(format)")]);
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let cache_manager = CacheManager::new(
        MemoryResultCache::new(),
        &working_dir,
        DEFAULT_METADATA_SCHEMA,
    );
    let mut writer = IngestWriter::new(
        connect(&database).await,
        cache_manager,
        econ_dataset(),
        Level::Cm,
        MergePolicy::default(),
        writer_config(working_dir.clone()),
    )
    .unwrap();
    writer.set_time_extent(vec![1, 2, 3]);

    let report = writer.transfer("econ", false).await.unwrap();

    assert_eq!(report.staging_path, StagingPath::RowInsert);
    assert_eq!(report.updated_columns, vec!["gdp"]);

    // Same content as the copy path would produce.
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
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_column_is_rolled_back_and_merge_continues() {
    init_test_tracing();
    let _guard = FailpointGuard::setup(&[(MERGE_COPY_COLUMN, "1*return(conversion)")]);
    let database = spawn_database().await;
    create_production_schema(database.client()).await;
    let working_dir = test_working_dir();

    let dataset = Dataset::new(vec![
        DatasetColumn::new("cm_id", vec![Cell::Integer(1), Cell::Integer(2)]),
        DatasetColumn::new("gdp", vec![Cell::Float(1.5), Cell::Float(2.5)]),
        DatasetColumn::new(
            "note",
            vec![Cell::Text("first".to_owned()), Cell::Text("second".to_owned())],
        ),
    ])
    .unwrap();
    let cache_manager = CacheManager::new(
        MemoryResultCache::new(),
        &working_dir,
        DEFAULT_METADATA_SCHEMA,
    );
    let mut writer = IngestWriter::new(
        connect(&database).await,
        cache_manager,
        dataset,
        Level::Cm,
        MergePolicy::default(),
        writer_config(working_dir.clone()),
    )
    .unwrap();

    let report = writer.transfer("unused", false).await.unwrap();

    assert_eq!(report.updated_columns, vec!["note"]);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].column, "gdp");
    assert_eq!(report.warnings[0].table, "cm_econ");

    // The zeroing of the failed column was rolled back with it.
    let gdp = float_column(database.client(), "prod.cm_econ", "country_month_id", "gdp").await;
    assert_eq!(
        gdp,
        vec![
            (1, Some(10.0)),
            (2, Some(20.0)),
            (3, Some(30.0)),
            (4, Some(40.0)),
            (5, Some(50.0)),
            (6, Some(60.0)),
        ]
    );

    let notes = database
        .client()
        .query(
            "select note from prod.cm_econ where country_month_id <= 3 order by country_month_id",
            &[],
        )
        .await
        .unwrap();
    let notes: Vec<Option<String>> = notes.iter().map(|row| row.get(0)).collect();
    assert_eq!(
        notes,
        vec![
            Some("first".to_owned()),
            Some("second".to_owned()),
            Some(String::new())
        ]
    );
}
