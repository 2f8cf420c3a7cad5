use anyhow::{Context, bail};
use ingest::cache::{CacheManager, DiskResultCache};
use ingest::connection::PgConnection;
use ingest::dataset::Dataset;
use ingest::writer::IngestWriter;
use ingest_config::load_config;
use ingest_config::shared::IngestConfig;
use std::path::Path;
use tracing::{info, warn};

use crate::args::Args;

/// Loads and validates the ingester configuration from `./configuration`.
pub fn load_ingest_config() -> anyhow::Result<IngestConfig> {
    let config = load_config::<IngestConfig>()?;
    config.validate()?;

    Ok(config)
}

/// Runs one writer session as described by `args`.
pub async fn run(args: Args, config: IngestConfig, working_dir: &Path) -> anyhow::Result<()> {
    let json = tokio::fs::read_to_string(&args.data)
        .await
        .with_context(|| format!("failed to read the dataset `{}`", args.data.display()))?;
    let dataset = Dataset::from_json_records(&json)?;
    info!(
        rows = dataset.row_count(),
        columns = dataset.columns().len(),
        level = %args.level,
        "loaded dataset"
    );

    let connection = PgConnection::connect(&config.database).await?;
    let cache_manager = CacheManager::new(
        DiskResultCache::new(working_dir),
        working_dir,
        config.writer.metadata_schema.clone(),
    );

    let mut writer = IngestWriter::new(
        connection,
        cache_manager,
        dataset,
        args.level,
        args.policy(),
        config.writer,
    )?;

    if let Some(time_extent) = args.time_extent {
        writer.set_time_extent(time_extent);
    }
    if let (Some(min), Some(max)) = (args.time_min, args.time_max) {
        writer.set_time_extent_range(min, max);
    }
    if let Some(space_extent) = args.space_extent {
        writer.set_space_extent(space_extent);
    }

    if args.dry_run {
        let recipe = writer.reconcile().await?;
        println!("{}", serde_json::to_string_pretty(recipe)?);

        return Ok(());
    }

    let Some(table) = args.table else {
        bail!("a table name is required unless running with --dry-run");
    };

    let report = writer.transfer(&table, args.overwrite).await?;
    for warning in &report.warnings {
        warn!(
            column = %warning.column,
            table = %warning.table,
            cause = warning.cause.as_deref().unwrap_or("unknown"),
            "{}",
            warning.message
        );
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
