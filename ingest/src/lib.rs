//! Ingests tabular datasets into a production Postgres schema organized by levels of analysis.
//!
//! A dataset is a set of named columns keyed by the canonical id column of a [`level::Level`],
//! such as `cm_id` for country-months. An [`writer::IngestWriter`] session reconciles the
//! dataset against the tables of the level, stages it into a transient table and merges it:
//! columns unknown to the schema become a new table keyed by the level base table, known
//! columns are updated in place, subject to the [`extent::ExtentFilter`] and the
//! [`reconcile::MergePolicy`].
//!
//! ```rust,no_run
//! use ingest::cache::{CacheManager, DiskResultCache};
//! use ingest::connection::PgConnection;
//! use ingest::dataset::Dataset;
//! use ingest::error::IngestResult;
//! use ingest::level::Level;
//! use ingest::reconcile::MergePolicy;
//! use ingest::writer::IngestWriter;
//! use ingest_config::shared::IngestConfig;
//!
//! async fn ingest(config: IngestConfig, dataset: Dataset) -> IngestResult<()> {
//!     let connection = PgConnection::connect(&config.database).await?;
//!     let working_dir = config.writer.resolved_working_dir();
//!     let cache = DiskResultCache::new(&working_dir);
//!     let cache_manager = CacheManager::new(cache, &working_dir, &config.writer.metadata_schema);
//!
//!     let mut writer = IngestWriter::new(
//!         connection,
//!         cache_manager,
//!         dataset,
//!         Level::Cm,
//!         MergePolicy::default(),
//!         config.writer,
//!     )?;
//!     writer.set_time_extent_range(100, 600);
//!     writer.transfer("my_series", false).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod connection;
pub mod conversions;
pub mod dataset;
pub mod error;
pub mod extent;
pub mod failpoints;
pub mod level;
mod macros;
pub mod merge;
pub mod reconcile;
pub mod schema;
pub mod sql;
pub mod staging;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod writer;
