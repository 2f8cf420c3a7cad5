//! Writer sessions, sequencing a dataset from reconciliation to merged production tables.

use ingest_config::shared::WriterConfig;
use ingest_postgres::types::TableName;
use serde::Serialize;
use tracing::info;

use crate::bail;
use crate::cache::{CacheManager, ResultCache};
use crate::connection::IngestConnection;
use crate::dataset::Dataset;
use crate::error::{ErrorKind, IngestResult};
use crate::extent::ExtentFilter;
use crate::level::Level;
use crate::merge::{
    ColumnWarning, ExistingMergeOutcome, MergeContext, merge_existing_columns, merge_new_table,
};
use crate::reconcile::{MergePolicy, Recipe, reconcile};
use crate::schema::fetch_columns;
use crate::staging::{self, StagingPath, StagingTable};

/// Summary of a completed [`IngestWriter::transfer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub staging_path: StagingPath,
    /// Table created for the new columns, if any.
    pub new_table: Option<TableName>,
    /// Existing columns that received the staged values.
    pub updated_columns: Vec<String>,
    /// Existing columns left untouched because of incompatible values.
    pub warnings: Vec<ColumnWarning>,
}

/// A session merging one dataset into the production schema.
///
/// The session owns its staging table, its recipe and its extent. The recipe is computed
/// lazily and discarded after every [`IngestWriter::transfer`], so a reused session always
/// reconciles against the current schema.
#[derive(Debug)]
pub struct IngestWriter<C, R> {
    connection: C,
    cache_manager: CacheManager<R>,
    dataset: Dataset,
    level: Level,
    policy: MergePolicy,
    config: WriterConfig,
    extent: ExtentFilter,
    staging: StagingTable,
    recipe: Option<Recipe>,
    staging_path: Option<StagingPath>,
}

impl<C, R> IngestWriter<C, R>
where
    C: IngestConnection,
    R: ResultCache,
{
    /// Creates a session for `dataset` at `level`.
    ///
    /// Column names are stripped and lower-cased, and identifier columns of other levels are
    /// dropped. The dataset must contain the canonical id column of the level with unique,
    /// non-null integers; this is checked before any database access.
    pub fn new(
        connection: C,
        cache_manager: CacheManager<R>,
        mut dataset: Dataset,
        level: Level,
        policy: MergePolicy,
        config: WriterConfig,
    ) -> IngestResult<Self> {
        config.validate()?;

        let id_column = level.id_column();
        dataset.normalize_column_names();
        let dropped = dataset.drop_foreign_ids(&id_column);
        if !dropped.is_empty() {
            info!(?dropped, "dropped identifier columns of other levels");
        }
        dataset.validate_key(&id_column)?;

        let staging = StagingTable::generate(&config.staging_schema);

        Ok(Self {
            connection,
            cache_manager,
            dataset,
            level,
            policy,
            config,
            extent: ExtentFilter::default(),
            staging,
            recipe: None,
            staging_path: None,
        })
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn staging_table(&self) -> &StagingTable {
        &self.staging
    }

    /// How the staging table was last filled, if it was.
    pub fn staging_path(&self) -> Option<StagingPath> {
        self.staging_path
    }

    pub fn set_time_extent(&mut self, ids: Vec<i64>) {
        self.extent.set_time_extent(ids);
    }

    pub fn set_time_extent_range(&mut self, min: i64, max: i64) {
        self.extent.set_time_extent_range(min, max);
    }

    pub fn set_space_extent(&mut self, ids: Vec<i64>) {
        self.extent.set_space_extent(ids);
    }

    pub fn extent(&self) -> &ExtentFilter {
        &self.extent
    }

    /// Recomputes the recipe against the current destination schema.
    pub async fn reconcile(&mut self) -> IngestResult<&Recipe> {
        self.cache_manager.check(&self.connection).await?;

        let catalog = fetch_columns(
            &self.connection,
            self.cache_manager.cache(),
            &self.config.production_schema,
            self.level,
        )
        .await?;

        let recipe = reconcile(&self.dataset, &catalog, self.policy);
        info!(
            columns = recipe.len(),
            new = recipe.new_columns().count(),
            "reconciled dataset"
        );

        Ok(self.recipe.insert(recipe))
    }

    /// The current recipe, if one was computed since the last transfer.
    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    async fn ensure_recipe(&mut self) -> IngestResult<()> {
        if self.recipe.is_none() {
            self.reconcile().await?;
        }

        Ok(())
    }

    fn current_recipe(&self) -> IngestResult<&Recipe> {
        match &self.recipe {
            Some(recipe) => Ok(recipe),
            None => bail!(ErrorKind::InvalidState, "No recipe was computed"),
        }
    }

    fn merge_context(&self) -> MergeContext<'_> {
        MergeContext {
            production_schema: &self.config.production_schema,
            level: self.level,
            staging: &self.staging,
            extent: &self.extent,
        }
    }

    /// Creates the staging table and fills it with the dataset renamed per the recipe.
    pub async fn write_staging(&mut self) -> IngestResult<StagingPath> {
        self.ensure_recipe().await?;

        let renamed = self
            .dataset
            .renamed(&self.current_recipe()?.destination_names())?;
        let path = staging::write_staging(
            &self.connection,
            &self.staging,
            &renamed,
            self.config.insert_batch_size,
        )
        .await?;
        self.staging_path = Some(path);

        Ok(path)
    }

    pub async fn index_staging(&self) -> IngestResult<()> {
        staging::index_staging(&self.connection, &self.staging, &self.level.id_column()).await
    }

    /// Removes staged rows outside the extent, returning how many were removed.
    pub async fn delete_spurious_rows(&self) -> IngestResult<u64> {
        let base = self.merge_context().base();
        let inside = self.extent.inside(self.level);

        staging::delete_spurious_rows(
            &self.connection,
            &self.staging,
            &self.level.id_column(),
            &base,
            inside.as_ref(),
        )
        .await
    }

    /// Creates a production table for the new columns of the recipe.
    ///
    /// The result cache is cleared once the table exists.
    pub async fn new_transfer(
        &mut self,
        name: &str,
        overwrite: bool,
    ) -> IngestResult<Option<TableName>> {
        self.cache_manager.check(&self.connection).await?;
        self.ensure_recipe().await?;

        let created = merge_new_table(
            &self.connection,
            self.current_recipe()?,
            &self.merge_context(),
            name,
            overwrite,
        )
        .await?;

        if created.is_some() {
            self.cache_manager.clear(&self.connection).await?;
        }

        Ok(created)
    }

    /// Merges the staged values into the existing columns of the recipe.
    pub async fn old_transfer(&mut self) -> IngestResult<ExistingMergeOutcome> {
        self.cache_manager.check(&self.connection).await?;
        self.ensure_recipe().await?;

        merge_existing_columns(
            &self.connection,
            self.current_recipe()?,
            &self.merge_context(),
        )
        .await
    }

    pub async fn drop_staging(&self) -> IngestResult<()> {
        staging::drop_staging(&self.connection, &self.staging).await
    }

    /// Runs the whole sequence: staging, indexing, spurious row cleanup, new-table merge,
    /// existing-column merge and staging cleanup.
    ///
    /// The recipe is reset afterwards. If a step fails the staging table may be left behind,
    /// [`IngestWriter::drop_staging`] removes it.
    pub async fn transfer(&mut self, name: &str, overwrite: bool) -> IngestResult<TransferReport> {
        info!(staging = %self.staging.name(), "writing staging table");
        let staging_path = self.write_staging().await?;

        info!("indexing staging table");
        self.index_staging().await?;

        info!("deleting spurious staged rows");
        self.delete_spurious_rows().await?;

        info!("creating new table if needed");
        let new_table = self.new_transfer(name, overwrite).await?;

        info!("updating existing tables");
        let outcome = self.old_transfer().await?;

        info!("cleaning up");
        self.drop_staging().await?;

        self.recipe = None;

        Ok(TransferReport {
            staging_path,
            new_table,
            updated_columns: outcome.updated_columns,
            warnings: outcome.warnings,
        })
    }
}
