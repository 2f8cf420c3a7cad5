//! Propagation of staged values into the production schema.

mod existing;
mod new_table;

pub use existing::{ColumnWarning, ExistingMergeOutcome, merge_existing_columns};
pub use new_table::{merge_new_table, resolve_table_name};

use ingest_postgres::types::TableName;

use crate::extent::ExtentFilter;
use crate::level::Level;
use crate::staging::StagingTable;

/// What both merges need to know about the session.
#[derive(Debug, Clone, Copy)]
pub struct MergeContext<'a> {
    pub production_schema: &'a str,
    pub level: Level,
    pub staging: &'a StagingTable,
    pub extent: &'a ExtentFilter,
}

impl MergeContext<'_> {
    /// Base table of the level.
    pub fn base(&self) -> TableName {
        TableName::new(self.production_schema, self.level.tablespace())
    }
}
