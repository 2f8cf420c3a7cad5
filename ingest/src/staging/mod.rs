//! Materialization of incoming datasets into transient staging tables.

mod encoding;
mod loader;
mod table;

pub use encoding::encode_copy_text;
pub use loader::{
    StagingPath, delete_spurious_rows, drop_staging, index_staging, staging_columns, write_staging,
};
pub use table::StagingTable;
