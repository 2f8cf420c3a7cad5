//! Memoization of schema introspection, invalidated by the DDL stamp of the database.

mod base;
mod disk;
mod manager;
mod memory;

pub use base::ResultCache;
pub use disk::DiskResultCache;
pub use manager::{CacheManager, STAMP_FILE_NAME, should_invalidate};
pub use memory::MemoryResultCache;
