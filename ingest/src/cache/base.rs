use serde_json::Value;
use std::future::Future;

use crate::error::IngestResult;

/// Key-value store for memoized lookups.
///
/// Values are JSON documents so that any serializable lookup result can be stored, and the
/// whole store is dropped at once when the destination schema changes.
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = IngestResult<Option<Value>>> + Send;

    fn put(&self, key: &str, value: Value) -> impl Future<Output = IngestResult<()>> + Send;

    /// Removes every entry.
    fn invalidate_all(&self) -> impl Future<Output = IngestResult<()>> + Send;
}
