use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::ResultCache;
use crate::error::IngestResult;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Value>,
    invalidations: usize,
}

/// Process-local [`ResultCache`], shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryResultCache {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    /// Number of times the cache was invalidated.
    pub async fn invalidations(&self) -> usize {
        self.inner.lock().await.invalidations
    }
}

impl ResultCache for MemoryResultCache {
    async fn get(&self, key: &str) -> IngestResult<Option<Value>> {
        let inner = self.inner.lock().await;

        Ok(inner.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> IngestResult<()> {
        let mut inner = self.inner.lock().await;
        inner.entries.insert(key.to_owned(), value);

        Ok(())
    }

    async fn invalidate_all(&self) -> IngestResult<()> {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.invalidations += 1;

        Ok(())
    }
}
