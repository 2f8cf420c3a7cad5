use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::cache::ResultCache;
use crate::error::IngestResult;

/// Name of the cache directory inside the working directory.
pub const CACHE_DIR_NAME: &str = "db_cache";

/// [`ResultCache`] persisting one JSON file per key under `<working_dir>/db_cache`.
///
/// File names are the hex encoding of the key, so any key maps to a valid file name.
#[derive(Debug, Clone)]
pub struct DiskResultCache {
    directory: PathBuf,
}

impl DiskResultCache {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            directory: working_dir.join(CACHE_DIR_NAME),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", encode_hex(key.as_bytes())))
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

impl ResultCache for DiskResultCache {
    async fn get(&self, key: &str) -> IngestResult<Option<Value>> {
        let path = self.entry_path(key);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&contents) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(path = %path.display(), "ignoring unreadable cache entry: {}", err);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, value: Value) -> IngestResult<()> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let path = self.entry_path(key);
        let temporary_path = path.with_extension("json.tmp");
        tokio::fs::write(&temporary_path, serde_json::to_vec(&value)?).await?;
        tokio::fs::rename(&temporary_path, &path).await?;

        Ok(())
    }

    async fn invalidate_all(&self) -> IngestResult<()> {
        match tokio::fs::remove_dir_all(&self.directory).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        tokio::fs::create_dir_all(&self.directory).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temporary_working_dir() -> PathBuf {
        std::env::temp_dir().join(format!("ingest-cache-{}", uuid::Uuid::new_v4().simple()))
    }

    #[test]
    fn keys_are_hex_encoded() {
        assert_eq!(encode_hex(b"cm/1"), "636d2f31");
    }

    #[tokio::test]
    async fn entries_survive_new_instances() {
        let working_dir = temporary_working_dir();

        let cache = DiskResultCache::new(&working_dir);
        cache.put("columns:cm", json!({"gdp": "float"})).await.unwrap();

        let reopened = DiskResultCache::new(&working_dir);
        assert_eq!(
            reopened.get("columns:cm").await.unwrap(),
            Some(json!({"gdp": "float"}))
        );
        assert_eq!(reopened.get("columns:cy").await.unwrap(), None);

        std::fs::remove_dir_all(&working_dir).unwrap();
    }

    #[tokio::test]
    async fn invalidation_empties_the_directory() {
        let working_dir = temporary_working_dir();
        let cache = DiskResultCache::new(&working_dir);
        cache.put("a", json!(1)).await.unwrap();

        cache.invalidate_all().await.unwrap();

        assert_eq!(cache.get("a").await.unwrap(), None);
        assert!(cache.directory().exists());

        std::fs::remove_dir_all(&working_dir).unwrap();
    }

    #[tokio::test]
    async fn unreadable_entries_are_misses() {
        let working_dir = temporary_working_dir();
        let cache = DiskResultCache::new(&working_dir);
        std::fs::create_dir_all(cache.directory()).unwrap();
        std::fs::write(cache.entry_path("a"), b"{not json").unwrap();

        assert_eq!(cache.get("a").await.unwrap(), None);

        std::fs::remove_dir_all(&working_dir).unwrap();
    }
}
