use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::bail;
use crate::cache::ResultCache;
use crate::connection::IngestConnection;
use crate::conversions::parse_i64;
use crate::error::{ErrorKind, IngestResult};
use crate::sql::ddl_stamp;

/// Name of the file persisting the last seen DDL stamp inside the working directory.
pub const STAMP_FILE_NAME: &str = "ddlm_stamp.cache";

/// Decides whether cached lookups are stale.
///
/// A stamp of zero means it could not be read. Without both a reachable database and a usable
/// local cache nothing can be trusted, which is an error.
pub fn should_invalidate(local_stamp: i64, remote_stamp: i64) -> IngestResult<bool> {
    if local_stamp == 0 && remote_stamp == 0 {
        bail!(
            ErrorKind::CacheUnavailable,
            "Cannot connect to the database and there is no working cache"
        );
    }

    Ok(local_stamp < remote_stamp)
}

/// Keeps a [`ResultCache`] consistent with the structural state of the database.
///
/// The database bumps a DDL stamp on every structural change. The manager persists the stamp
/// it last synchronized with, and drops the cache when the database moved past it.
#[derive(Debug, Clone)]
pub struct CacheManager<R> {
    cache: R,
    stamp_path: PathBuf,
    metadata_schema: String,
}

impl<R> CacheManager<R>
where
    R: ResultCache,
{
    pub fn new(cache: R, working_dir: &Path, metadata_schema: impl Into<String>) -> Self {
        Self {
            cache,
            stamp_path: working_dir.join(STAMP_FILE_NAME),
            metadata_schema: metadata_schema.into(),
        }
    }

    pub fn cache(&self) -> &R {
        &self.cache
    }

    /// Reads the DDL stamp of the database, zero when it cannot be read.
    pub async fn remote_stamp<C: IngestConnection>(&self, connection: &C) -> i64 {
        let rows = match connection.query(&ddl_stamp(&self.metadata_schema)).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!("could not read the ddl stamp from the database: {}", err);
                return 0;
            }
        };

        match rows.first().and_then(|row| row.first()).cloned().flatten() {
            Some(stamp) => parse_i64(&stamp).unwrap_or_else(|err| {
                warn!("ignoring malformed ddl stamp '{}': {}", stamp, err);
                0
            }),
            None => 0,
        }
    }

    /// Reads the locally persisted stamp, zero when there is none.
    pub async fn local_stamp(&self) -> IngestResult<i64> {
        let contents = match tokio::fs::read_to_string(&self.stamp_path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        match parse_i64(&contents) {
            Ok(stamp) => Ok(stamp),
            Err(err) => {
                warn!(path = %self.stamp_path.display(), "ignoring malformed local stamp: {}", err);
                Ok(0)
            }
        }
    }

    /// Drops the cache if the database changed structurally since the last synchronization.
    pub async fn check<C: IngestConnection>(&self, connection: &C) -> IngestResult<()> {
        let local_stamp = self.local_stamp().await?;
        let remote_stamp = self.remote_stamp(connection).await;

        if should_invalidate(local_stamp, remote_stamp)? {
            info!(local_stamp, remote_stamp, "result cache is stale, invalidating");
            self.reset(remote_stamp).await?;
        }

        Ok(())
    }

    /// Drops the cache unconditionally and synchronizes with the current database stamp.
    pub async fn clear<C: IngestConnection>(&self, connection: &C) -> IngestResult<()> {
        let remote_stamp = self.remote_stamp(connection).await;
        info!(remote_stamp, "clearing result cache");

        self.reset(remote_stamp).await
    }

    async fn reset(&self, stamp: i64) -> IngestResult<()> {
        self.cache.invalidate_all().await?;

        if let Some(parent) = self.stamp_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.stamp_path, stamp.to_string()).await?;

        Ok(())
    }
}
