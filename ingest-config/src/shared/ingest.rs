use serde::Deserialize;
use std::path::PathBuf;

use crate::Config;
use crate::shared::{PgConnectionConfig, ValidationError};

/// Schema holding the canonical entity tables and every merged series.
pub const DEFAULT_PRODUCTION_SCHEMA: &str = "prod";

/// Schema holding the `update_stamp` table with the DDL timestamp cookie.
pub const DEFAULT_METADATA_SCHEMA: &str = "prod_metadata";

/// Schema where transient staging tables are created.
pub const DEFAULT_STAGING_SCHEMA: &str = "public";

/// Rows per statement when staging falls back to parameterized inserts.
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 1000;

/// Name of the working directory under the user's home when none is configured.
pub const DEFAULT_WORKING_DIR_NAME: &str = ".ingester3";

/// Top level configuration of the ingester.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Destination database connection.
    pub database: PgConnectionConfig,
    /// Writer session settings.
    #[serde(default)]
    pub writer: WriterConfig,
}

impl Config for IngestConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.writer.validate()
    }
}

/// Settings of a single writer session.
#[derive(Debug, Clone, Deserialize)]
pub struct WriterConfig {
    /// Directory holding the local result cache and the DDL stamp cookie. When `None`, the
    /// `.ingester3` directory in the user's home is used.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_production_schema")]
    pub production_schema: String,
    #[serde(default = "default_metadata_schema")]
    pub metadata_schema: String,
    #[serde(default = "default_staging_schema")]
    pub staging_schema: String,
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
}

impl WriterConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.insert_batch_size == 0 {
            return Err(ValidationError::InsertBatchSizeZero);
        }

        for (field, value) in [
            ("production_schema", &self.production_schema),
            ("metadata_schema", &self.metadata_schema),
            ("staging_schema", &self.staging_schema),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptySchemaName(field));
            }
        }

        Ok(())
    }

    /// Returns the configured working directory, falling back to `$HOME/.ingester3`, or to a
    /// relative `.ingester3` when no home directory is known.
    pub fn resolved_working_dir(&self) -> PathBuf {
        if let Some(working_dir) = &self.working_dir {
            return working_dir.clone();
        }

        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(DEFAULT_WORKING_DIR_NAME),
            None => PathBuf::from(DEFAULT_WORKING_DIR_NAME),
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            production_schema: default_production_schema(),
            metadata_schema: default_metadata_schema(),
            staging_schema: default_staging_schema(),
            insert_batch_size: default_insert_batch_size(),
        }
    }
}

fn default_production_schema() -> String {
    DEFAULT_PRODUCTION_SCHEMA.to_string()
}

fn default_metadata_schema() -> String {
    DEFAULT_METADATA_SCHEMA.to_string()
}

fn default_staging_schema() -> String {
    DEFAULT_STAGING_SCHEMA.to_string()
}

fn default_insert_batch_size() -> usize {
    DEFAULT_INSERT_BATCH_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_defaults_are_applied() {
        let config: IngestConfig = serde_json::from_value(serde_json::json!({
            "database": {
                "host": "localhost",
                "port": 5432,
                "name": "fallback3",
                "username": "ingester",
                "tls": { "trusted_root_certs": "", "enabled": false }
            }
        }))
        .unwrap();

        assert_eq!(config.writer.production_schema, "prod");
        assert_eq!(config.writer.metadata_schema, "prod_metadata");
        assert_eq!(config.writer.staging_schema, "public");
        assert_eq!(config.writer.insert_batch_size, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let writer = WriterConfig {
            insert_batch_size: 0,
            ..WriterConfig::default()
        };

        assert_eq!(writer.validate(), Err(ValidationError::InsertBatchSizeZero));
    }

    #[test]
    fn explicit_working_dir_wins() {
        let writer = WriterConfig {
            working_dir: Some(PathBuf::from("/tmp/ingester")),
            ..WriterConfig::default()
        };

        assert_eq!(writer.resolved_working_dir(), PathBuf::from("/tmp/ingester"));
    }
}
