//! Shared configuration types for the ingester.

mod base;
mod connection;
mod ingest;

pub use base::ValidationError;
pub use connection::{
    INGEST_ADMIN_OPTIONS, INGEST_WRITER_OPTIONS, IntoConnectOptions, PgConnectionConfig,
    PgConnectionConfigWithoutSecrets, PgConnectionOptions, TcpKeepaliveConfig, TlsConfig,
};
pub use ingest::{
    DEFAULT_INSERT_BATCH_SIZE, DEFAULT_METADATA_SCHEMA, DEFAULT_PRODUCTION_SCHEMA,
    DEFAULT_STAGING_SCHEMA, DEFAULT_WORKING_DIR_NAME, IngestConfig, WriterConfig,
};
