use ingest_config::shared::{PgConnectionConfig, TlsConfig, WriterConfig};
use ingest_postgres::tokio::test_utils::PgDatabase;
use std::path::PathBuf;
use uuid::Uuid;

use crate::connection::PgConnection;

/// Connection settings of a uniquely named database on the local test server.
///
/// Configuration is read from environment variables:
/// - `TESTS_DATABASE_HOST`: Postgres server hostname (required)
/// - `TESTS_DATABASE_PORT`: Postgres server port (required)
/// - `TESTS_DATABASE_USERNAME`: Database user (required)
/// - `TESTS_DATABASE_PASSWORD`: Database password (optional)
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
        tls: TlsConfig::disabled(),
        keepalive: None,
    }
}

/// Creates a fresh database, dropped together with the returned value.
pub async fn spawn_database() -> PgDatabase {
    PgDatabase::new(local_pg_connection_config()).await
}

/// Opens a writer connection to `database`.
pub async fn connect(database: &PgDatabase) -> PgConnection {
    PgConnection::connect(&database.config)
        .await
        .expect("Failed to open a writer connection")
}

/// Returns a working directory unique to the calling test.
pub fn test_working_dir() -> PathBuf {
    std::env::temp_dir().join(format!("ingest-test-{}", Uuid::new_v4().simple()))
}

/// Writer settings using the default schemas and `working_dir`.
pub fn writer_config(working_dir: PathBuf) -> WriterConfig {
    WriterConfig {
        working_dir: Some(working_dir),
        ..WriterConfig::default()
    }
}
