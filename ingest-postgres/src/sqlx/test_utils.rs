use ingest_config::shared::{INGEST_ADMIN_OPTIONS, IntoConnectOptions, PgConnectionConfig};
use sqlx::{Connection, Executor, PgConnection};

/// Creates a new Postgres database named after [`PgConnectionConfig::name`].
///
/// # Panics
/// Panics if connection or database creation fails.
pub async fn create_pg_database(config: &PgConnectionConfig) {
    let mut connection = PgConnection::connect_with(&config.without_db(Some(&INGEST_ADMIN_OPTIONS)))
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"create database "{}";"#, config.name))
        .await
        .expect("Failed to create database");
}

/// Drops a Postgres database and terminates all connections to it.
///
/// Never panics: cleanup failures are printed and ignored so that a failing test reports its
/// own error rather than the teardown's.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let mut connection =
        match PgConnection::connect_with(&config.without_db(Some(&INGEST_ADMIN_OPTIONS))).await {
            Ok(conn) => conn,
            Err(e) => {
                eprintln!("warning: failed to connect to Postgres for cleanup: {e}");
                return;
            }
        };

    if let Err(e) = connection
        .execute(&*format!(
            r#"
            select pg_terminate_backend(pg_stat_activity.pid)
            from pg_stat_activity
            where pg_stat_activity.datname = '{}'
            and pid <> pg_backend_pid();"#,
            config.name
        ))
        .await
    {
        eprintln!(
            "warning: failed to terminate connections for database {}: {}",
            config.name, e
        );
    }

    if let Err(e) = connection
        .execute(&*format!(r#"drop database if exists "{}";"#, config.name))
        .await
    {
        eprintln!("warning: failed to drop database {}: {}", config.name, e);
    }
}
