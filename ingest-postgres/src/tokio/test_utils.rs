use ingest_config::shared::{INGEST_ADMIN_OPTIONS, IntoConnectOptions, PgConnectionConfig};
use tokio::runtime::Handle;
use tokio_postgres::{Client, NoTls};
use tracing::error;

use crate::sqlx::test_utils::{create_pg_database, drop_pg_database};

/// A throwaway database living for the duration of a test.
///
/// The database is created on [`PgDatabase::new`] and dropped when the value is dropped. Dropping
/// blocks on the current runtime, so tests must use the multi-threaded runtime flavor.
pub struct PgDatabase {
    pub config: PgConnectionConfig,
    pub client: Option<Client>,
}

impl PgDatabase {
    /// Creates the database described by `config` and connects to it without TLS.
    ///
    /// # Panics
    /// Panics if the database cannot be created or connected to.
    pub async fn new(config: PgConnectionConfig) -> Self {
        create_pg_database(&config).await;
        let client = connect_client(&config).await;

        Self {
            config,
            client: Some(client),
        }
    }

    /// Returns the administrative client of this database.
    ///
    /// # Panics
    /// Panics if the client was already taken.
    pub fn client(&self) -> &Client {
        self.client
            .as_ref()
            .expect("The database client was already dropped")
    }

    /// Opens an additional connection to this database.
    pub async fn new_client(&self) -> Client {
        connect_client(&self.config).await
    }
}

impl Drop for PgDatabase {
    fn drop(&mut self) {
        // The client must go first, otherwise the drop waits on our own connection.
        self.client.take();

        let config = self.config.clone();
        tokio::task::block_in_place(move || {
            Handle::current().block_on(async move { drop_pg_database(&config).await });
        });
    }
}

async fn connect_client(config: &PgConnectionConfig) -> Client {
    let connect_options: tokio_postgres::Config = config.with_db(Some(&INGEST_ADMIN_OPTIONS));
    let (client, connection) = connect_options
        .connect(NoTls)
        .await
        .expect("Failed to connect to the test database");

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("test database connection error: {}", e);
        }
    });

    client
}
