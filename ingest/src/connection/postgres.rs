use bytes::Bytes;
use futures::SinkExt;
use ingest_config::shared::{INGEST_WRITER_OPTIONS, IntoConnectOptions, PgConnectionConfig};
use rustls::ClientConfig;
use std::io::BufReader;
use std::pin::pin;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Client, Config, Connection, NoTls, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error, info};

use crate::connection::{IngestConnection, TextRow};
use crate::error::IngestResult;
use crate::sql::Statement;

/// Spawns a background task driving a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        let result = connection.await;

        match result {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => info!("postgres connection terminated successfully"),
        }
    }
    .instrument(span);

    // The connection ends when the `Client` is dropped, so the handle is not kept.
    tokio::spawn(task);
}

/// [`IngestConnection`] backed by a [`tokio_postgres::Client`].
#[derive(Debug)]
pub struct PgConnection {
    client: Client,
}

impl PgConnection {
    /// Connects to the configured database, with TLS when enabled.
    pub async fn connect(pg_connection_config: &PgConnectionConfig) -> IngestResult<Self> {
        match pg_connection_config.tls.enabled {
            true => PgConnection::connect_tls(pg_connection_config).await,
            false => PgConnection::connect_no_tls(pg_connection_config).await,
        }
    }

    async fn connect_no_tls(pg_connection_config: &PgConnectionConfig) -> IngestResult<Self> {
        let config: Config = pg_connection_config.with_db(Some(&INGEST_WRITER_OPTIONS));

        let (client, connection) = config.connect(NoTls).await?;
        spawn_postgres_connection::<NoTls>(connection);

        info!("successfully connected to postgres without tls");

        Ok(PgConnection { client })
    }

    async fn connect_tls(pg_connection_config: &PgConnectionConfig) -> IngestResult<Self> {
        let config: Config = pg_connection_config.with_db(Some(&INGEST_WRITER_OPTIONS));

        let mut root_store = rustls::RootCertStore::empty();
        let mut root_certs_reader =
            BufReader::new(pg_connection_config.tls.trusted_root_certs.as_bytes());
        for cert in rustls_pemfile::certs(&mut root_certs_reader) {
            let cert = cert?;
            root_store.add(cert)?;
        }

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let (client, connection) = config.connect(MakeRustlsConnect::new(tls_config)).await?;
        spawn_postgres_connection::<MakeRustlsConnect>(connection);

        info!("successfully connected to postgres with tls");

        Ok(PgConnection { client })
    }

    /// Wraps an already connected client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl IngestConnection for PgConnection {
    async fn begin(&self) -> IngestResult<()> {
        self.client.simple_query("begin;").await?;

        Ok(())
    }

    async fn commit(&self) -> IngestResult<()> {
        self.client.simple_query("commit;").await?;

        Ok(())
    }

    async fn rollback(&self) -> IngestResult<()> {
        self.client.simple_query("rollback;").await?;

        Ok(())
    }

    async fn execute(&self, statement: &Statement) -> IngestResult<u64> {
        debug!(sql = %statement.sql, params = statement.params.len(), "executing statement");

        let rows = self
            .client
            .execute(statement.sql.as_str(), &statement.params_as_sql())
            .await?;

        Ok(rows)
    }

    async fn batch_execute(&self, sql: &str) -> IngestResult<()> {
        debug!(sql, "executing batch");

        self.client.batch_execute(sql).await?;

        Ok(())
    }

    async fn query(&self, statement: &Statement) -> IngestResult<Vec<TextRow>> {
        debug!(sql = %statement.sql, params = statement.params.len(), "running query");

        let rows = self
            .client
            .query(statement.sql.as_str(), &statement.params_as_sql())
            .await?;

        let mut text_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let mut text_row = Vec::with_capacity(row.len());
            for index in 0..row.len() {
                text_row.push(row.try_get::<_, Option<String>>(index)?);
            }
            text_rows.push(text_row);
        }

        Ok(text_rows)
    }

    async fn copy_in(&self, statement: &Statement, data: Bytes) -> IngestResult<u64> {
        debug!(sql = %statement.sql, bytes = data.len(), "copying into table");

        let sink = self.client.copy_in::<_, Bytes>(statement.sql.as_str()).await?;
        let mut sink = pin!(sink);
        sink.send(data).await?;
        let rows = sink.as_mut().finish().await?;

        Ok(rows)
    }
}
