use bytes::Bytes;
use std::sync::{Arc, Mutex};

use crate::connection::{IngestConnection, TextRow};
use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;
use crate::sql::Statement;

/// Interaction recorded by a [`RecordingConnection`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Begin,
    Commit,
    Rollback,
    Execute(Statement),
    BatchExecute(String),
    Query(Statement),
    CopyIn { statement: Statement, data: Bytes },
}

impl ConnectionEvent {
    /// SQL text of the event, [`None`] for transaction boundaries.
    pub fn sql(&self) -> Option<&str> {
        match self {
            ConnectionEvent::Begin | ConnectionEvent::Commit | ConnectionEvent::Rollback => None,
            ConnectionEvent::Execute(statement)
            | ConnectionEvent::Query(statement)
            | ConnectionEvent::CopyIn { statement, .. } => Some(statement.sql.as_str()),
            ConnectionEvent::BatchExecute(sql) => Some(sql.as_str()),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    events: Vec<ConnectionEvent>,
    responses: Vec<(String, Vec<TextRow>)>,
    failures: Vec<(String, ErrorKind)>,
    rollback_failure: Option<ErrorKind>,
}

/// [`IngestConnection`] fake recording every interaction.
///
/// Queries return the rows scripted with [`RecordingConnection::respond_to`] for the first
/// pattern contained in their SQL, or no rows. Statements whose SQL contains a pattern
/// registered with [`RecordingConnection::fail_on`] fail with the given kind.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnection {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_to(&self, pattern: &str, rows: Vec<TextRow>) {
        let mut inner = self.inner.lock().unwrap();
        inner.responses.push((pattern.to_owned(), rows));
    }

    pub fn fail_on(&self, pattern: &str, kind: ErrorKind) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.push((pattern.to_owned(), kind));
    }

    /// Makes every rollback fail with `kind`.
    pub fn fail_rollback(&self, kind: ErrorKind) {
        let mut inner = self.inner.lock().unwrap();
        inner.rollback_failure = Some(kind);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.clear();
    }

    pub fn events(&self) -> Vec<ConnectionEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    /// SQL of every recorded statement, transaction boundaries excluded.
    pub fn statements(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| event.sql().map(str::to_owned))
            .collect()
    }

    fn record(&self, event: ConnectionEvent) -> IngestResult<()> {
        let mut inner = self.inner.lock().unwrap();

        let failure = match event.sql() {
            Some(sql) => inner
                .failures
                .iter()
                .find(|(pattern, _)| sql.contains(pattern.as_str()))
                .map(|(pattern, kind)| (*kind, format!("statement matched '{pattern}'"))),
            None if matches!(event, ConnectionEvent::Rollback) => inner
                .rollback_failure
                .map(|kind| (kind, "rollback".to_owned())),
            None => None,
        };
        inner.events.push(event);

        match failure {
            Some((kind, detail)) => Err(ingest_error!(kind, "Scripted connection failure", detail)),
            None => Ok(()),
        }
    }

    fn response(&self, sql: &str) -> Vec<TextRow> {
        let inner = self.inner.lock().unwrap();

        inner
            .responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default()
    }
}

impl IngestConnection for RecordingConnection {
    async fn begin(&self) -> IngestResult<()> {
        self.record(ConnectionEvent::Begin)
    }

    async fn commit(&self) -> IngestResult<()> {
        self.record(ConnectionEvent::Commit)
    }

    async fn rollback(&self) -> IngestResult<()> {
        self.record(ConnectionEvent::Rollback)
    }

    async fn execute(&self, statement: &Statement) -> IngestResult<u64> {
        self.record(ConnectionEvent::Execute(statement.clone()))?;

        Ok(0)
    }

    async fn batch_execute(&self, sql: &str) -> IngestResult<()> {
        self.record(ConnectionEvent::BatchExecute(sql.to_owned()))
    }

    async fn query(&self, statement: &Statement) -> IngestResult<Vec<TextRow>> {
        self.record(ConnectionEvent::Query(statement.clone()))?;

        Ok(self.response(&statement.sql))
    }

    async fn copy_in(&self, statement: &Statement, data: Bytes) -> IngestResult<u64> {
        let rows = data.iter().filter(|byte| **byte == b'\n').count() as u64;
        self.record(ConnectionEvent::CopyIn {
            statement: statement.clone(),
            data,
        })?;

        Ok(rows)
    }
}
