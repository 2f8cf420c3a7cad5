use bytes::Bytes;
use std::future::Future;

use crate::error::IngestResult;
use crate::sql::Statement;

/// A result row with every selected column rendered as text.
pub type TextRow = Vec<Option<String>>;

/// Relational connection used by a writer session.
///
/// A session drives a single connection sequentially. Transaction boundaries are explicit:
/// statements issued between [`IngestConnection::begin`] and [`IngestConnection::commit`] or
/// [`IngestConnection::rollback`] belong to the same transaction, every other statement runs in
/// its own implicit transaction.
pub trait IngestConnection: Send + Sync {
    fn begin(&self) -> impl Future<Output = IngestResult<()>> + Send;

    fn commit(&self) -> impl Future<Output = IngestResult<()>> + Send;

    fn rollback(&self) -> impl Future<Output = IngestResult<()>> + Send;

    /// Executes a statement and returns the number of affected rows.
    fn execute(&self, statement: &Statement) -> impl Future<Output = IngestResult<u64>> + Send;

    /// Executes one or more statements without parameters.
    fn batch_execute(&self, sql: &str) -> impl Future<Output = IngestResult<()>> + Send;

    /// Runs a query whose selected columns are all of type `text`.
    fn query(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = IngestResult<Vec<TextRow>>> + Send;

    /// Streams `data` into a `COPY ... FROM STDIN` statement and returns the copied row count.
    fn copy_in(
        &self,
        statement: &Statement,
        data: Bytes,
    ) -> impl Future<Output = IngestResult<u64>> + Send;
}
