mod base;
pub mod postgres;

pub use base::{IngestConnection, TextRow};
pub use postgres::PgConnection;
