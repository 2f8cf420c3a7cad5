//! Helpers shared by unit and integration tests.
//!
//! [`connection::RecordingConnection`] scripts the database for unit tests. The other modules
//! spin up a real Postgres database with a small production schema, configured through the
//! `TESTS_DATABASE_*` environment variables.

pub mod connection;
pub mod database;
pub mod failpoints;
pub mod fixtures;
