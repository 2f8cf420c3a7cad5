//! Postgres building blocks shared by the ingester crates.

#[cfg(feature = "test-utils")]
pub mod sqlx;
#[cfg(feature = "test-utils")]
pub mod tokio;
pub mod types;
