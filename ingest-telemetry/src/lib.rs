//! Logging setup for the ingester binaries and tests.

pub mod tracing;
