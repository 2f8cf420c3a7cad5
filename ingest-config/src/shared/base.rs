use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// The row-insert fallback needs a positive batch size.
    #[error("`insert_batch_size` cannot be zero")]
    InsertBatchSizeZero,
    /// A schema name was left empty.
    #[error("`{0}` cannot be empty")]
    EmptySchemaName(&'static str),
}
