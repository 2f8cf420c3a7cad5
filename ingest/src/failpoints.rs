use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};

/// Fails the COPY fast path of the staging loader before any data is sent.
pub const STAGING_COPY_IN: &str = "staging.copy_in";
/// Fails the final copy statement of an existing-column merge.
pub const MERGE_COPY_COLUMN: &str = "merge.copy_column";

/// Evaluates the named fail point.
///
/// The fail point parameter selects the returned error kind: `format` for
/// [`ErrorKind::StagingFormatIncompatible`], `conversion` for [`ErrorKind::ConversionError`];
/// anything else yields [`ErrorKind::InjectedFailure`].
pub fn ingest_fail_point(name: &str) -> IngestResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("format") => ErrorKind::StagingFormatIncompatible,
            Some("conversion") => ErrorKind::ConversionError,
            _ => ErrorKind::InjectedFailure,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
