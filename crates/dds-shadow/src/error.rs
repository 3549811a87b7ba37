//! Shadow store errors. These never leave a write method.

use thiserror::Error;

/// Reasons the store could not be enabled or written.
#[derive(Error, Debug)]
pub(crate) enum ShadowError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("table `{table}` is missing columns: {missing}")]
    Schema {
        table: &'static str,
        missing: String,
    },
}
