pub mod lifecycle;
pub mod reconcile;
pub mod store;

pub use lifecycle::{ImageFile, MediaLifecycle, NewMember};
pub use store::BlobStore;

use thiserror::Error;

/// Failure modes of the media lifecycle. Cleanup failures (deleting a blob
/// that is already orphaned) are deliberately absent: those are logged and
/// swallowed, never returned.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0}")]
    InvalidImage(String),

    #[error("committee member not found")]
    NotFound,

    #[error("storage backend timed out")]
    BackendUnavailable,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
