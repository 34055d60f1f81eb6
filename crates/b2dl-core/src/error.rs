//! Failure kinds surfaced by the download core.
//!
//! Every kind is terminal for the task that hit it; nothing is retried.
//! Container lookup failures and `MetadataFetchFailed` also stop the
//! orchestrator from issuing further fetches.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::remote::FetchError;

/// Plain discriminant of a [`DownloadError`], convenient for matching in
/// callers and tests without caring about payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ContainerNotFound,
    ContainerLookupFailed,
    MetadataFetchFailed,
    UnsafeName,
    DirectoryCreationFailed,
    FileCreationFailed,
    StreamReadFailed,
    StreamWriteFailed,
    IntegrityMismatch,
    TaskAborted,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("bucket not found: {container}")]
    ContainerNotFound {
        container: String,
        #[source]
        source: Option<FetchError>,
    },

    #[error("could not look up bucket {container}: {source}")]
    ContainerLookupFailed {
        container: String,
        #[source]
        source: FetchError,
    },

    #[error("could not fetch {name}: {source}")]
    MetadataFetchFailed {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("refusing to download {name:?}: {reason}")]
    UnsafeName { name: String, reason: &'static str },

    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create {}: {source}", path.display())]
    FileCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read failed while downloading {name}: {source}")]
    StreamReadFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("write failed for {}: {source}", path.display())]
    StreamWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("downloaded data for {name} does not match SHA1 hash (expected {expected}, got {actual})")]
    IntegrityMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("download task for {name} aborted: {reason}")]
    TaskAborted { name: String, reason: String },
}

impl DownloadError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DownloadError::ContainerNotFound { .. } => FailureKind::ContainerNotFound,
            DownloadError::ContainerLookupFailed { .. } => FailureKind::ContainerLookupFailed,
            DownloadError::MetadataFetchFailed { .. } => FailureKind::MetadataFetchFailed,
            DownloadError::UnsafeName { .. } => FailureKind::UnsafeName,
            DownloadError::DirectoryCreationFailed { .. } => FailureKind::DirectoryCreationFailed,
            DownloadError::FileCreationFailed { .. } => FailureKind::FileCreationFailed,
            DownloadError::StreamReadFailed { .. } => FailureKind::StreamReadFailed,
            DownloadError::StreamWriteFailed { .. } => FailureKind::StreamWriteFailed,
            DownloadError::IntegrityMismatch { .. } => FailureKind::IntegrityMismatch,
            DownloadError::TaskAborted { .. } => FailureKind::TaskAborted,
        }
    }

    /// True for failures that stop the orchestrator from starting new tasks.
    pub fn halts_batch(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::ContainerNotFound
                | FailureKind::ContainerLookupFailed
                | FailureKind::MetadataFetchFailed
        )
    }

    /// Map a failed container lookup. A missing container stays
    /// `ContainerNotFound`; anything else is a lookup failure.
    pub fn from_lookup(container: &str, err: FetchError) -> Self {
        if err.is_container_missing() {
            DownloadError::ContainerNotFound {
                container: container.to_string(),
                source: Some(err),
            }
        } else {
            DownloadError::ContainerLookupFailed {
                container: container.to_string(),
                source: err,
            }
        }
    }

    /// Map a collaborator fetch failure for `name` onto the core failure kinds.
    pub fn from_fetch(container: &str, name: &str, err: FetchError) -> Self {
        if err.is_container_missing() {
            DownloadError::ContainerNotFound {
                container: container.to_string(),
                source: Some(err),
            }
        } else {
            DownloadError::MetadataFetchFailed {
                name: name.to_string(),
                source: err,
            }
        }
    }
}
