//! Errors reported by storage collaborators.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport: {0}")]
    Curl(#[from] curl::Error),

    #[error("B2 API returned HTTP {status} ({code}): {message}")]
    Api {
        status: u32,
        code: String,
        message: String,
    },

    #[error("object not found")]
    NotFound,

    #[error("container no longer exists")]
    ContainerMissing,

    #[error("response is missing the {0} header")]
    MissingHeader(&'static str),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("could not start transfer worker: {0}")]
    Spawn(#[source] io::Error),

    #[error("transfer ended before response headers arrived")]
    NoResponse,
}

impl FetchError {
    /// True when the failure means the container itself is gone, as opposed to
    /// a problem with one object.
    pub fn is_container_missing(&self) -> bool {
        match self {
            FetchError::ContainerMissing => true,
            FetchError::Api { code, .. } => {
                matches!(code.as_str(), "bad_bucket_id" | "no_such_bucket")
            }
            _ => false,
        }
    }

    /// Build from a B2 error status/code pair, folding well-known codes into
    /// dedicated variants.
    pub fn from_api(status: u32, code: String, message: String) -> Self {
        match (status, code.as_str()) {
            (404, "not_found") => FetchError::NotFound,
            _ => FetchError::Api {
                status,
                code,
                message,
            },
        }
    }
}
