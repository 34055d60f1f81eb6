//! Storage collaborator seam.
//!
//! The core only needs two operations from a remote store: resolve a named
//! container (bucket), and open one object in it as a byte stream with its
//! declared length and expected SHA-1. Both calls block; async callers run
//! them on the blocking pool.

mod error;
pub mod memory;

pub use error::FetchError;

use std::fmt;
use std::io::Read;

/// One object ready to be downloaded. Owned by exactly one pipeline; the
/// stream is closed when the handle (or the stream taken out of it) is dropped.
pub struct RemoteObjectHandle {
    pub name: String,
    /// Length reported by the server. Only used to scale progress display.
    pub declared_length: u64,
    /// Hex SHA-1 supplied by the server; authoritative.
    pub expected_sha1: String,
    pub stream: Box<dyn Read + Send>,
}

impl fmt::Debug for RemoteObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObjectHandle")
            .field("name", &self.name)
            .field("declared_length", &self.declared_length)
            .field("expected_sha1", &self.expected_sha1)
            .finish_non_exhaustive()
    }
}

/// A resolved container from which objects can be fetched by name.
pub trait Container: Send + Sync {
    /// Identifier used in log lines and error messages (bucket name).
    fn id(&self) -> &str;

    /// Fetch metadata and open the byte stream for `name`.
    fn fetch_object(&self, name: &str) -> Result<RemoteObjectHandle, FetchError>;
}

/// Entry point of a remote store: looks up containers by identifier.
pub trait ObjectStore: Send + Sync {
    type Container: Container + 'static;

    /// `Ok(None)` means the store answered but has no such container.
    fn resolve_container(&self, id: &str) -> Result<Option<Self::Container>, FetchError>;
}
