//! In-memory object store with scripted objects and failures.
//!
//! Serves tests and dry runs: objects can carry a wrong digest, read slowly,
//! or fail part-way through the stream. Every fetch is logged in order and
//! open streams are counted so callers can check each one gets closed.

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{Container, FetchError, ObjectStore, RemoteObjectHandle};
use crate::checksum;

/// Failure to return from `fetch_object` for a given name.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    NotFound,
    ContainerMissing,
    Api { status: u32, code: String },
}

impl ScriptedFailure {
    fn to_error(&self) -> FetchError {
        match self {
            ScriptedFailure::NotFound => FetchError::NotFound,
            ScriptedFailure::ContainerMissing => FetchError::ContainerMissing,
            ScriptedFailure::Api { status, code } => FetchError::Api {
                status: *status,
                code: code.clone(),
                message: "scripted failure".to_string(),
            },
        }
    }
}

/// Object served by a [`MemoryContainer`].
#[derive(Debug, Clone)]
pub struct MemoryObject {
    body: Arc<Vec<u8>>,
    expected_sha1: String,
    declared_length: u64,
    chunk_size: usize,
    read_delay: Option<Duration>,
    fail_after: Option<usize>,
}

impl MemoryObject {
    /// Object whose expected digest matches its body.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            expected_sha1: checksum::sha1_hex(&body),
            declared_length: body.len() as u64,
            body: Arc::new(body),
            chunk_size: 8 * 1024,
            read_delay: None,
            fail_after: None,
        }
    }

    pub fn with_expected_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.expected_sha1 = sha1.into();
        self
    }

    pub fn with_declared_length(mut self, len: u64) -> Self {
        self.declared_length = len;
        self
    }

    /// Serve at most `chunk_size` bytes per read and sleep before each read.
    pub fn with_read_delay(mut self, chunk_size: usize, delay: Duration) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.read_delay = Some(delay);
        self
    }

    /// Return an I/O error once `bytes` bytes have been served.
    pub fn failing_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }
}

#[derive(Default)]
struct ContainerState {
    objects: HashMap<String, MemoryObject>,
    failures: HashMap<String, ScriptedFailure>,
    fetch_log: Vec<String>,
}

/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryContainer {
    id: Arc<str>,
    state: Arc<Mutex<ContainerState>>,
    open_streams: Arc<AtomicUsize>,
}

impl MemoryContainer {
    pub fn new(id: &str) -> Self {
        Self {
            id: Arc::from(id),
            state: Arc::new(Mutex::new(ContainerState::default())),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn insert(&self, name: &str, object: MemoryObject) {
        self.lock().objects.insert(name.to_string(), object);
    }

    pub fn fail_fetch(&self, name: &str, failure: ScriptedFailure) {
        self.lock().failures.insert(name.to_string(), failure);
    }

    /// Names passed to `fetch_object`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.lock().fetch_log.clone()
    }

    /// Streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ContainerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Container for MemoryContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_object(&self, name: &str) -> Result<RemoteObjectHandle, FetchError> {
        let object = {
            let mut state = self.lock();
            state.fetch_log.push(name.to_string());
            if let Some(failure) = state.failures.get(name) {
                return Err(failure.to_error());
            }
            state.objects.get(name).cloned().ok_or(FetchError::NotFound)?
        };

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        let stream = MemoryStream {
            pos: 0,
            open_streams: Arc::clone(&self.open_streams),
            object: object.clone(),
        };
        Ok(RemoteObjectHandle {
            name: name.to_string(),
            declared_length: object.declared_length,
            expected_sha1: object.expected_sha1,
            stream: Box::new(stream),
        })
    }
}

struct MemoryStream {
    object: MemoryObject,
    pos: usize,
    open_streams: Arc<AtomicUsize>,
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(delay) = self.object.read_delay {
            std::thread::sleep(delay);
        }
        let body = &self.object.body;
        let mut end = body.len().min(self.pos + self.object.chunk_size);
        if let Some(limit) = self.object.fail_after {
            if self.pos >= limit {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "scripted stream failure",
                ));
            }
            end = end.min(limit);
        }
        let n = buf.len().min(end - self.pos);
        buf[..n].copy_from_slice(&body[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store holding any number of named [`MemoryContainer`]s.
#[derive(Clone, Default)]
pub struct MemoryStore {
    containers: HashMap<String, MemoryContainer>,
    resolve_failure: Option<ScriptedFailure>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a container and return a handle sharing its state.
    pub fn add_container(&mut self, id: &str) -> MemoryContainer {
        let container = MemoryContainer::new(id);
        self.containers.insert(id.to_string(), container.clone());
        container
    }

    /// Make every `resolve_container` call fail with `failure`.
    pub fn fail_resolve(&mut self, failure: ScriptedFailure) {
        self.resolve_failure = Some(failure);
    }
}

impl ObjectStore for MemoryStore {
    type Container = MemoryContainer;

    fn resolve_container(&self, id: &str) -> Result<Option<MemoryContainer>, FetchError> {
        if let Some(failure) = &self.resolve_failure {
            return Err(failure.to_error());
        }
        Ok(self.containers.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_serves_body_and_logs_names() {
        let container = MemoryContainer::new("bucket");
        container.insert("a.txt", MemoryObject::new("hello"));

        let mut handle = container.fetch_object("a.txt").unwrap();
        assert_eq!(handle.declared_length, 5);
        assert_eq!(handle.expected_sha1, checksum::sha1_hex(b"hello"));
        assert_eq!(container.open_streams(), 1);

        let mut body = String::new();
        handle.stream.read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello");
        drop(handle);
        assert_eq!(container.open_streams(), 0);

        assert!(matches!(
            container.fetch_object("missing.txt"),
            Err(FetchError::NotFound)
        ));
        assert_eq!(container.fetched(), vec!["a.txt", "missing.txt"]);
    }

    #[test]
    fn scripted_stream_failure_after_limit() {
        let container = MemoryContainer::new("bucket");
        container.insert("x", MemoryObject::new(vec![7u8; 100]).failing_after(40));
        let mut handle = container.fetch_object("x").unwrap();
        let mut buf = Vec::new();
        let err = handle.stream.read_to_end(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(buf.len(), 40);
    }

    #[test]
    fn store_resolves_known_containers_only() {
        let mut store = MemoryStore::new();
        store.add_container("photos");
        assert!(store.resolve_container("photos").unwrap().is_some());
        assert!(store.resolve_container("videos").unwrap().is_none());
    }
}
