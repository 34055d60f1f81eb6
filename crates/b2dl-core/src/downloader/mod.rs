//! Single-object download pipeline.
//!
//! Copies one remote byte stream to disk in a single read pass, fanning each
//! chunk out to the destination file, a SHA-1 sink and a progress sink, then
//! checks the digest against the server's value. Blocking; the scheduler runs
//! it on tokio's blocking pool.

mod tee;

pub use tee::FanOutWriter;

use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use crate::checksum::{digests_match, Sha1Sink};
use crate::error::DownloadError;
use crate::progress::{ProgressDisplay, ProgressSink};
use crate::remote::RemoteObjectHandle;
use crate::storage;

const BUF_SIZE: usize = 64 * 1024;

/// Summary of a verified download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub name: String,
    pub bytes: u64,
    pub sha1: String,
}

/// Download `handle` into `dest` and verify its SHA-1.
///
/// The handle's stream is closed on every return path. On a digest mismatch
/// the written file is left in place.
pub fn download_object(
    handle: RemoteObjectHandle,
    dest: &Path,
    display: &dyn ProgressDisplay,
) -> Result<DownloadOutcome, DownloadError> {
    let RemoteObjectHandle {
        name,
        declared_length,
        expected_sha1,
        mut stream,
    } = handle;

    storage::ensure_parent_dirs(dest)?;
    let file = storage::create_destination(dest)?;
    tracing::debug!(name = %name, path = %dest.display(), declared_length, "download started");

    let progress = ProgressSink::register(display, &name, declared_length);
    let mut digest = Sha1Sink::new();
    let copied = {
        let writer = FanOutWriter::new(BufWriter::new(file), &mut digest, &progress);
        copy_fan_out(stream.as_mut(), writer, &name, dest)
    };
    progress.finish();
    drop(stream);
    let bytes = copied?;

    let actual = digest.finalize_hex();
    if !digests_match(&expected_sha1, &actual) {
        tracing::warn!(name = %name, expected = %expected_sha1, actual = %actual, "SHA1 mismatch");
        return Err(DownloadError::IntegrityMismatch {
            name,
            expected: expected_sha1,
            actual,
        });
    }

    tracing::debug!(name = %name, bytes, "download verified");
    Ok(DownloadOutcome {
        name,
        bytes,
        sha1: actual,
    })
}

/// Read `reader` to the end through `writer`. Returns bytes copied.
fn copy_fan_out<W: Write>(
    reader: &mut dyn Read,
    mut writer: FanOutWriter<'_, BufWriter<W>>,
    name: &str,
    path: &Path,
) -> Result<u64, DownloadError> {
    let write_failed = |source| DownloadError::StreamWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut buf = vec![0u8; BUF_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(DownloadError::StreamReadFailed {
                    name: name.to_string(),
                    source,
                })
            }
        };
        writer.write_all(&buf[..n]).map_err(write_failed)?;
        total += n as u64;
    }
    writer.flush().map_err(write_failed)?;
    writer
        .into_inner()
        .into_inner()
        .map_err(|e| write_failed(e.into_error()))?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::sha1_hex;
    use crate::error::FailureKind;
    use crate::progress::HiddenDisplay;
    use crate::remote::memory::{MemoryContainer, MemoryObject};
    use crate::remote::Container;

    fn container_with(name: &str, object: MemoryObject) -> MemoryContainer {
        let c = MemoryContainer::new("bucket");
        c.insert(name, object);
        c
    }

    #[test]
    fn verified_download_round_trips_bytes() {
        let body: Vec<u8> = (0u8..200).cycle().take(300 * 1024).collect();
        let c = container_with("nested/dir/a.bin", MemoryObject::new(body.clone()));
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/dir/a.bin");

        let handle = c.fetch_object("nested/dir/a.bin").unwrap();
        let outcome = download_object(handle, &dest, &HiddenDisplay).unwrap();

        assert_eq!(outcome.bytes, body.len() as u64);
        assert_eq!(outcome.sha1, sha1_hex(&body));
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert_eq!(c.open_streams(), 0);
    }

    #[test]
    fn expected_digest_is_compared_case_insensitively() {
        let upper = sha1_hex(b"hello").to_uppercase();
        let c = container_with("a.txt", MemoryObject::new("hello").with_expected_sha1(upper));
        let dir = tempfile::tempdir().unwrap();
        let handle = c.fetch_object("a.txt").unwrap();
        download_object(handle, &dir.path().join("a.txt"), &HiddenDisplay).unwrap();
    }

    #[test]
    fn mismatch_keeps_file_and_closes_stream() {
        let c = container_with(
            "c.txt",
            MemoryObject::new("corrupt bytes").with_expected_sha1(sha1_hex(b"other")),
        );
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("c.txt");
        let handle = c.fetch_object("c.txt").unwrap();

        let err = download_object(handle, &dest, &HiddenDisplay).unwrap_err();
        assert_eq!(err.kind(), FailureKind::IntegrityMismatch);
        assert_eq!(std::fs::read(&dest).unwrap(), b"corrupt bytes");
        assert_eq!(c.open_streams(), 0);
    }

    #[test]
    fn read_failure_is_reported_without_digest_check() {
        let body = vec![1u8; 4096];
        let c = container_with("r.bin", MemoryObject::new(body).failing_after(1000));
        let dir = tempfile::tempdir().unwrap();
        let handle = c.fetch_object("r.bin").unwrap();

        let err = download_object(handle, &dir.path().join("r.bin"), &HiddenDisplay).unwrap_err();
        assert_eq!(err.kind(), FailureKind::StreamReadFailed);
        assert_eq!(c.open_streams(), 0);
    }

    #[test]
    fn directory_failure_closes_stream() {
        let c = container_with("blocked/x.txt", MemoryObject::new("x"));
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocked"), b"file in the way").unwrap();
        let handle = c.fetch_object("blocked/x.txt").unwrap();

        let err = download_object(handle, &dir.path().join("blocked/x.txt"), &HiddenDisplay)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::DirectoryCreationFailed);
        assert_eq!(c.open_streams(), 0);
    }

    #[test]
    fn empty_object_downloads() {
        let c = container_with("empty", MemoryObject::new(Vec::new()));
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty");
        let handle = c.fetch_object("empty").unwrap();
        let outcome = download_object(handle, &dest, &HiddenDisplay).unwrap();
        assert_eq!(outcome.bytes, 0);
        assert!(dest.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_failure_is_reported() {
        let c = container_with("full", MemoryObject::new(vec![0u8; 1024]));
        let handle = c.fetch_object("full").unwrap();
        let err = download_object(handle, Path::new("/dev/full"), &HiddenDisplay).unwrap_err();
        assert_eq!(err.kind(), FailureKind::StreamWriteFailed);
    }
}
