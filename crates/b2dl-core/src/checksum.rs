//! Streaming digests for integrity verification.
//!
//! B2 stores a SHA-1 for every file, so the download pipeline feeds each chunk
//! into a [`Sha1Sink`] as it is written and compares the final hex digest with
//! the server's value. The path helpers re-hash a file already on disk.

use anyhow::{Context, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Incremental digest accumulator. Bytes must be fed in stream order.
#[derive(Default)]
pub struct DigestSink<D: Digest> {
    hasher: D,
    bytes: u64,
}

/// The integrity sink used by downloads (160-bit SHA-1).
pub type Sha1Sink = DigestSink<Sha1>;

impl<D: Digest> DigestSink<D> {
    pub fn new() -> Self {
        Self {
            hasher: D::new(),
            bytes: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Consume the sink and return the digest as lowercase hex.
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Lets a sink sit behind `io::copy` or any other writer plumbing.
impl<D: Digest> io::Write for DigestSink<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Case-insensitive comparison of two hex digests.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

/// SHA-1 of an in-memory buffer as lowercase hex.
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Compute SHA-1 of a file and return the digest as lowercase hex.
pub fn sha1_path(path: &Path) -> Result<String> {
    digest_path::<Sha1>(path)
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    digest_path::<Sha256>(path)
}

fn digest_path<D: Digest>(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut sink = DigestSink::<D>::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        sink.update(&buf[..n]);
    }
    Ok(sink.finalize_hex())
}
