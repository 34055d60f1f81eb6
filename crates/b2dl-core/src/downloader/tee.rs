//! Fan-out writer: one write call reaches the destination, the digest and
//! the progress counter.

use std::io::{self, Write};

use crate::checksum::Sha1Sink;
use crate::progress::ProgressSink;

/// Forwards every write to `dest`, then feeds exactly the bytes `dest`
/// accepted to the digest and the progress sink.
pub struct FanOutWriter<'a, W: Write> {
    dest: W,
    digest: &'a mut Sha1Sink,
    progress: &'a ProgressSink,
}

impl<'a, W: Write> FanOutWriter<'a, W> {
    pub fn new(dest: W, digest: &'a mut Sha1Sink, progress: &'a ProgressSink) -> Self {
        Self {
            dest,
            digest,
            progress,
        }
    }

    pub fn into_inner(self) -> W {
        self.dest
    }
}

impl<W: Write> Write for FanOutWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.dest.write(buf)?;
        self.digest.update(&buf[..n]);
        self.progress.record(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.dest.flush()
    }
}
