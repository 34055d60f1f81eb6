//! Streaming file download.
//!
//! A dedicated thread drives a curl Easy2 transfer. Response headers are
//! handed back once a 2xx header block completes; body chunks then flow
//! through a bounded channel into a [`BodyReader`]. Dropping the reader makes
//! the next write callback fail, which aborts the transfer.

use std::io::{self, Read};
use std::str;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use std::time::Duration;

use super::api::error_from_body;
use super::headers::{parse_object_headers, parse_status_line, ObjectHeaders};
use crate::remote::FetchError;

/// Body chunks buffered between the transfer thread and the reader.
const CHANNEL_DEPTH: usize = 16;

type Chunk = io::Result<Vec<u8>>;
type HeadResult = Result<ObjectHeaders, FetchError>;

/// Start downloading `url` and wait for its response headers.
pub(crate) fn open_stream(
    url: String,
    auth_token: String,
    connect_timeout: Duration,
) -> Result<(ObjectHeaders, BodyReader), FetchError> {
    let (head_tx, head_rx) = mpsc::sync_channel::<HeadResult>(1);
    let (body_tx, body_rx) = mpsc::sync_channel::<Chunk>(CHANNEL_DEPTH);

    thread::Builder::new()
        .name("b2-download".to_string())
        .spawn(move || {
            let handler = StreamHandler::new(head_tx, body_tx);
            run_transfer(&url, &auth_token, connect_timeout, handler);
        })
        .map_err(FetchError::Spawn)?;

    match head_rx.recv() {
        Ok(Ok(headers)) => Ok((headers, BodyReader::new(body_rx))),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(FetchError::NoResponse),
    }
}

fn run_transfer(url: &str, auth_token: &str, connect_timeout: Duration, handler: StreamHandler) {
    let mut easy = curl::easy::Easy2::new(handler);
    let result = configure(&mut easy, url, auth_token, connect_timeout).and_then(|()| easy.perform());
    let status = easy.response_code().unwrap_or(0);
    easy.get_mut().complete(status, result);
}

fn configure(
    easy: &mut curl::easy::Easy2<StreamHandler>,
    url: &str,
    auth_token: &str,
    connect_timeout: Duration,
) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.connect_timeout(connect_timeout)?;
    let mut list = curl::easy::List::new();
    list.append(&format!("Authorization: {}", auth_token))?;
    easy.http_headers(list)
}

/// Curl handler that splits a response into headers and streamed body.
pub(crate) struct StreamHandler {
    lines: Vec<String>,
    status: Option<u32>,
    /// Taken once a 2xx header block has been parsed and sent.
    head_tx: Option<SyncSender<HeadResult>>,
    body_tx: SyncSender<Chunk>,
    error_body: Vec<u8>,
    reader_gone: bool,
}

impl StreamHandler {
    fn new(head_tx: SyncSender<HeadResult>, body_tx: SyncSender<Chunk>) -> Self {
        Self {
            lines: Vec::new(),
            status: None,
            head_tx: Some(head_tx),
            body_tx,
            error_body: Vec::new(),
            reader_gone: false,
        }
    }

    /// Deliver the transfer's final state to whichever side is waiting.
    fn complete(&mut self, status: u32, result: Result<(), curl::Error>) {
        if let Some(head_tx) = self.head_tx.take() {
            let err = match result {
                Err(e) => FetchError::Curl(e),
                Ok(()) => error_from_body(status, &self.error_body),
            };
            let _ = head_tx.send(Err(err));
            return;
        }
        if let Err(e) = result {
            if !self.reader_gone {
                let kind = if e.is_partial_file() {
                    io::ErrorKind::UnexpectedEof
                } else {
                    io::ErrorKind::Other
                };
                let _ = self.body_tx.send(Err(io::Error::new(kind, e)));
            }
        }
    }

    fn end_of_headers(&mut self) -> bool {
        let success = matches!(self.status, Some(s) if (200..300).contains(&s));
        if !success {
            return true;
        }
        let Some(head_tx) = self.head_tx.take() else {
            return true;
        };
        match parse_object_headers(&self.lines) {
            Ok(headers) => head_tx.send(Ok(headers)).is_ok(),
            Err(err) => {
                let _ = head_tx.send(Err(err));
                false
            }
        }
    }
}

impl curl::easy::Handler for StreamHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        let Ok(s) = str::from_utf8(data) else {
            return true;
        };
        let line = s.trim_end();
        if line.starts_with("HTTP/") {
            // New response after a redirect or 1xx: drop the previous hop.
            self.lines.clear();
            self.error_body.clear();
            self.status = parse_status_line(line);
        }
        if line.is_empty() {
            return self.end_of_headers();
        }
        self.lines.push(line.to_string());
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        if self.head_tx.is_some() {
            self.error_body.extend_from_slice(data);
            return Ok(data.len());
        }
        match self.body_tx.send(Ok(data.to_vec())) {
            Ok(()) => Ok(data.len()),
            Err(_) => {
                self.reader_gone = true;
                Ok(0)
            }
        }
    }
}

/// Reader over body chunks produced by the transfer thread.
pub struct BodyReader {
    rx: Receiver<Chunk>,
    chunk: Vec<u8>,
    pos: usize,
    done: bool,
}

impl BodyReader {
    fn new(rx: Receiver<Chunk>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
            done: false,
        }
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.chunk.len() {
            if self.done {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Ok(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => {
                    self.done = true;
                    return Err(e);
                }
                Err(_) => {
                    self.done = true;
                    return Ok(0);
                }
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
