//! Minimal HTTP/1.1 fake of the B2 native API for integration tests.
//!
//! Serves `b2_authorize_account`, `b2_list_buckets` and downloads by name for
//! a single bucket. One connection per request (`Connection: close`). Every
//! request line is logged so tests can check which files were fetched.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use b2dl_core::checksum;

pub const KEY_ID: &str = "test-key-id";
pub const APP_KEY: &str = "test-app-key";
pub const AUTH_TOKEN: &str = "fake-auth-token";
/// `Basic base64("test-key-id:test-app-key")`.
const BASIC_AUTH: &str = "Basic dGVzdC1rZXktaWQ6dGVzdC1hcHAta2V5";

/// One file served from the fake bucket.
#[derive(Debug, Clone)]
pub struct FakeFile {
    body: Vec<u8>,
    sha1_header: Option<String>,
    truncate_to: Option<usize>,
}

impl FakeFile {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            sha1_header: Some(checksum::sha1_hex(&body)),
            body,
            truncate_to: None,
        }
    }

    /// Serve `value` as `X-Bz-Content-Sha1` instead of the real digest.
    pub fn with_sha1_header(mut self, value: impl Into<String>) -> Self {
        self.sha1_header = Some(value.into());
        self
    }

    pub fn without_sha1_header(mut self) -> Self {
        self.sha1_header = None;
        self
    }

    /// Advertise the full length but close after `bytes` of body.
    pub fn truncated(mut self, bytes: usize) -> Self {
        self.truncate_to = Some(bytes);
        self
    }
}

struct State {
    bucket: String,
    files: HashMap<String, FakeFile>,
    base_url: String,
    log: Mutex<Vec<String>>,
}

pub struct FakeB2 {
    state: Arc<State>,
}

impl FakeB2 {
    /// Start serving `files` from `bucket` in a background thread.
    pub fn start(bucket: &str, files: Vec<(&str, FakeFile)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(State {
            bucket: bucket.to_string(),
            files: files
                .into_iter()
                .map(|(name, file)| (name.to_string(), file))
                .collect(),
            base_url: format!("http://127.0.0.1:{}", port),
            log: Mutex::new(Vec::new()),
        });
        let server_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&server_state);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self { state }
    }

    pub fn base_url(&self) -> &str {
        &self.state.base_url
    }

    /// Request lines (`METHOD /path`) in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state.log.lock().unwrap().clone()
    }

    /// Decoded names requested through the download endpoint.
    pub fn downloads(&self) -> Vec<String> {
        let prefix = format!("GET /file/{}/", self.state.bucket);
        self.requests()
            .iter()
            .filter_map(|line| line.strip_prefix(prefix.as_str()))
            .map(percent_decode)
            .collect()
    }
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = std::str::from_utf8(&data[..head_end]).ok()?;
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = data[head_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

fn handle(mut stream: TcpStream, state: &State) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    state
        .log
        .lock()
        .unwrap()
        .push(format!("{} {}", req.method, req.path));

    match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/b2api/v2/b2_authorize_account") => {
            if req.header("authorization") != Some(BASIC_AUTH) {
                return send_error(&mut stream, 401, "unauthorized", "bad key");
            }
            let body = serde_json::json!({
                "accountId": "acct-1",
                "authorizationToken": AUTH_TOKEN,
                "apiUrl": state.base_url,
                "downloadUrl": state.base_url,
            });
            send_json(&mut stream, 200, &body);
        }
        ("POST", "/b2api/v2/b2_list_buckets") => {
            if req.header("authorization") != Some(AUTH_TOKEN) {
                return send_error(&mut stream, 401, "bad_auth_token", "bad token");
            }
            let wanted = serde_json::from_slice::<serde_json::Value>(&req.body)
                .ok()
                .and_then(|v| v["bucketName"].as_str().map(str::to_string));
            let buckets = if wanted.as_deref() == Some(state.bucket.as_str()) {
                serde_json::json!([{
                    "bucketId": "bucket-id-1",
                    "bucketName": state.bucket,
                    "bucketType": "allPrivate",
                }])
            } else {
                serde_json::json!([])
            };
            send_json(&mut stream, 200, &serde_json::json!({ "buckets": buckets }));
        }
        ("GET", path) if path.starts_with("/file/") => {
            if req.header("authorization") != Some(AUTH_TOKEN) {
                return send_error(&mut stream, 401, "bad_auth_token", "bad token");
            }
            let rest = &path["/file/".len()..];
            let (bucket, name) = rest.split_once('/').unwrap_or((rest, ""));
            let file = (percent_decode(bucket) == state.bucket)
                .then(|| state.files.get(&percent_decode(name)))
                .flatten();
            match file {
                Some(file) => send_file(&mut stream, &percent_decode(name), file),
                None => send_error(&mut stream, 404, "not_found", "File not present"),
            }
        }
        _ => send_error(&mut stream, 404, "not_found", "no such endpoint"),
    }
}

fn send_json(stream: &mut TcpStream, status: u32, body: &serde_json::Value) {
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn send_error(stream: &mut TcpStream, status: u32, code: &str, message: &str) {
    let body = serde_json::json!({ "status": status, "code": code, "message": message });
    send_json(stream, status, &body);
}

fn send_file(stream: &mut TcpStream, name: &str, file: &FakeFile) {
    let mut head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nX-Bz-File-Name: {}\r\nConnection: close\r\n",
        file.body.len(),
        name
    );
    if let Some(sha1) = &file.sha1_header {
        head.push_str(&format!("X-Bz-Content-Sha1: {}\r\n", sha1));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let end = file.truncate_to.unwrap_or(file.body.len()).min(file.body.len());
    let _ = stream.write_all(&file.body[..end]);
    let _ = stream.flush();
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
            if let Ok(v) = u8::from_str_radix(hex, 16) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
