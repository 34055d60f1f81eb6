//! Parse download response headers into object metadata.

use crate::remote::FetchError;

pub(crate) const SHA1_HEADER: &str = "X-Bz-Content-Sha1";

/// Metadata B2 returns with a file download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObjectHeaders {
    pub content_length: u64,
    pub content_sha1: String,
}

/// Status code from an `HTTP/x y reason` line.
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Extract length and SHA-1 from one response's header lines.
///
/// Large files uploaded in parts may report their digest as
/// `unverified:<hex>`; the prefix is dropped. A missing SHA-1 header is an
/// error since the download could not be verified.
pub(crate) fn parse_object_headers(lines: &[String]) -> Result<ObjectHeaders, FetchError> {
    let mut content_length = None;
    let mut content_sha1 = None;

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case(SHA1_HEADER) {
            let value = value.strip_prefix("unverified:").unwrap_or(value);
            content_sha1 = Some(value.to_string());
        }
    }

    Ok(ObjectHeaders {
        content_length: content_length.unwrap_or(0),
        content_sha1: content_sha1.ok_or(FetchError::MissingHeader(SHA1_HEADER))?,
    })
}
