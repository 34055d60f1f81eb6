//! B2 native API calls (JSON over HTTPS) via curl.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::remote::FetchError;

/// Response of `b2_authorize_account`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub account_id: String,
    pub authorization_token: String,
    pub api_url: String,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBucketsRequest<'a> {
    pub account_id: &'a str,
    pub bucket_name: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ListBucketsResponse {
    pub buckets: Vec<BucketInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    pub bucket_id: String,
    pub bucket_name: String,
}

/// Error body B2 sends with every non-2xx response.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Credentials used for HTTP basic auth on `b2_authorize_account`.
pub(crate) struct BasicAuth<'a> {
    pub user: &'a str,
    pub password: &'a str,
}

/// GET `url` and decode a JSON body.
pub(crate) fn get_json<T: DeserializeOwned>(
    url: &str,
    basic: Option<BasicAuth<'_>>,
    connect_timeout: Duration,
) -> Result<T, FetchError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.get(true)?;
    if let Some(auth) = basic {
        easy.username(auth.user)?;
        easy.password(auth.password)?;
    }
    let (status, body) = perform(easy, connect_timeout)?;
    decode(status, &body)
}

/// POST a JSON body to `url` with the account authorization token.
pub(crate) fn post_json<B: Serialize, T: DeserializeOwned>(
    url: &str,
    auth_token: &str,
    body: &B,
    connect_timeout: Duration,
) -> Result<T, FetchError> {
    let payload = serde_json::to_vec(body)?;
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.post(true)?;
    easy.post_fields_copy(&payload)?;
    let mut list = curl::easy::List::new();
    list.append(&format!("Authorization: {}", auth_token))?;
    list.append("Content-Type: application/json")?;
    easy.http_headers(list)?;
    let (status, body) = perform(easy, connect_timeout)?;
    decode(status, &body)
}

fn perform(mut easy: curl::easy::Easy, connect_timeout: Duration) -> Result<(u32, Vec<u8>), FetchError> {
    easy.follow_location(true)?;
    easy.connect_timeout(connect_timeout)?;
    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let status = easy.response_code()?;
    Ok((status, body))
}

fn decode<T: DeserializeOwned>(status: u32, body: &[u8]) -> Result<T, FetchError> {
    if !(200..300).contains(&status) {
        return Err(error_from_body(status, body));
    }
    Ok(serde_json::from_slice(body)?)
}

/// Turn a non-2xx response into a [`FetchError`], using the B2 error body
/// when it parses.
pub(crate) fn error_from_body(status: u32, body: &[u8]) -> FetchError {
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(err) => FetchError::from_api(status, err.code, err.message),
        Err(_) => FetchError::from_api(
            status,
            "unknown".to_string(),
            String::from_utf8_lossy(body).trim().to_string(),
        ),
    }
}
