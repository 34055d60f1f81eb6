//! Backblaze B2 native API client.
//!
//! Authorizes once with an application key, resolves buckets by name with
//! `b2_list_buckets`, and downloads files by name from the account's download
//! URL. All calls block on curl; the batch scheduler drives them from the
//! blocking pool.

mod api;
mod download;
mod headers;

pub use api::{AuthorizeResponse, BucketInfo};
pub use download::BodyReader;

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::remote::{Container, FetchError, ObjectStore, RemoteObjectHandle};
use api::{BasicAuth, ListBucketsRequest, ListBucketsResponse};

pub const DEFAULT_API_URL: &str = "https://api.backblazeb2.com";

/// Application key pair used to authorize the account.
#[derive(Debug, Clone)]
pub struct B2Credentials {
    pub application_key_id: String,
    pub application_key: String,
}

#[derive(Debug)]
struct Session {
    account_id: String,
    auth_token: String,
    api_url: String,
    download_url: String,
    connect_timeout: Duration,
}

/// Authorized account session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct B2Client {
    session: Arc<Session>,
}

impl B2Client {
    /// Call `b2_authorize_account` against `api_url`.
    pub fn authorize(
        api_url: &str,
        credentials: &B2Credentials,
        connect_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let url = api_endpoint(api_url, "b2_authorize_account")?;
        tracing::debug!(url = %url, key_id = %credentials.application_key_id, "authorizing account");
        let auth: AuthorizeResponse = api::get_json(
            url.as_str(),
            Some(BasicAuth {
                user: &credentials.application_key_id,
                password: &credentials.application_key,
            }),
            connect_timeout,
        )?;
        Ok(Self {
            session: Arc::new(Session {
                account_id: auth.account_id,
                auth_token: auth.authorization_token,
                api_url: auth.api_url,
                download_url: auth.download_url,
                connect_timeout,
            }),
        })
    }

    pub fn account_id(&self) -> &str {
        &self.session.account_id
    }
}

impl ObjectStore for B2Client {
    type Container = B2Bucket;

    fn resolve_container(&self, id: &str) -> Result<Option<B2Bucket>, FetchError> {
        let url = api_endpoint(&self.session.api_url, "b2_list_buckets")?;
        let request = ListBucketsRequest {
            account_id: &self.session.account_id,
            bucket_name: id,
        };
        let response: ListBucketsResponse = api::post_json(
            url.as_str(),
            &self.session.auth_token,
            &request,
            self.session.connect_timeout,
        )?;
        // The filter is applied server side; guard against servers that ignore it.
        let found = response
            .buckets
            .into_iter()
            .find(|b| b.bucket_name == id)
            .map(|b| B2Bucket {
                session: Arc::clone(&self.session),
                bucket_id: b.bucket_id,
                bucket_name: b.bucket_name,
            });
        Ok(found)
    }
}

/// A bucket resolved through [`B2Client`].
#[derive(Debug, Clone)]
pub struct B2Bucket {
    session: Arc<Session>,
    bucket_id: String,
    bucket_name: String,
}

impl B2Bucket {
    pub fn bucket_id(&self) -> &str {
        &self.bucket_id
    }

    /// `{downloadUrl}/file/{bucket}/{name}` with each path segment encoded.
    pub fn file_url(&self, name: &str) -> Result<Url, FetchError> {
        file_url(&self.session.download_url, &self.bucket_name, name)
    }
}

impl Container for B2Bucket {
    fn id(&self) -> &str {
        &self.bucket_name
    }

    fn fetch_object(&self, name: &str) -> Result<RemoteObjectHandle, FetchError> {
        let url = self.file_url(name)?;
        tracing::debug!(url = %url, "opening download");
        let (headers, body) = download::open_stream(
            url.into(),
            self.session.auth_token.clone(),
            self.session.connect_timeout,
        )?;
        Ok(RemoteObjectHandle {
            name: name.to_string(),
            declared_length: headers.content_length,
            expected_sha1: headers.content_sha1,
            stream: Box::new(body),
        })
    }
}

fn api_endpoint(base: &str, call: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|()| FetchError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(["b2api", "v2", call]);
    Ok(url)
}

fn file_url(download_url: &str, bucket: &str, name: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(download_url)?;
    url.path_segments_mut()
        .map_err(|()| FetchError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .push("file")
        .push(bucket)
        .extend(name.split('/'));
    Ok(url)
}
