//! Blocking HTTP client for the directory and batch endpoints. One request at a time, no retries.

use crate::api::error::ApiError;
use crate::api::response::{parse_batch_response, parse_directory_response};
use crate::api::ChapterSource;
use crate::model::{ChapterRecord, DirectoryEntry};
use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9999";
pub const DEFAULT_USER_AGENT: &str = "fqnovel-tools/1.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Server-side cap on chapter ids per batch request.
pub const MAX_BATCH_SIZE: usize = 50;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Optional identity sent with batch requests (needed for paid chapters).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub device_id: Option<String>,
    pub iid: Option<String>,
}

/// Batch request body. Absent credentials are omitted, not sent as null.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchBody<'a> {
    book_id: &'a str,
    chapter_ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iid: Option<&'a str>,
}

/// Blocking client for the novel API.
#[derive(Debug)]
pub struct ApiClient {
    inner: reqwest::blocking::Client,
    base_url: String,
    credentials: Credentials,
}

impl ApiClient {
    /// Client for the default local base URL.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn directory_url(&self, book_id: &str) -> String {
        format!("{}/api/fqsearch/directory/{}", self.base_url, book_id)
    }

    pub fn batch_url(&self) -> String {
        format!("{}/api/fqnovel/chapters/batch", self.base_url)
    }

    /// GET the chapter directory for a book, in reading order.
    pub fn get_directory(&self, book_id: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        let url = self.directory_url(book_id);
        debug!("GET {}", url);
        let response = self
            .inner
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .send()
            .map_err(|e| ApiError::Network {
                url: url.clone(),
                source: e,
            })?;
        let body = read_body(response, &url)?;
        parse_directory_response(&url, &body)
    }

    /// POST one batch of 1..=50 chapter ids. Ids absent from the result are missing chapters.
    pub fn post_batch(
        &self,
        book_id: &str,
        chapter_ids: &[String],
    ) -> Result<HashMap<String, ChapterRecord>, ApiError> {
        if chapter_ids.is_empty() || chapter_ids.len() > MAX_BATCH_SIZE {
            return Err(ApiError::InvalidBatch {
                len: chapter_ids.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        let url = self.batch_url();
        debug!("POST {} ({} chapters)", url, chapter_ids.len());
        let body = self.batch_body(book_id, chapter_ids);
        let response = self
            .inner
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .json(&body)
            .send()
            .map_err(|e| ApiError::Network {
                url: url.clone(),
                source: e,
            })?;
        let text = read_body(response, &url)?;
        parse_batch_response(&url, &text)
    }

    fn batch_body<'a>(&'a self, book_id: &'a str, chapter_ids: &'a [String]) -> BatchBody<'a> {
        BatchBody {
            book_id,
            chapter_ids,
            token: self.credentials.token.as_deref(),
            device_id: self.credentials.device_id.as_deref(),
            iid: self.credentials.iid.as_deref(),
        }
    }
}

impl ChapterSource for ApiClient {
    fn fetch_directory(&mut self, book_id: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.get_directory(book_id)
    }

    fn fetch_batch(
        &mut self,
        book_id: &str,
        chapter_ids: &[String],
    ) -> Result<HashMap<String, ChapterRecord>, ApiError> {
        self.post_batch(book_id, chapter_ids)
    }
}

/// Read the body as lossy UTF-8; a non-2xx status becomes an error carrying the body.
fn read_body(response: reqwest::blocking::Response, url: &str) -> Result<String, ApiError> {
    let status = response.status();
    let bytes = response.bytes().map_err(|e| ApiError::BodyRead {
        url: url.to_string(),
        source: e,
    })?;
    let body = String::from_utf8_lossy(&bytes).into_owned();
    if !status.is_success() {
        return Err(ApiError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
            body: body.trim().to_string(),
        });
    }
    Ok(body)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Builder for ApiClient: base URL, User-Agent, timeout and credentials.
#[derive(Debug)]
pub struct ApiClientBuilder {
    base_url: String,
    user_agent: Option<String>,
    timeout_secs: u64,
    credentials: Credentials,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            credentials: Credentials::default(),
        }
    }
}

impl ApiClientBuilder {
    /// Server base URL. Trailing slashes are dropped.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Per-request timeout in seconds. At least 1.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    /// User token; blank values are ignored.
    pub fn token(mut self, token: Option<String>) -> Self {
        self.credentials.token = non_blank(token);
        self
    }

    pub fn device_id(mut self, device_id: Option<String>) -> Self {
        self.credentials.device_id = non_blank(device_id);
        self
    }

    /// Install id (`iid`).
    pub fn iid(mut self, iid: Option<String>) -> Self {
        self.credentials.iid = non_blank(iid);
        self
    }

    pub fn build(self) -> Result<ApiClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;
        Ok(ApiClient {
            inner,
            base_url: self.base_url,
            credentials: self.credentials,
        })
    }
}
