//! Errors from the directory and batch endpoints.

use thiserror::Error;

/// Fatal errors talking to the novel API. A missing chapter is not an error.
#[derive(Debug, Error)]
pub enum ApiError {
    // Transport
    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        /// Server error body, lossily decoded.
        body: String,
    },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Protocol
    #[error("Invalid JSON from {url}: {excerpt}")]
    InvalidJson { url: String, excerpt: String },

    #[error("{endpoint} failed: code={code} msg={msg}")]
    Server {
        endpoint: &'static str,
        code: String,
        msg: String,
    },

    #[error("Batch must hold 1 to {max} chapter ids, got {len}")]
    InvalidBatch { len: usize, max: usize },
}
