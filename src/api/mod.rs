//! Novel API access: the directory and batch-chapter endpoints.

mod client;
mod error;
pub mod response;

pub use client::{
    ApiClient, ApiClientBuilder, Credentials, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT, MAX_BATCH_SIZE,
};
pub use error::ApiError;

use crate::model::{ChapterRecord, DirectoryEntry};
use std::collections::HashMap;

/// Where chapters come from. Implemented by [ApiClient]; the merger only sees this trait.
pub trait ChapterSource {
    /// Ordered directory for a book. Entries without an id are already dropped.
    fn fetch_directory(&mut self, book_id: &str) -> Result<Vec<DirectoryEntry>, ApiError>;

    /// Records for one batch of ids. Ids absent from the map are missing chapters.
    fn fetch_batch(
        &mut self,
        book_id: &str,
        chapter_ids: &[String],
    ) -> Result<HashMap<String, ChapterRecord>, ApiError>;
}
