//! fqmerge: fetch a novel's chapters from a local fqnovel API and merge them into one TXT file.

pub mod api;
pub mod cli;
pub mod config;
pub mod logging;
pub mod merge;
pub mod model;
pub mod text;

// Re-exports for CLI and consumers.
pub use api::{ApiClient, ApiClientBuilder, ApiError, ChapterSource, Credentials};
pub use merge::{merge_book, merge_chapters, MergeError, MergeOptions};
pub use model::{ChapterRecord, DirectoryEntry, RunState};
pub use text::{markup_to_text, sanitize_filename};
