//! Data model shared by the fetchers and the merger.

/// One chapter as listed by the directory endpoint. Directory order is reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub chapter_id: String,
    pub title: String,
}

impl DirectoryEntry {
    pub fn new(chapter_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            title: title.into(),
        }
    }
}

/// Server payload for one chapter in a batch response (`chapterName`,
/// `txtContent`, `rawContent` on the wire; see `api::response`).
///
/// `text_content` is pre-rendered plain text; `raw_content` is markup used only
/// when no plain text is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterRecord {
    pub chapter_name: Option<String>,
    pub text_content: Option<String>,
    pub raw_content: Option<String>,
}

/// Per-run counters. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState {
    pub done: usize,
    pub missing: usize,
    pub total: usize,
}

impl RunState {
    pub fn new(total: usize) -> Self {
        Self {
            done: 0,
            missing: 0,
            total,
        }
    }

    /// Chapters handled so far, written or skipped.
    pub fn processed(&self) -> usize {
        self.done + self.missing
    }

    pub fn is_complete(&self) -> bool {
        self.processed() == self.total
    }
}
