//! Merge chapters into one text file in directory order.
//!
//! Ids are fetched in fixed-size batches, one request at a time. Each batch is
//! written out in directory order (never response order) before the next one is
//! requested, so the output is the same for every batch size.

use crate::api::{ApiError, ChapterSource, MAX_BATCH_SIZE};
use crate::model::{ChapterRecord, DirectoryEntry, RunState};
use crate::text::markup_to_text;
use log::debug;
use std::io::{self, Write};
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 30;

/// Errors that abort a merge. Output written so far stays on disk.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Failed to write output: {0}")]
    Write(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Chapter ids per batch request, 1..=50.
    pub batch_size: usize,
    /// Write a title line before each chapter body.
    pub include_titles: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            include_titles: true,
        }
    }
}

/// Clamp a requested batch size into 1..=50.
pub fn clamp_batch_size(requested: usize) -> usize {
    requested.clamp(1, MAX_BATCH_SIZE)
}

/// Book header written once at the top of the output.
pub fn write_header<W: Write>(out: &mut W, book_name: &str, book_id: &str) -> io::Result<()> {
    writeln!(out, "小说名：{}", book_name)?;
    writeln!(out, "书籍ID：{}", book_id)?;
    writeln!(out)?;
    Ok(())
}

/// The record's own chapter name, else the directory title. May be empty.
pub fn resolve_title(record: &ChapterRecord, directory_title: &str) -> String {
    record
        .chapter_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(directory_title)
        .trim()
        .to_string()
}

/// Pre-rendered text if present, else text extracted from the raw markup.
pub fn resolve_body(record: &ChapterRecord) -> String {
    let text = record.text_content.as_deref().unwrap_or("").trim();
    if !text.is_empty() {
        return text.to_string();
    }
    markup_to_text(record.raw_content.as_deref().unwrap_or("").trim())
}

/// Write one chapter: optional title line, body, then a blank separator line.
pub fn write_chapter<W: Write>(
    out: &mut W,
    title: &str,
    body: &str,
    include_titles: bool,
) -> io::Result<()> {
    if include_titles {
        if title.is_empty() {
            writeln!(out)?;
        } else {
            write!(out, "{}\n\n", title)?;
        }
    }
    if !body.is_empty() {
        out.write_all(body.as_bytes())?;
        if !body.ends_with('\n') {
            writeln!(out)?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// Fetch and write every entry in order, batch by batch.
///
/// `progress` is called after each batch is written and flushed. The first
/// fetch or write error aborts the run.
pub fn merge_chapters<S, W>(
    source: &mut S,
    book_id: &str,
    entries: &[DirectoryEntry],
    out: &mut W,
    options: &MergeOptions,
    progress: Option<&dyn Fn(&RunState)>,
) -> Result<RunState, MergeError>
where
    S: ChapterSource + ?Sized,
    W: Write,
{
    let mut state = RunState::new(entries.len());
    let batch_size = clamp_batch_size(options.batch_size);

    for chunk in entries.chunks(batch_size) {
        let ids: Vec<String> = chunk.iter().map(|e| e.chapter_id.clone()).collect();
        let records = source.fetch_batch(book_id, &ids)?;

        for entry in chunk {
            let Some(record) = records.get(&entry.chapter_id) else {
                debug!("Chapter {} missing from batch response", entry.chapter_id);
                state.missing += 1;
                continue;
            };
            let title = resolve_title(record, &entry.title);
            let body = resolve_body(record);
            write_chapter(out, &title, &body, options.include_titles)?;
            state.done += 1;
        }

        out.flush()?;
        if let Some(p) = progress {
            p(&state);
        }
    }

    Ok(state)
}

/// Header plus all chapters. See [merge_chapters].
pub fn merge_book<S, W>(
    source: &mut S,
    book_id: &str,
    book_name: &str,
    entries: &[DirectoryEntry],
    out: &mut W,
    options: &MergeOptions,
    progress: Option<&dyn Fn(&RunState)>,
) -> Result<RunState, MergeError>
where
    S: ChapterSource + ?Sized,
    W: Write,
{
    write_header(out, book_name, book_id)?;
    out.flush()?;
    merge_chapters(source, book_id, entries, out, options, progress)
}
