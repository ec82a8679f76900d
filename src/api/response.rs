//! Response envelope checking and schema normalization.
//!
//! Both endpoints wrap their payload as `{code?, msg?, data}`. `code` absent,
//! null or `0` means success. The payload itself is read leniently: field
//! spellings vary between server versions and ids may arrive as numbers.

use crate::api::error::ApiError;
use crate::model::{ChapterRecord, DirectoryEntry};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// How much of an unparseable body to keep in the error message.
pub const INVALID_JSON_EXCERPT_CHARS: usize = 200;

pub(crate) const DIRECTORY_ENDPOINT: &str = "directory";
pub(crate) const BATCH_ENDPOINT: &str = "batch";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    code: Value,
    msg: Value,
    data: Value,
}

fn excerpt(body: &str) -> String {
    body.chars().take(INVALID_JSON_EXCERPT_CHARS).collect()
}

fn display_value(v: &Value) -> String {
    match v {
        Value::Null => "none".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_success_code(code: &Value) -> bool {
    match code {
        Value::Null => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Parse the envelope and return `data` (possibly null) if `code` signals success.
fn open_envelope(endpoint: &'static str, url: &str, body: &str) -> Result<Value, ApiError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|_| ApiError::InvalidJson {
        url: url.to_string(),
        excerpt: excerpt(body),
    })?;
    if !is_success_code(&envelope.code) {
        return Err(ApiError::Server {
            endpoint,
            code: display_value(&envelope.code),
            msg: display_value(&envelope.msg),
        });
    }
    Ok(envelope.data)
}

fn non_empty_array(v: Option<&Value>) -> Option<&Vec<Value>> {
    v.and_then(Value::as_array).filter(|a| !a.is_empty())
}

/// Chapter id from a string or number; blank strings count as absent.
fn id_from(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Normalize directory `data` into entries in server order.
///
/// Accepts `item_data_list` or `itemDataList` (snake_case preferred when
/// non-empty) and `item_id` or `itemId`. Entries without an id are dropped.
pub fn normalize_directory(data: &Value) -> Vec<DirectoryEntry> {
    let items = non_empty_array(data.get("item_data_list"))
        .or_else(|| non_empty_array(data.get("itemDataList")));
    let Some(items) = items else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| {
            let id = id_from(item.get("item_id")).or_else(|| id_from(item.get("itemId")))?;
            let title = match item.get("title") {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            Some(DirectoryEntry::new(id, title))
        })
        .collect()
}

/// Normalize batch `data` into a map from chapter id to record.
///
/// A missing or non-object `chapters` yields an empty map; non-object entries
/// are left out so they count as missing. Within a record, a field of the wrong
/// JSON type reads as absent instead of dropping the whole chapter.
pub fn normalize_batch(data: &Value) -> HashMap<String, ChapterRecord> {
    let Some(chapters) = data.get("chapters").and_then(Value::as_object) else {
        return HashMap::new();
    };
    chapters
        .iter()
        .filter_map(|(id, v)| {
            let obj = v.as_object()?;
            Some((
                id.clone(),
                ChapterRecord {
                    chapter_name: string_field(obj, "chapterName"),
                    text_content: string_field(obj, "txtContent"),
                    raw_content: string_field(obj, "rawContent"),
                },
            ))
        })
        .collect()
}

/// Parse a directory response body fetched from `url`.
pub fn parse_directory_response(url: &str, body: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
    let data = open_envelope(DIRECTORY_ENDPOINT, url, body)?;
    Ok(normalize_directory(&data))
}

/// Parse a batch response body fetched from `url`.
pub fn parse_batch_response(
    url: &str,
    body: &str,
) -> Result<HashMap<String, ChapterRecord>, ApiError> {
    let data = open_envelope(BATCH_ENDPOINT, url, body)?;
    Ok(normalize_batch(&data))
}
