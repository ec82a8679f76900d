//! Plain-text extraction from chapter markup, and filename sanitizing.
//!
//! Markup stripping runs a fixed table of steps in order. Each step is either a
//! regex replacement or HTML entity decoding; the table is the whole parser.

use lazy_static::lazy_static;
use regex::Regex;

/// One step of the markup-to-text pipeline.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Replace every match of `pattern` with `with`.
    Replace {
        pattern: &'static str,
        with: &'static str,
    },
    /// Decode HTML entities (`&amp;`, `&#12354;`, ...).
    DecodeEntities,
}

/// Markup rules, applied top to bottom.
pub const MARKUP_STEPS: &[Step] = &[
    // Closing paragraph; a break right after it does not add a second newline.
    Step::Replace {
        pattern: r"(?i)</p\s*>(?:[ \t]*<br\s*/?>)?",
        with: "\n",
    },
    Step::Replace {
        pattern: r"(?i)<br\s*/?>",
        with: "\n",
    },
    Step::Replace {
        pattern: r"<[^>]+>",
        with: "",
    },
    Step::DecodeEntities,
    // At most one blank line between paragraphs.
    Step::Replace {
        pattern: r"\n{3,}",
        with: "\n\n",
    },
];

enum CompiledStep {
    Replace(Regex, &'static str),
    DecodeEntities,
}

lazy_static! {
    static ref COMPILED_STEPS: Vec<CompiledStep> = MARKUP_STEPS
        .iter()
        .map(|step| match *step {
            Step::Replace { pattern, with } => CompiledStep::Replace(
                Regex::new(pattern).expect("markup step patterns are valid regexes"),
                with,
            ),
            Step::DecodeEntities => CompiledStep::DecodeEntities,
        })
        .collect();
}

/// Convert chapter markup to plain text: break and paragraph-close tags become
/// newlines, other tags are dropped, entities are decoded, and runs of blank
/// lines collapse to one. Result is trimmed.
///
/// Running it again on its own output changes nothing, except when the input
/// carried entity-encoded markup: `&lt;b&gt;` decodes to `<b>`, which a second
/// pass strips, and `&amp;amp;` decodes one level per pass.
pub fn markup_to_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let mut text = raw.to_string();
    for step in COMPILED_STEPS.iter() {
        text = match step {
            CompiledStep::Replace(re, with) => re.replace_all(&text, *with).into_owned(),
            CompiledStep::DecodeEntities => html_escape::decode_html_entities(&text).into_owned(),
        };
    }
    text.trim().to_string()
}

/// Characters replaced with `_` in output filenames.
const UNSAFE_FILENAME_CHARS: &[char] = &[
    '\\', '/', '\n', '\r', '\t', ':', '*', '?', '"', '<', '>', '|',
];

/// Turn a book name into a filesystem-safe file stem. Empty names become `book`.
pub fn sanitize_filename(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return "book".to_string();
    }
    name.chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}
