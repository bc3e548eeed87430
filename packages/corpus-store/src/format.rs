//! On-disk format shared by the builder and the store.
//!
//! A combined index file holds a text index section followed by the raw
//! document data:
//!
//! ```text
//! <id_1>\t<start_1>\t<end_1>\n
//! <id_2>\t<start_2>\t<end_2>\n
//! ...
//! 0\t0\t0\n                      sentinel, ends the index section
//! <concatenated document text, no separators>
//! ```
//!
//! `start`/`end` are ASCII decimal byte offsets relative to the first byte
//! after the sentinel line. Index lines end in a bare `\n`; a `\r` before it
//! makes the line malformed.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CorpusError, Result};

/// Extension appended to the output prefix.
pub const INDEX_EXTENSION: &str = "idx";

/// Field separator within an index line.
pub const FIELD_SEPARATOR: u8 = b'\t';

/// Index line terminator.
pub const LINE_TERMINATOR: u8 = b'\n';

/// End-of-index marker, terminator included.
pub const SENTINEL_LINE: &[u8] = b"0\t0\t0\n";

const SENTINEL_FIELD: &str = "0";

/// `{prefix}.idx`. The extension is appended, never substituted, so a
/// prefix like `corpus.v2` yields `corpus.v2.idx`.
pub fn index_path(prefix: &Path) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(".");
    name.push(INDEX_EXTENSION);
    PathBuf::from(name)
}

/// Half-open byte range `[start, end)` within the data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DocRange {
    pub start: u64,
    pub end: u64,
}

impl DocRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "DocRange start past end");
        Self { start, end }
    }

    /// Length in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Whether `(id, range)` would serialize to the sentinel line.
pub fn is_sentinel(id: &str, range: DocRange) -> bool {
    id == SENTINEL_FIELD && range.start == 0 && range.end == 0
}

/// Returns why `id` cannot be stored in an index line, if it can't.
pub fn id_violation(id: &str) -> Option<&'static str> {
    if id.contains('\t') {
        Some("contains a tab character")
    } else if id.contains('\n') || id.contains('\r') {
        Some("contains a line break")
    } else {
        None
    }
}

/// Write one index line. Returns the number of bytes written.
pub fn write_index_line<W: Write>(w: &mut W, id: &str, range: DocRange) -> Result<u64> {
    let line = format!("{}\t{}\t{}\n", id, range.start, range.end);
    w.write_all(line.as_bytes())?;
    Ok(line.len() as u64)
}

/// Write the sentinel line. Returns the number of bytes written.
pub fn write_sentinel<W: Write>(w: &mut W) -> Result<u64> {
    w.write_all(SENTINEL_LINE)?;
    Ok(SENTINEL_LINE.len() as u64)
}

/// One parsed line of the index section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLine<'a> {
    Entry { id: &'a str, range: DocRange },
    Sentinel,
}

/// Parse one index line, terminator already stripped.
///
/// `line_no` is 1-based and only used for error context.
pub fn parse_index_line(line: &[u8], line_no: u64) -> Result<IndexLine<'_>> {
    let malformed = |reason: String| CorpusError::MalformedIndex {
        line: line_no,
        reason,
    };

    let text = std::str::from_utf8(line)
        .map_err(|_| malformed("line is not valid UTF-8".into()))?;

    let mut fields = text.split(FIELD_SEPARATOR as char);
    let (id, start, end) = match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(id), Some(start), Some(end), None) => (id, start, end),
        _ => {
            return Err(malformed(format!(
                "expected 3 tab-separated fields, got {}",
                text.split(FIELD_SEPARATOR as char).count()
            )))
        }
    };

    if id == SENTINEL_FIELD && start == SENTINEL_FIELD && end == SENTINEL_FIELD {
        return Ok(IndexLine::Sentinel);
    }

    let start = parse_offset(start).ok_or_else(|| malformed(format!("invalid start offset {:?}", start)))?;
    let end = parse_offset(end).ok_or_else(|| malformed(format!("invalid end offset {:?}", end)))?;
    if start > end {
        return Err(malformed(format!("start {} is past end {}", start, end)));
    }

    Ok(IndexLine::Entry {
        id,
        range: DocRange::new(start, end),
    })
}

/// Plain ASCII digits only: no sign, no whitespace.
fn parse_offset(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

// ── Tests ──────────────────────────────────────────────────────────
