//! Read side: memory-mapped access to a combined index file.
//!
//! `CorpusStore::open` maps `{prefix}.idx`, scans the index section into a
//! lookup table and an ordinal list, and then serves documents as `&str`
//! slices of the mapping. Nothing is copied on lookup.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{CorpusError, Result};
use crate::format::{index_path, parse_index_line, DocRange, IndexLine, LINE_TERMINATOR};

/// Prefix that forces [`DocKey::parse`] to read its input as an id.
pub const ID_PREFIX: &str = "id:";

/// Lookup key for [`CorpusStore::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKey<'a> {
    /// Document identifier.
    Id(&'a str),
    /// Zero-based insertion position. Negative values are always out of range.
    Ordinal(i64),
}

impl<'a> DocKey<'a> {
    /// Parse user input: `#<n>` is an ordinal, `id:<s>` is always the id
    /// `<s>`, anything else is an id.
    ///
    /// Ids that merely look numeric (`"42"`) stay ids; an id spelled like an
    /// ordinal (`"#1"`) is reached as `id:#1`.
    pub fn parse(input: &'a str) -> Self {
        if let Some(id) = input.strip_prefix(ID_PREFIX) {
            return DocKey::Id(id);
        }
        match input.strip_prefix('#').map(str::parse::<i64>) {
            Some(Ok(ordinal)) => DocKey::Ordinal(ordinal),
            _ => DocKey::Id(input),
        }
    }
}

impl<'a> From<&'a str> for DocKey<'a> {
    fn from(id: &'a str) -> Self {
        DocKey::Id(id)
    }
}

impl From<usize> for DocKey<'_> {
    fn from(ordinal: usize) -> Self {
        DocKey::Ordinal(i64::try_from(ordinal).unwrap_or(i64::MAX))
    }
}

/// Mapping plus the handle it was created from; dropped together.
#[derive(Debug)]
struct Mapped {
    mmap: Mmap,
    _file: File,
}

/// Parsed index section.
struct IndexSection {
    entries: HashMap<String, DocRange>,
    ordinals: Vec<String>,
    data_offset: usize,
}

/// Read-only document store over one combined index file.
///
/// Lookups borrow `&self` and never mutate, so a store can be shared across
/// threads. Duplicate ids resolve to their last occurrence while the ordinal
/// list keeps every occurrence.
#[derive(Debug)]
pub struct CorpusStore {
    path: PathBuf,
    entries: HashMap<String, DocRange>,
    ordinals: Vec<String>,
    data_offset: usize,
    data_len: usize,
    mapped: Option<Mapped>,
}

impl CorpusStore {
    /// Open `{prefix}.idx`.
    pub fn open(prefix: impl AsRef<Path>) -> Result<Self> {
        let path = index_path(prefix.as_ref());
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CorpusError::IndexNotFound(path))
            }
            Err(e) => return Err(CorpusError::Io(e)),
        };

        if file.metadata()?.len() == 0 {
            return Err(CorpusError::MalformedIndex {
                line: 1,
                reason: "empty file".into(),
            });
        }

        // Index files are immutable once published by the builder.
        let mmap = unsafe { Mmap::map(&file) }?;
        let section = scan_index(&mmap)?;
        let data_len = mmap.len() - section.data_offset;

        tracing::debug!(
            path = %path.display(),
            documents = section.ordinals.len(),
            data_offset = section.data_offset,
            data_len,
            "opened corpus index"
        );

        Ok(Self {
            path,
            entries: section.entries,
            ordinals: section.ordinals,
            data_offset: section.data_offset,
            data_len,
            mapped: Some(Mapped { mmap, _file: file }),
        })
    }

    /// Fetch a document by identifier or ordinal.
    pub fn get(&self, key: DocKey<'_>) -> Result<&str> {
        match key {
            DocKey::Id(id) => self.get_by_id(id),
            DocKey::Ordinal(ordinal) => {
                self.ensure_open()?;
                match usize::try_from(ordinal) {
                    Ok(i) => self.get_by_ordinal(i),
                    Err(_) => Err(CorpusError::OrdinalOutOfRange {
                        ordinal,
                        len: self.len(),
                    }),
                }
            }
        }
    }

    /// Fetch a document by identifier.
    pub fn get_by_id(&self, id: &str) -> Result<&str> {
        let mapped = self.ensure_open()?;
        let range = self
            .entries
            .get(id)
            .ok_or_else(|| CorpusError::IdNotFound(id.to_string()))?;

        let start = self.data_offset + range.start as usize;
        let end = self.data_offset + range.end as usize;
        let bytes = mapped
            .mmap
            .get(start..end)
            .ok_or_else(|| CorpusError::CorruptDocument { id: id.to_string() })?;

        std::str::from_utf8(bytes).map_err(|_| CorpusError::CorruptDocument { id: id.to_string() })
    }

    /// Fetch the document at insertion position `ordinal`.
    pub fn get_by_ordinal(&self, ordinal: usize) -> Result<&str> {
        self.ensure_open()?;
        let id = self
            .ordinals
            .get(ordinal)
            .ok_or_else(|| CorpusError::OrdinalOutOfRange {
                ordinal: i64::try_from(ordinal).unwrap_or(i64::MAX),
                len: self.ordinals.len(),
            })?;
        self.get_by_id(id)
    }

    /// Number of index entries, duplicate ids included.
    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }

    /// Number of distinct ids.
    pub fn unique_len(&self) -> usize {
        self.entries.len()
    }

    /// Identifier at `ordinal`.
    pub fn id_at(&self, ordinal: usize) -> Option<&str> {
        self.ordinals.get(ordinal).map(String::as_str)
    }

    /// Identifiers in ordinal order.
    pub fn ids(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.ordinals.iter().map(String::as_str)
    }

    /// Byte range of `id` relative to the data section.
    pub fn range_of(&self, id: &str) -> Option<DocRange> {
        self.entries.get(id).copied()
    }

    /// Absolute file offset of the data section.
    pub fn data_offset(&self) -> u64 {
        self.data_offset as u64
    }

    /// Size of the data section in bytes.
    pub fn data_len(&self) -> u64 {
        self.data_len as u64
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.mapped.is_none()
    }

    /// Release the mapping and file handle. Every later lookup fails with
    /// [`CorpusError::Closed`]. Dropping the store does the same.
    pub fn close(&mut self) {
        if self.mapped.take().is_some() {
            tracing::debug!(path = %self.path.display(), "closed corpus index");
        }
    }

    fn ensure_open(&self) -> Result<&Mapped> {
        self.mapped.as_ref().ok_or(CorpusError::Closed)
    }
}

/// Scan the index section at the head of `bytes`.
fn scan_index(bytes: &[u8]) -> Result<IndexSection> {
    let mut entries = HashMap::new();
    let mut ordinals = Vec::new();
    // Entry with the largest end offset, checked once the data size is known.
    let mut widest: Option<(u64, u64)> = None;

    let mut pos = 0usize;
    let mut line_no = 0u64;
    loop {
        line_no += 1;
        let rest = &bytes[pos..];
        let Some(len) = rest.iter().position(|&b| b == LINE_TERMINATOR) else {
            return Err(CorpusError::MalformedIndex {
                line: line_no,
                reason: "index section is not terminated by a sentinel line".into(),
            });
        };
        let line = &rest[..len];
        pos += len + 1;

        match parse_index_line(line, line_no)? {
            IndexLine::Sentinel => break,
            IndexLine::Entry { id, range } => {
                if widest.map_or(true, |(_, end)| range.end > end) {
                    widest = Some((line_no, range.end));
                }
                entries.insert(id.to_string(), range);
                ordinals.push(id.to_string());
            }
        }
    }

    let data_len = (bytes.len() - pos) as u64;
    if let Some((line, end)) = widest {
        if end > data_len {
            return Err(CorpusError::MalformedIndex {
                line,
                reason: format!("end offset {} exceeds data section of {} bytes", end, data_len),
            });
        }
    }

    Ok(IndexSection {
        entries,
        ordinals,
        data_offset: pos,
    })
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn write_index(dir: &TempDir, contents: &[u8]) -> PathBuf {
        let prefix = dir.path().join("corpus");
        std::fs::write(index_path(&prefix), contents).unwrap();
        prefix
    }

    fn build_corpus(dir: &TempDir, lines: &[&str], keys: &[&str]) -> PathBuf {
        let source = dir.path().join("corpus.jsonl");
        std::fs::write(&source, lines.join("\n")).unwrap();
        let prefix = dir.path().join("corpus");
        build(&source, &prefix, keys, false).unwrap();
        prefix
    }

    #[test]
    fn test_open_reads_hand_written_index() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"x\t0\t3\ny\t3\t8\n0\t0\t0\nfoohello");
        let store = CorpusStore::open(&prefix).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.data_offset(), 18);
        assert_eq!(store.data_len(), 8);
        assert_eq!(store.get_by_id("x").unwrap(), "foo");
        assert_eq!(store.get_by_id("y").unwrap(), "hello");
        assert_eq!(store.get_by_ordinal(1).unwrap(), "hello");
        assert_eq!(store.range_of("y"), Some(DocRange::new(3, 8)));
    }

    #[test]
    fn test_concrete_scenario() {
        let dir = TempDir::new().unwrap();
        let prefix = build_corpus(
            &dir,
            &[
                r#"{"id":"a","title":"Héllo","body":["world","wide"]}"#,
                r#"{"id":"b","title":"Foo","body":["bar"]}"#,
            ],
            &["title", "body"],
        );
        let store = CorpusStore::open(&prefix).unwrap();

        assert_eq!(store.get_by_id("a").unwrap(), "Hello world wide");
        assert_eq!(store.get_by_id("b").unwrap(), "Foo bar");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(DocKey::Ordinal(0)).unwrap(), store.get(DocKey::Id("a")).unwrap());
    }

    #[test]
    fn test_missing_index_file() {
        let dir = TempDir::new().unwrap();
        let err = CorpusStore::open(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, CorpusError::IndexNotFound(ref p) if p.ends_with("absent.idx")));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unknown_id_and_ordinals() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"x\t0\t3\n0\t0\t0\nfoo");
        let store = CorpusStore::open(&prefix).unwrap();

        assert!(matches!(store.get_by_id("nonexistent"), Err(CorpusError::IdNotFound(_))));
        assert!(matches!(
            store.get_by_ordinal(1),
            Err(CorpusError::OrdinalOutOfRange { ordinal: 1, len: 1 })
        ));
        assert!(matches!(
            store.get(DocKey::Ordinal(-1)),
            Err(CorpusError::OrdinalOutOfRange { ordinal: -1, len: 1 })
        ));
        // a failed lookup does not poison the store
        assert_eq!(store.get_by_id("x").unwrap(), "foo");
    }

    #[test]
    fn test_duplicate_ids_last_wins_but_all_counted() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"d\t0\t3\ne\t3\t4\nd\t4\t7\n0\t0\t0\noldxnew");
        let store = CorpusStore::open(&prefix).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.unique_len(), 2);
        assert_eq!(store.get_by_id("d").unwrap(), "new");
        // ordinal 0 resolves through its id, so it sees the last occurrence
        assert_eq!(store.get_by_ordinal(0).unwrap(), "new");
        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["d", "e", "d"]);
    }

    #[test]
    fn test_empty_corpus() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"0\t0\t0\n");
        let store = CorpusStore::open(&prefix).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.data_len(), 0);
        assert!(matches!(store.get_by_ordinal(0), Err(CorpusError::OrdinalOutOfRange { .. })));
    }

    #[test]
    fn test_data_containing_newlines_and_sentinel_text() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"x\t0\t6\n0\t0\t0\n0\t0\t0\n");
        let store = CorpusStore::open(&prefix).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_by_id("x").unwrap(), "0\t0\t0\n");
    }

    #[test]
    fn test_malformed_index_lines() {
        let cases: &[(&[u8], u64)] = &[
            (b"x\t0\n0\t0\t0\n", 1),
            (b"x\t0\t1\ny\t1\t2\t3\n0\t0\t0\nab", 2),
            (b"x\tzero\t1\n0\t0\t0\na", 1),
            (b"x\t-1\t1\n0\t0\t0\na", 1),
            (b"x\t2\t1\n0\t0\t0\nab", 1),
            (b"", 1),
        ];
        for (contents, expected_line) in cases {
            let dir = TempDir::new().unwrap();
            let prefix = write_index(&dir, contents);
            match CorpusStore::open(&prefix) {
                Err(CorpusError::MalformedIndex { line, .. }) => assert_eq!(line, *expected_line),
                other => panic!("{:?}: unexpected {other:?}", String::from_utf8_lossy(contents)),
            }
        }
    }

    #[test]
    fn test_crlf_index_lines_rejected() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"x\t0\t3\r\n0\t0\t0\nfoo");
        let err = CorpusStore::open(&prefix).unwrap_err();
        assert!(matches!(err, CorpusError::MalformedIndex { line: 1, .. }));

        let prefix = write_index(&dir, b"x\t0\t3\n0\t0\t0\r\nfoo");
        let err = CorpusStore::open(&prefix).unwrap_err();
        assert!(matches!(err, CorpusError::MalformedIndex { line: 2, .. }));
    }

    #[test]
    fn test_hash_prefixed_id_reachable_with_id_prefix() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"#1\t0\t3\nb\t3\t6\n0\t0\t0\nfoobar");
        let store = CorpusStore::open(&prefix).unwrap();
        assert_eq!(store.get(DocKey::parse("#1")).unwrap(), "bar");
        assert_eq!(store.get(DocKey::parse("id:#1")).unwrap(), "foo");
    }

    #[test]
    fn test_missing_sentinel() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"x\t0\t3\nfoo");
        let err = CorpusStore::open(&prefix).unwrap_err();
        assert!(matches!(err, CorpusError::MalformedIndex { line: 2, .. }));
    }

    #[test]
    fn test_range_past_data_section() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"x\t0\t2\ny\t2\t9\n0\t0\t0\nabc");
        let err = CorpusStore::open(&prefix).unwrap_err();
        assert!(matches!(err, CorpusError::MalformedIndex { line: 2, .. }));
    }

    #[test]
    fn test_invalid_utf8_document_is_corruption() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"x\t0\t2\ny\t2\t4\n0\t0\t0\nok\xff\xfe");
        let store = CorpusStore::open(&prefix).unwrap();
        assert_eq!(store.get_by_id("x").unwrap(), "ok");
        let err = store.get_by_id("y").unwrap_err();
        assert!(matches!(err, CorpusError::CorruptDocument { ref id } if id == "y"));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_close_is_permanent() {
        let dir = TempDir::new().unwrap();
        let prefix = write_index(&dir, b"x\t0\t3\n0\t0\t0\nfoo");
        let mut store = CorpusStore::open(&prefix).unwrap();
        assert!(!store.is_closed());

        store.close();
        assert!(store.is_closed());
        assert!(matches!(store.get_by_id("x"), Err(CorpusError::Closed)));
        assert!(matches!(store.get_by_id("missing"), Err(CorpusError::Closed)));
        assert!(matches!(store.get_by_ordinal(0), Err(CorpusError::Closed)));
        assert!(matches!(store.get(DocKey::Ordinal(-1)), Err(CorpusError::Closed)));

        // second close is a no-op
        store.close();
        assert!(store.is_closed());
    }

    #[test]
    fn test_doc_key_parse() {
        assert_eq!(DocKey::parse("#3"), DocKey::Ordinal(3));
        assert_eq!(DocKey::parse("#-1"), DocKey::Ordinal(-1));
        assert_eq!(DocKey::parse("42"), DocKey::Id("42"));
        assert_eq!(DocKey::parse("#abc"), DocKey::Id("#abc"));
        assert_eq!(DocKey::parse("id:#1"), DocKey::Id("#1"));
        assert_eq!(DocKey::parse("id:id:x"), DocKey::Id("id:x"));
        assert_eq!(DocKey::from(2usize), DocKey::Ordinal(2));
    }

    #[test]
    fn test_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CorpusStore>();
    }
}
