//! Index builder.
//!
//! Streams a JSONL corpus into a combined `{prefix}.idx` file in two passes:
//!
//! 1. Each document's text goes to an anonymous temporary data file while
//!    its `id\tstart\tend` line goes to a named temporary index file next
//!    to the output. The sentinel line closes the index section.
//! 2. The data file is appended to the index file, which is synced and
//!    renamed onto `{prefix}.idx`.
//!
//! On any error both temporaries are removed and nothing new appears under
//! the final name.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::config::BuildConfig;
use crate::error::{CorpusError, Result};
use crate::extract::{document_id, document_text};
use crate::format::{index_path, is_sentinel, write_index_line, write_sentinel, DocRange};

/// What a finished build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    /// Final `{prefix}.idx` path.
    pub path: PathBuf,
    /// Documents written, duplicate ids included.
    pub documents: u64,
    /// Size of the index section (sentinel included); also the data offset.
    pub index_bytes: u64,
    /// Size of the data section.
    pub data_bytes: u64,
}

/// Builds combined index files from JSONL corpora.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    config: BuildConfig,
}

impl IndexBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Build `{output_prefix}.idx` from the JSONL file at `source`.
    pub fn build(&self, source: &Path, output_prefix: &Path) -> Result<BuildSummary> {
        self.config.validate()?;

        let output = index_path(output_prefix);
        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let reader = BufReader::new(File::open(source)?);
        let mut index = BufWriter::new(index_tempfile(dir)?);
        let mut data = BufWriter::new(tempfile::tempfile_in(dir)?);

        // Pass 1: index lines and document text, kept apart.
        let mut offset = 0u64;
        let mut index_bytes = 0u64;
        let mut documents = 0u64;

        for (i, line) in reader.split(b'\n').enumerate() {
            let line_no = i as u64 + 1;
            let mut line = line?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let record: Map<String, Value> = serde_json::from_slice(&line)
                .map_err(|source| CorpusError::Json { line: line_no, source })?;
            let id = document_id(&record, line_no)?;
            let text = document_text(
                &record,
                &self.config.keys,
                self.config.normalization,
                line_no,
            )?;

            let range = DocRange::new(offset, offset + text.len() as u64);
            if is_sentinel(&id, range) {
                return Err(CorpusError::SentinelCollision { line: line_no });
            }

            data.write_all(text.as_bytes())?;
            index_bytes += write_index_line(&mut index, &id, range)?;
            offset = range.end;
            documents += 1;

            if self.config.progress_interval > 0 && documents % self.config.progress_interval == 0 {
                self.progress(&file_name, "reading documents", documents);
            }
        }
        self.progress(&file_name, "reading documents", documents);
        index_bytes += write_sentinel(&mut index)?;

        // Pass 2: append the data section and publish.
        let mut data = data.into_inner().map_err(|e| e.into_error())?;
        data.seek(SeekFrom::Start(0))?;
        let copied = io::copy(&mut data, &mut index)?;
        debug_assert_eq!(copied, offset, "data section size mismatch");
        drop(data);

        let index = index.into_inner().map_err(|e| e.into_error())?;
        index.as_file().sync_all()?;
        index.persist(&output).map_err(|e| CorpusError::Io(e.error))?;
        self.progress(&file_name, "merging index", documents);

        Ok(BuildSummary {
            path: output,
            documents,
            index_bytes,
            data_bytes: offset,
        })
    }

    fn progress(&self, file: &str, stage: &str, documents: u64) {
        if self.config.verbose {
            tracing::info!(file, documents, "{}", stage);
        } else {
            tracing::debug!(file, documents, "{}", stage);
        }
    }
}

/// Mode requested for published index files, before the umask applies.
#[cfg(unix)]
const INDEX_FILE_MODE: u32 = 0o644;

/// Named temporary for the index. tempfile defaults to owner-only (0600),
/// which `persist` would carry over to the published file.
fn index_tempfile(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(INDEX_FILE_MODE));
    }
    builder.tempfile_in(dir)
}

/// Build `{output_prefix}.idx` with default settings for the given keys.
pub fn build<S: AsRef<str>>(
    source: &Path,
    output_prefix: &Path,
    keys: &[S],
    verbose: bool,
) -> Result<BuildSummary> {
    let config = BuildConfig::new(keys.iter().map(|k| k.as_ref().to_string())).verbose(verbose);
    IndexBuilder::new(config).build(source, output_prefix)
}

// ── Tests ──────────────────────────────────────────────────────────
