//! corpus-store: a fixed-format document store for JSONL corpora.
//!
//! [`IndexBuilder`] turns a line-delimited JSON corpus into one combined
//! `{prefix}.idx` file (text index section, sentinel line, concatenated
//! document text). [`CorpusStore`] memory-maps that file and serves
//! documents by id or ordinal without loading the corpus into memory.
//!
//! ```no_run
//! use corpus_store::{BuildConfig, CorpusStore, IndexBuilder};
//! use std::path::Path;
//!
//! # fn main() -> corpus_store::Result<()> {
//! let builder = IndexBuilder::new(BuildConfig::new(["title", "body"]));
//! builder.build(Path::new("corpus.jsonl"), Path::new("out/corpus"))?;
//!
//! let store = CorpusStore::open("out/corpus")?;
//! println!("{} documents", store.len());
//! println!("{}", store.get_by_ordinal(0)?);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod extract;
pub mod format;
pub mod store;

pub use builder::{build, BuildSummary, IndexBuilder};
pub use config::BuildConfig;
pub use error::{CorpusError, ErrorKind, Result};
pub use extract::{transliterate, FieldValue, TextNormalization};
pub use format::DocRange;
pub use store::{CorpusStore, DocKey};
