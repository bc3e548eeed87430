//! corpus-store CLI: build and read combined corpus index files.
//!
//! Usage:
//!   corpus-store build corpus.jsonl out/corpus --key title --key body -v
//!   corpus-store get out/corpus doc-17 '#0'
//!   corpus-store stat out/corpus
//!   corpus-store ids out/corpus

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use corpus_store::{BuildConfig, CorpusStore, DocKey, IndexBuilder, TextNormalization};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "corpus-store")]
#[command(about = "Build and read fixed-format corpus index files")]
#[command(version)]
struct Cli {
    /// Log progress at info level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build `<prefix>.idx` from a JSONL corpus
    Build {
        /// Line-delimited JSON source file
        source: PathBuf,

        /// Output prefix; the index is written to `<prefix>.idx`
        prefix: PathBuf,

        /// Field to extract, in order (repeatable)
        #[arg(short, long = "key")]
        keys: Vec<String>,

        /// JSON build config; flags given here override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Store text as UTF-8 instead of transliterating to ASCII
        #[arg(long)]
        preserve_unicode: bool,

        /// Documents between progress reports (0 disables)
        #[arg(long)]
        progress_interval: Option<u64>,
    },

    /// Print documents by id, or by ordinal with a `#` prefix (`#0`).
    /// Use `id:<id>` for ids that start with `#` (`id:#1`)
    Get {
        prefix: PathBuf,

        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Print document count and section sizes
    Stat { prefix: PathBuf },

    /// Print document ids in ordinal order
    Ids { prefix: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            source,
            prefix,
            keys,
            config,
            preserve_unicode,
            progress_interval,
        } => {
            let config = resolve_config(
                config.as_deref(),
                keys,
                cli.verbose,
                preserve_unicode,
                progress_interval,
            )?;
            run_build(&source, &prefix, config)
        }
        Commands::Get { prefix, keys } => run_get(&prefix, &keys, &mut io::stdout().lock()),
        Commands::Stat { prefix } => run_stat(&prefix, &mut io::stdout().lock()),
        Commands::Ids { prefix } => run_ids(&prefix, &mut io::stdout().lock()),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Merge an optional config file with command-line flags.
fn resolve_config(
    path: Option<&Path>,
    keys: Vec<String>,
    verbose: bool,
    preserve_unicode: bool,
    progress_interval: Option<u64>,
) -> Result<BuildConfig> {
    let mut config = match path {
        Some(path) => BuildConfig::read_from(path)
            .with_context(|| format!("failed to load build config {}", path.display()))?,
        None => BuildConfig::new(Vec::<String>::new()),
    };

    if !keys.is_empty() {
        config.keys = keys;
    }
    config.verbose |= verbose;
    if preserve_unicode {
        config.normalization = TextNormalization::Preserve;
    }
    if let Some(interval) = progress_interval {
        config.progress_interval = interval;
    }

    config.validate().context("no fields to index (use --key or --config)")?;
    Ok(config)
}

fn run_build(source: &Path, prefix: &Path, config: BuildConfig) -> Result<()> {
    let summary = IndexBuilder::new(config)
        .build(source, prefix)
        .with_context(|| format!("failed to build index from {}", source.display()))?;

    tracing::info!(
        path = %summary.path.display(),
        documents = summary.documents,
        index_bytes = summary.index_bytes,
        data_bytes = summary.data_bytes,
        "index built"
    );
    Ok(())
}

fn open_store(prefix: &Path) -> Result<CorpusStore> {
    CorpusStore::open(prefix).with_context(|| format!("failed to open index {}", prefix.display()))
}

fn run_get<W: Write>(prefix: &Path, keys: &[String], out: &mut W) -> Result<()> {
    let store = open_store(prefix)?;
    for key in keys {
        let doc = store
            .get(DocKey::parse(key))
            .with_context(|| format!("lookup of {:?} failed", key))?;
        writeln!(out, "{}", doc)?;
    }
    Ok(())
}

fn run_stat<W: Write>(prefix: &Path, out: &mut W) -> Result<()> {
    let store = open_store(prefix)?;
    writeln!(out, "path:        {}", store.path().display())?;
    writeln!(out, "documents:   {}", store.len())?;
    writeln!(out, "unique ids:  {}", store.unique_len())?;
    writeln!(out, "data offset: {}", store.data_offset())?;
    writeln!(out, "data bytes:  {}", store.data_len())?;
    Ok(())
}

fn run_ids<W: Write>(prefix: &Path, out: &mut W) -> Result<()> {
    let store = open_store(prefix)?;
    for id in store.ids() {
        writeln!(out, "{}", id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn built_corpus(dir: &TempDir) -> PathBuf {
        let source = dir.path().join("corpus.jsonl");
        std::fs::write(
            &source,
            "{\"id\":\"a\",\"title\":\"Héllo\",\"body\":[\"world\",\"wide\"]}\n{\"id\":\"b\",\"title\":\"Foo\",\"body\":[\"bar\"]}\n",
        )
        .unwrap();
        let prefix = dir.path().join("corpus");
        let config = BuildConfig::new(["title", "body"]);
        run_build(&source, &prefix, config).unwrap();
        prefix
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_flags() {
        let cli = Cli::try_parse_from([
            "corpus-store", "build", "in.jsonl", "out/c", "-k", "title", "--key", "body",
            "--progress-interval", "5", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Build { keys, progress_interval, .. } => {
                assert_eq!(keys, vec!["title", "body"]);
                assert_eq!(progress_interval, Some(5));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_resolve_config_flags_override_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("build.json");
        BuildConfig::new(["text"]).write_to(&path).unwrap();

        let from_file = resolve_config(Some(&path), vec![], false, false, None).unwrap();
        assert_eq!(from_file.keys, vec!["text"]);

        let overridden =
            resolve_config(Some(&path), vec!["title".into()], true, true, Some(0)).unwrap();
        assert_eq!(overridden.keys, vec!["title"]);
        assert!(overridden.verbose);
        assert_eq!(overridden.normalization, TextNormalization::Preserve);
        assert_eq!(overridden.progress_interval, 0);
    }

    #[test]
    fn test_resolve_config_requires_keys() {
        assert!(resolve_config(None, vec![], false, false, None).is_err());
    }

    #[test]
    fn test_get_by_id_and_ordinal() {
        let dir = TempDir::new().unwrap();
        let prefix = built_corpus(&dir);

        let mut out = Vec::new();
        run_get(&prefix, &["b".into(), "#0".into(), "id:a".into()], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Foo bar\nHello world wide\nHello world wide\n"
        );

        let mut out = Vec::new();
        assert!(run_get(&prefix, &["#2".into()], &mut out).is_err());
    }

    #[test]
    fn test_stat_and_ids() {
        let dir = TempDir::new().unwrap();
        let prefix = built_corpus(&dir);

        let mut out = Vec::new();
        run_stat(&prefix, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("documents:   2"));
        assert!(text.contains("data bytes:  23"));

        let mut out = Vec::new();
        run_ids(&prefix, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\nb\n");
    }
}
