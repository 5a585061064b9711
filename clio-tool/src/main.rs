//! Clio Tool - CLI for building and inspecting inverted indexes
//!
//! # Commands
//!
//! - `build` - Build an index directory from pre-tokenized JSONL documents
//! - `score` - Build a quantized score index (BM25 or query likelihood)
//! - `postings` - Print a term's posting list, optionally scored or titled
//! - `info` - Display index properties
//! - `search` - Rank documents for a query over a quantized score index
//!
//! # Examples
//!
//! ```bash
//! clio-tool build -i ./idx -d corpus.jsonl
//! clio-tool score -i ./idx -s bm25 -b 8
//! clio-tool postings -i ./idx --titles retrieval
//! clio-tool search -i ./idx -k 10 compressed posting lists
//! ```
//!
//! Each corpus line is a JSON object: `{"title": "...", "terms": ["...", ...]}`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use clio_core::{
    CodecKind, IndexBuilder, InvertedIndexView, MmapSource, ScoreBuildProgress, ScorerKind,
    score_index,
};

#[derive(Parser)]
#[command(name = "clio-tool")]
#[command(version, about = "CLI for clio index management")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index directory from a JSONL corpus
    Build {
        /// Path to the index directory
        #[arg(short, long)]
        index: PathBuf,

        /// Path to JSONL documents file (omit if using --stdin)
        #[arg(short, long, required_unless_present = "stdin")]
        documents: Option<PathBuf>,

        /// Read documents from stdin instead of a file
        #[arg(long, default_value = "false")]
        stdin: bool,

        /// Postings per skip block
        #[arg(short = 'B', long, default_value = "64")]
        skip_block_size: u32,

        /// Posting blob codec: varbyte or streamvbyte
        #[arg(short, long, default_value = "varbyte")]
        codec: String,

        /// Log progress every N documents (0 to disable)
        #[arg(short, long, default_value = "100000")]
        progress: usize,
    },

    /// Build a quantized score index
    Score {
        /// Path to the index directory
        #[arg(short, long)]
        index: PathBuf,

        /// Scoring function: bm25 or ql
        #[arg(short, long, default_value = "bm25")]
        scorer: String,

        /// Quantization bit width
        #[arg(short, long, default_value = "8")]
        bits: u32,

        /// Global max score; skips the pre-scan pass when given
        #[arg(short, long)]
        max: Option<f64>,
    },

    /// Print a term's posting list
    Postings {
        /// Path to the index directory
        #[arg(short, long)]
        index: PathBuf,

        /// Print document titles alongside ids
        #[arg(short, long, default_value = "false")]
        titles: bool,

        /// Print quantized scores from the named score index instead of frequencies
        #[arg(short, long)]
        score: Option<String>,

        /// Only print the number of postings
        #[arg(short, long, default_value = "false")]
        count: bool,

        /// Terms to look up
        #[arg(required = true)]
        terms: Vec<String>,
    },

    /// Show index info
    Info {
        /// Path to the index directory
        #[arg(short, long)]
        index: PathBuf,
    },

    /// Rank documents for a query (term-at-a-time over quantized scores)
    Search {
        /// Path to the index directory
        #[arg(short, long)]
        index: PathBuf,

        /// Number of results
        #[arg(short, long, default_value = "10")]
        k: usize,

        /// Score index to use; defaults to the index's default
        #[arg(short, long)]
        score: Option<String>,

        /// Query terms
        #[arg(required = true)]
        terms: Vec<String>,
    },
}

fn build_index(
    index_path: PathBuf,
    documents: Option<PathBuf>,
    use_stdin: bool,
    skip_block_size: u32,
    codec: String,
    progress: usize,
) -> Result<()> {
    let codec = CodecKind::from_name(&codec)
        .map_err(|_| anyhow::anyhow!("invalid codec '{}': use varbyte or streamvbyte", codec))?;
    let mut builder = IndexBuilder::with_options(skip_block_size, codec);

    let reader: Box<dyn BufRead> = if use_stdin {
        info!("reading documents from stdin");
        Box::new(BufReader::new(io::stdin()))
    } else if let Some(path) = documents {
        info!("reading documents from {:?}", path);
        let file =
            File::open(&path).with_context(|| format!("failed to open corpus: {:?}", path))?;
        Box::new(BufReader::new(file))
    } else {
        bail!("either --documents or --stdin must be specified");
    };

    #[derive(serde::Deserialize)]
    struct CorpusDoc {
        title: String,
        terms: Vec<String>,
    }

    let mut count = 0usize;
    let mut errors = 0usize;
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: CorpusDoc = match serde_json::from_str(&line) {
            Ok(d) => d,
            Err(e) => {
                if errors < 10 {
                    tracing::warn!("failed to parse document at line {}: {}", line_num + 1, e);
                }
                errors += 1;
                continue;
            }
        };
        builder.add_document(&doc.title, &doc.terms);
        count += 1;
        if progress > 0 && count % progress == 0 {
            info!("progress: {} documents, {} terms", count, builder.term_count());
        }
    }
    if errors > 0 {
        tracing::warn!("skipped {} documents due to parse errors", errors);
    }

    builder.write_to(&index_path)?;
    info!(
        "indexed {} documents, {} terms into {:?}",
        count,
        builder.term_count(),
        index_path
    );
    Ok(())
}

fn build_scores(index_path: PathBuf, scorer: String, bits: u32, max: Option<f64>) -> Result<()> {
    let kind = ScorerKind::from_name(&scorer)
        .ok_or_else(|| anyhow::anyhow!("unknown scorer '{}': use bm25 or ql", scorer))?;

    // Map only the core files: score tuples may not exist yet.
    let source = MmapSource::open_with_scores(&index_path, &[])?;
    let index = InvertedIndexView::new(&source)?;

    let mut last_reported = 0usize;
    let mut on_progress = |p: ScoreBuildProgress| {
        let done = p.term_id as usize + 1;
        if done * 10 / p.term_count > last_reported {
            last_reported = done * 10 / p.term_count;
            info!("scored {}/{} terms", done, p.term_count);
        }
    };
    score_index(&index, &index_path, kind, bits, max, Some(&mut on_progress))?;
    info!("wrote {}.scores to {:?}", kind.name(), index_path);
    Ok(())
}

fn print_postings(
    index_path: PathBuf,
    terms: Vec<String>,
    titles: bool,
    score: Option<String>,
    count: bool,
) -> Result<()> {
    let source = MmapSource::open(&index_path)?;
    let index = InvertedIndexView::new(&source)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if count {
        let mut total = 0usize;
        for term in &terms {
            total += index
                .term_id(term)
                .map(|id| index.tdf(id).map(|n| n as usize))
                .transpose()?
                .unwrap_or(0);
        }
        writeln!(out, "{}", total)?;
        return Ok(());
    }

    for term in &terms {
        let postings = match &score {
            Some(name) => match index.term_id(term) {
                Some(id) => index.scored_postings_named(id, name)?,
                None => continue,
            },
            None => index.postings_for(term)?,
        };
        for posting in postings {
            let posting = posting?;
            write!(out, "{}\t", posting.document)?;
            if titles {
                write!(out, "{}\t", index.titles().key_at(posting.document as usize)?)?;
            }
            writeln!(out, "{}", posting.payload)?;
        }
    }
    Ok(())
}

fn show_info(index_path: PathBuf) -> Result<()> {
    let source = MmapSource::open(&index_path)?;
    let index = InvertedIndexView::new(&source)?;

    println!("Index: {:?}", index_path);
    println!("Documents: {}", index.collection_size());
    println!("Terms: {}", index.term_count());
    println!("Occurrences: {}", index.occurrences_count());
    println!("Avg document size: {:.2}", index.avg_document_size());
    println!("Skip block size: {}", index.skip_block_size());
    println!("Codec: {}", index.codec().name());
    let names = index.score_names();
    if names.is_empty() {
        println!("Score indexes: none");
    } else {
        println!("Score indexes: {}", names.join(", "));
    }
    Ok(())
}

fn search(
    index_path: PathBuf,
    terms: Vec<String>,
    k: usize,
    score: Option<String>,
) -> Result<()> {
    let source = MmapSource::open(&index_path)?;
    let index = InvertedIndexView::new(&source)?;
    let score_name = match score {
        Some(name) => name,
        None => index
            .default_score_name()
            .context("no score index built; run `clio-tool score` first")?,
    };

    // Term-at-a-time: sum quantized scores per document.
    let mut accumulators: HashMap<u32, u64> = HashMap::new();
    for term in &terms {
        let Some(term_id) = index.term_id(term) else { continue };
        for posting in index.scored_postings_named(term_id, &score_name)? {
            let posting = posting?;
            *accumulators.entry(posting.document).or_insert(0) += u64::from(posting.payload);
        }
    }

    let mut ranked: Vec<(u32, u64)> = accumulators.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (rank, (document, score)) in ranked.iter().enumerate() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            rank + 1,
            document,
            index.titles().key_at(*document as usize)?,
            score
        )?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clio_tool=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { index, documents, stdin, skip_block_size, codec, progress } => {
            build_index(index, documents, stdin, skip_block_size, codec, progress)?;
        }
        Commands::Score { index, scorer, bits, max } => {
            build_scores(index, scorer, bits, max)?;
        }
        Commands::Postings { index, titles, score, count, terms } => {
            print_postings(index, terms, titles, score, count)?;
        }
        Commands::Info { index } => {
            show_info(index)?;
        }
        Commands::Search { index, k, score, terms } => {
            search(index, terms, k, score)?;
        }
    }

    Ok(())
}
