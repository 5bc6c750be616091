//! CLI for the counselling assistant.
//!
//! Subcommands:
//!  - `index`  : load interview CSVs, fit the TF-IDF index and persist it as JSON.
//!  - `query`  : run one query through the retrieval policy and list candidates.
//!  - `record` : inspect a corpus record and its most similar neighbours.
//!  - `chat`   : interactive conversation (moderation + corpus + generative fallback).
//!
//! Usage examples:
//!  counsel index --source maestros=Entrevistas_maestros.csv --out index.json
//!  counsel query --index index.json --query "¿Qué es Machine Learning?"

use std::collections::BTreeMap;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

mod chat;
mod sources;

use crate::sources::{parse_source_spec, CorpusArgs};
use counsel::policy::format_corpus_answer;
use counsel::utils::text::snippet;
use counsel::{
    build_from_sources, open_knowledge_base, save_knowledge_json, Assistant, CorpusHandle,
    CorpusSource, Decision, KnowledgeBase, MatchResult, RetrievalPolicy,
};

/// CLI entrypoint.
#[derive(Parser)]
#[command(
    name = "counsel",
    about = "Corpus-first counselling assistant: TF-IDF retrieval over interview answers",
    version
)]
struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from CSV sources and write it to disk.
    Index(IndexArgs),

    /// Query the corpus and show the retrieval decision.
    Query(QueryArgs),

    /// Inspect a record by corpus position.
    Record(RecordArgs),

    /// Start an interactive conversation.
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
struct IndexArgs {
    /// Path to write the index JSON to.
    #[arg(long, short = 'o', value_name = "PATH")]
    out: PathBuf,

    /// CSV source as `name=path` (repeatable). Defaults to the configured sources.
    #[arg(long = "source", value_name = "NAME=PATH", value_parser = parse_source_spec)]
    sources: Vec<CorpusSource>,

    /// Configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Query string to search for.
    #[arg(short, long)]
    query: String,

    #[command(flatten)]
    corpus: CorpusArgs,

    /// Number of candidates to list.
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// Override the configured acceptance threshold (match iff score > threshold).
    #[arg(long)]
    threshold: Option<f32>,

    /// Output results as JSON to stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Corpus position (0-based) of the record to inspect.
    #[arg(long)]
    position: usize,

    #[command(flatten)]
    corpus: CorpusArgs,

    /// Number of similar records to list.
    #[arg(long, default_value_t = 5)]
    links_k: usize,

    /// Output as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ChatArgs {
    #[command(flatten)]
    corpus: CorpusArgs,
}

/// Application entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();
    counsel::utils::logging::init(if cli.verbose { "debug" } else { "info" });

    match cli.command {
        Commands::Index(args) => run_index(args),
        Commands::Query(args) => run_query(args),
        Commands::Record(args) => run_record(args),
        Commands::Chat(args) => run_chat(args),
    }
}

fn run_index(args: IndexArgs) -> Result<()> {
    let config = counsel::config::load_config(args.config.as_deref())
        .context("loading configuration")?;
    let start = Instant::now();
    let base = if args.sources.is_empty() {
        let mut config = config;
        config.index_path = None;
        open_knowledge_base(&config).context("building index from configured corpus")?
    } else {
        build_from_sources(&args.sources).context("building index from --source files")?
    };
    save_knowledge_json(&base, &args.out)
        .with_context(|| format!("writing index to {}", args.out.display()))?;

    println!(
        "Indexed {} records ({} terms) in {:?}",
        base.len(),
        base.index().vectorizer().vocabulary_len(),
        start.elapsed()
    );
    for (label, count) in base.label_counts() {
        println!("  {label}: {count}");
    }
    println!("Saved index to {}", args.out.display());
    Ok(())
}

fn match_json(m: &MatchResult, rank: Option<usize>) -> serde_json::Value {
    json!({
        "rank": rank,
        "position": m.position,
        "score": m.score,
        "source_label": m.record.source_label,
        "question": m.record.question,
        "answer": m.record.answer,
    })
}

fn run_query(args: QueryArgs) -> Result<()> {
    let config = args.corpus.load_config()?;
    let base = args.corpus.load_knowledge_base(&config)?;
    let policy = args
        .threshold
        .map(RetrievalPolicy::new)
        .unwrap_or_else(|| config.policy());

    let decision = policy.decide(base.best_match(&args.query));
    let candidates = base.search(&args.query, args.top_k);

    if args.json {
        let (label, best, answer) = match &decision {
            Decision::Matched(m) => (
                "matched",
                Some(match_json(m, None)),
                Some(format_corpus_answer(m)),
            ),
            Decision::Unmatched { .. } => ("unmatched", None, None),
        };
        let best_score = match &decision {
            Decision::Matched(m) => Some(m.score),
            Decision::Unmatched { best_score } => *best_score,
        };
        let out = json!({
            "query": args.query,
            "threshold": policy.threshold,
            "decision": label,
            "best_score": best_score,
            "best": best,
            "answer": answer,
            "results": candidates
                .iter()
                .enumerate()
                .map(|(i, m)| match_json(m, Some(i + 1)))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    match &decision {
        Decision::Matched(m) => {
            println!(
                "MATCHED (score {:.3} > threshold {:.3})\n",
                m.score, policy.threshold
            );
            println!("{}", format_corpus_answer(m));
        }
        Decision::Unmatched { best_score } => {
            let best = best_score.map_or_else(|| "none".to_string(), |s| format!("{s:.3}"));
            println!(
                "UNMATCHED (best score {best}, threshold {:.3}): a conversation would defer to the generative fallback",
                policy.threshold
            );
        }
    }

    if candidates.is_empty() {
        println!("\nNo candidates share vocabulary with the query.");
    } else {
        println!("\nTop {} candidates for {:?}:", args.top_k, args.query);
        for (i, m) in candidates.iter().enumerate() {
            println!(
                "{}. position={} score={:.4} [{}] {} -> {}",
                i + 1,
                m.position,
                m.score,
                m.record.source_label,
                snippet(&m.record.question, 80),
                snippet(&m.record.answer, 120)
            );
        }
    }
    Ok(())
}

fn run_record(args: RecordArgs) -> Result<()> {
    let config = args.corpus.load_config()?;
    let base = args.corpus.load_knowledge_base(&config)?;

    let record = base.get(args.position).ok_or_else(|| {
        anyhow::anyhow!(
            "position {} out of range (corpus holds {} records)",
            args.position,
            base.len()
        )
    })?;
    let similar = base
        .similar_records(args.position, args.links_k)
        .unwrap_or_default();

    if args.json {
        let out = json!({
            "record": {
                "position": args.position,
                "source_label": record.source_label,
                "question": record.question,
                "answer": record.answer,
            },
            "similar_records": similar
                .iter()
                .enumerate()
                .map(|(i, m)| match_json(m, Some(i + 1)))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("position={}", args.position);
    println!("source_label={}", record.source_label);
    println!("question: {}", record.question);
    println!("answer: {}", record.answer);
    if similar.is_empty() {
        println!("\nNo similar records found.");
    } else {
        println!("\nSimilar records:");
        for m in &similar {
            println!(
                "  position={} score={:.4} [{}] {}",
                m.position,
                m.score,
                m.record.source_label,
                snippet(&m.record.answer, 120)
            );
        }
    }
    Ok(())
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let config = args.corpus.load_config()?;
    let base: KnowledgeBase = args.corpus.load_knowledge_base(&config)?;
    let counts: BTreeMap<String, usize> = base.label_counts();
    tracing::info!(records = base.len(), labels = counts.len(), "corpus loaded");

    let corpus = Arc::new(CorpusHandle::new(base));
    let assistant = Assistant::from_config(corpus, &config)
        .context("configuring remote services (is OPENAI_API_KEY set?)")?;

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let stdin = io::stdin();
    let stdout = BufWriter::new(io::stdout());
    runtime.block_on(chat::run_chat(&assistant, stdin.lock(), stdout))
}
