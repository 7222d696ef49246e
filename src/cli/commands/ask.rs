use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

use super::{load_config, spinner};
use crate::cli::output::get_formatter;
use crate::models::{Answer, Config, OutputFormat};
use crate::services::{IndexOrigin, KnowledgeBase, MetricsStore, QueryOutcome, create_embedder};

#[derive(Debug, Args)]
pub struct AskArgs {
    /// Question to answer (quotes optional)
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,

    /// Number of passages to return
    #[arg(long, short = 'k')]
    pub top_k: Option<usize>,

    /// Show only the best passage, shortened, under a topic heading
    #[arg(long, short = 'b')]
    pub brief: bool,

    /// Directory to load documents from when the index must be built
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding the index
    #[arg(long)]
    pub index_dir: Option<PathBuf>,
}

pub async fn handle_ask(args: AskArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = load_config(args.data_dir, args.index_dir)?;
    let formatter = get_formatter(format);
    let question = args.question.join(" ");

    let k = if args.brief {
        1
    } else {
        args.top_k.unwrap_or(config.search.top_k as usize)
    };
    if k == 0 {
        anyhow::bail!("top_k must be at least 1");
    }

    if verbose {
        eprintln!("Question: \"{}\"", question.trim());
        eprintln!("  Top k: {k}");
        eprintln!("  Index: {}", config.storage.index_dir.display());
    }

    let pb = spinner("Loading index...");
    let task_config = config.clone();
    let task_question = question.clone();
    let result = tokio::task::spawn_blocking(move || -> Result<(Answer, u64)> {
        let embedder = create_embedder(&task_config).context("failed to load embedding model")?;
        let kb = KnowledgeBase::open(task_config, embedder).context("failed to open index")?;
        if let IndexOrigin::Built { stats } = kb.origin() {
            debug!(chunks = stats.chunks, "index built on startup");
        }

        let start_time = Instant::now();
        let answer = kb.answer_with_k(&task_question, k);
        let latency_ms = start_time.elapsed().as_millis() as u64;

        let outcome = match &answer {
            Ok(a) if a.is_found() => QueryOutcome::Found,
            Ok(_) => QueryOutcome::NoAnswer,
            Err(_) => QueryOutcome::Failed,
        };
        record_query(kb.config(), latency_ms, outcome);

        Ok((answer.context("failed to answer question")?, latency_ms))
    })
    .await
    .context("query task failed")?;
    pb.finish_and_clear();
    let (answer, latency_ms) = result?;

    if verbose {
        eprintln!("  Latency: {latency_ms}ms");
        eprintln!();
    }

    print!("{}", formatter.format_answer(&answer, args.brief));

    Ok(())
}

fn record_query(config: &Config, latency_ms: u64, outcome: QueryOutcome) {
    if !config.metrics.enabled {
        return;
    }
    let Some(path) = config.metrics_path() else {
        return;
    };
    match MetricsStore::open(&path) {
        Ok(store) => store.record(latency_ms, outcome),
        Err(e) => debug!(error = %e, "metrics store unavailable"),
    }
}
