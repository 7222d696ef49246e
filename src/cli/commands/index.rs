//! Index command implementation.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::{load_config, spinner};
use crate::cli::output::{IndexReport, get_formatter};
use crate::models::OutputFormat;
use crate::services::{BuildReport, IndexBuilder, create_embedder};
use crate::sources::DirectoryLoader;

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Directory to load documents from
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory to write the index to
    #[arg(long)]
    pub index_dir: Option<PathBuf>,
}

pub async fn handle_index(args: IndexArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = load_config(args.data_dir, args.index_dir)?;
    let formatter = get_formatter(format);

    if verbose {
        eprintln!("Data dir:  {}", config.storage.data_dir.display());
        eprintln!("Index dir: {}", config.storage.index_dir.display());
        eprintln!(
            "Chunking:  {} chars, {} overlap",
            config.chunking.chunk_size, config.chunking.chunk_overlap
        );
    }

    let pb = spinner("Building index...");
    let task_config = config.clone();
    let result = tokio::task::spawn_blocking(move || -> Result<BuildReport> {
        let embedder = create_embedder(&task_config).context("failed to load embedding model")?;
        let source = DirectoryLoader::new(&task_config.storage.data_dir, &task_config.loader)?;
        let builder = IndexBuilder::from_config(&task_config, embedder)?;
        builder.build(&source).context("index build failed")
    })
    .await
    .context("index task failed")?;
    pb.finish_and_clear();
    let report = result?;

    let summary = IndexReport {
        location: config.storage.index_dir.display().to_string(),
        entries: report.index.len(),
        stats: report.stats,
    };
    print!("{}", formatter.format_index_report(&summary));

    if summary.entries == 0 {
        eprintln!();
        eprintln!(
            "Hint: no documents found. Add .{} files to {} and run again.",
            config.loader.extensions.join("/."),
            config.storage.data_dir.display()
        );
    }

    Ok(())
}
