mod ask;
mod config;
mod index;
mod status;

pub use ask::AskArgs;
pub use config::ConfigCommand;
pub use index::IndexArgs;

pub use ask::handle_ask;
pub use config::handle_config;
pub use index::handle_index;
pub use status::handle_status;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::models::Config;

/// Load layered configuration, then apply command-line directory overrides.
fn load_config(data_dir: Option<PathBuf>, index_dir: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::load()
        .context("failed to load configuration")?
        .config;
    if let Some(dir) = data_dir {
        config.storage.data_dir = dir;
    }
    if let Some(dir) = index_dir {
        config.storage.index_dir = dir;
    }
    Ok(config)
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
