use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create global config instead of project config"
        )]
        global: bool,
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show {
        #[arg(long, help = "Show which files the configuration was read from")]
        source: bool,
    },
    #[command(about = "Show configuration file paths")]
    Path {
        #[arg(long, help = "Show all possible config paths")]
        all: bool,
    },
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, formatter.as_ref()),
        ConfigCommand::Show { source } => handle_show(source, format),
        ConfigCommand::Path { all } => handle_path(all),
    }
}

fn handle_init(global: bool, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let (scope, config_path) = if global {
        (
            "global",
            Config::global_path()
                .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?,
        )
    } else {
        (
            "project",
            Config::project_path()
                .ok_or_else(|| anyhow::anyhow!("could not determine project directory"))?,
        )
    };

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} config already exists at: {}\nUse --force to overwrite.",
            scope,
            config_path.display()
        );
    }

    Config::default()
        .save_to(&config_path)
        .with_context(|| format!("failed to create {scope} config"))?;
    println!(
        "{}",
        formatter.format_message(&format!(
            "Created {} config at: {}",
            scope,
            config_path.display()
        ))
    );

    Ok(())
}

fn handle_show(show_source: bool, format: OutputFormat) -> Result<()> {
    let resolved = Config::load()?;

    if format == OutputFormat::Json {
        if show_source {
            let output = serde_json::json!({
                "config": resolved.config,
                "project_path": resolved.project_path,
                "global_path": resolved.global_path,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&resolved.config)?);
        }
        return Ok(());
    }

    if show_source {
        match resolved.project_path {
            Some(ref path) => println!("# Project config: {}", path.display()),
            None => println!("# Project config: (none)"),
        }
        match resolved.global_path {
            Some(ref path) => println!("# Global config: {}", path.display()),
            None => println!("# Global config: (none)"),
        }
        println!("# Environment overrides: DOCQA_* variables and .env");
        println!();
    }

    let rendered =
        toml::to_string_pretty(&resolved.config).context("failed to render configuration")?;
    if format == OutputFormat::Markdown {
        println!("```toml\n{}```", rendered);
    } else {
        print!("{}", rendered);
    }

    Ok(())
}

fn handle_path(show_all: bool) -> Result<()> {
    let project_path = Config::project_path();
    let global_path = Config::global_path();

    println!("Configuration paths:");
    println!();

    for (label, path) in [("Project", project_path), ("Global", global_path)] {
        if let Some(path) = path {
            if path.exists() {
                println!("{label} config (active): {}", path.display());
            } else if show_all {
                println!("{label} config (would be): {}", path.display());
            }
        }
    }

    if show_all {
        if let Some(dir) = Config::models_dir() {
            println!("Models directory: {}", dir.display());
        }
        if let Ok(cwd) = std::env::current_dir() {
            let env_path = cwd.join(".env");
            if env_path.exists() {
                println!(".env file (active): {}", env_path.display());
            } else {
                println!(".env file (would be): {}", env_path.display());
            }
        }
    }

    Ok(())
}
