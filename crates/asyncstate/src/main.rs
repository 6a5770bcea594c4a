mod commands;
mod config;
mod demo;

use std::path::PathBuf;

use anyhow::Result;
use asyncstate_ssr::ExecutionMode;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Settings};

/// asyncstate - Render components with async initial state and hydrate them
/// without loading twice
#[derive(Parser, Debug)]
#[command(name = "asyncstate")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the demo page server-side and print the HTML document
    Render {
        /// Write the document to this file instead of stdout
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Hydrate the demo page against a rendered document
    Hydrate {
        /// Rendered document to read (stdin when omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,
    },
    /// Render, then hydrate the result in-process
    Roundtrip,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber; stdout is reserved for output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "asyncstate=debug,asyncstate_ssr=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_settings(&cli.settings)?;

    let command = cli.command.unwrap_or(match config.mode {
        ExecutionMode::Server => Command::Render { out: None },
        ExecutionMode::Client => Command::Hydrate { input: None },
    });

    tracing::debug!(?command, mode = %config.mode, "Starting");

    match command {
        Command::Render { out } => {
            let html = commands::render(&config).await?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, html).await?;
                    tracing::info!(path = %path.display(), "Wrote document");
                }
                None => print!("{html}"),
            }
        }
        Command::Hydrate { input } => {
            let html = commands::read_document(input.as_deref()).await?;
            print_json(&commands::hydrate(&config, &html).await?)?;
        }
        Command::Roundtrip => {
            print_json(&commands::roundtrip(&config).await?)?;
        }
    }

    Ok(())
}

fn print_json(report: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
