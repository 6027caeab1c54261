//! # Docdeck
//!
//! Headless driver for the document-editing core. Opens files through the
//! same path an IDE shell would use, waits for their syntax modules, and
//! prints what the tab bar would show.
//!
//! ## Quick Start
//!
//! ```bash
//! # Summarize a few files
//! cargo run -- src/main.rs Cargo.toml
//!
//! # With debug logging
//! cargo run -- -vv src/main.rs
//!
//! # File types with syntax support
//! cargo run -- --languages
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use docdeck_core::{Config, Workbench};
use docdeck_syntax::SyntaxLoader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Docdeck - open documents and report their editing state
#[derive(Parser, Debug)]
#[command(name = "docdeck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files to open, in tab order
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// How long to wait for syntax modules, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    syntax_timeout: u64,

    /// List the file types with syntax support and exit
    #[arg(long)]
    languages: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Docdeck v{}", env!("CARGO_PKG_VERSION"));

    if args.languages {
        println!("{}", language_list(&SyntaxLoader::with_builtin()));
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load(),
    };

    let mut workbench = Workbench::local(&config);
    for file in &args.files {
        workbench
            .open_file(&file.display().to_string())
            .await
            .context("Failed to mount document")?;
    }

    settle_syntax(&mut workbench, Duration::from_millis(args.syntax_timeout)).await;

    for line in summary(&workbench) {
        println!("{line}");
    }

    workbench.close_project();
    Ok(())
}

/// Applies surface events until no syntax load is in flight or the
/// timeout passes. Documents still loading stay plain text.
async fn settle_syntax(workbench: &mut Workbench, timeout: Duration) {
    let pending = |wb: &Workbench| {
        wb.cache()
            .paths()
            .into_iter()
            .any(|p| wb.cache().get(p).is_some_and(|e| e.has_pending_syntax()))
    };

    let settle = async {
        while pending(workbench) {
            if workbench.next_event().await.is_none() {
                break;
            }
        }
    };

    if tokio::time::timeout(timeout, settle).await.is_err() {
        tracing::warn!("Syntax loading did not finish within {:?}", timeout);
    }
    workbench.process_pending();
}

/// Space-separated file-type tokens the loader can highlight.
fn language_list(loader: &SyntaxLoader) -> String {
    loader.tokens().join(" ")
}

/// One line per tab: active marker, name, file type, lines, syntax, and
/// highlight span count.
fn summary(workbench: &Workbench) -> Vec<String> {
    let active = workbench.tabs().active_path();

    workbench
        .tabs()
        .tabs()
        .iter()
        .map(|tab| {
            let marker = if Some(tab.path.as_str()) == active { '*' } else { ' ' };
            let token: &str = if tab.file_type_token.is_empty() {
                "-"
            } else {
                &tab.file_type_token
            };
            let engine = workbench.cache().get(&tab.path).map(|e| e.instance());
            let lines = engine.map_or_else(|| tab.content.lines().count(), |e| e.len_lines());
            let syntax = engine.and_then(|e| e.syntax_name()).unwrap_or("plain");
            let spans = engine.map_or(0, |e| e.highlights().len());

            format!(
                "{marker} {:<24} {:<6} {:>6} lines  {:<10} {} spans",
                tab.display_name, token, lines, syntax, spans
            )
        })
        .collect()
}
