//! Skimmer CLI - webpage summarisation
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use skimmer::{extract, fetch, render, Config, SummaryClient};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skimmer")]
#[command(author, version, about = "Summarise webpages with Gemini", long_about = None)]
struct Cli {
    /// Path to a config file (defaults to ./skimmer.toml, then ~/.config/skimmer/skimmer.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise a webpage by URL
    Summarise {
        /// URL to summarise
        url: String,
        /// Show raw extracted text instead of summary
        #[arg(long)]
        raw: bool,
        /// Save the summary as a markdown file
        #[arg(long)]
        save: bool,
        /// Directory to save into (implies --save)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Extract readable text from a local HTML file
    Extract {
        /// HTML file to read
        file: PathBuf,
        /// URL to report as the page source
        #[arg(long, default_value = "")]
        url: String,
    },
    /// List models available for content generation
    Models,
    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "skimmer=debug",
        _ => "skimmer=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.context("failed to load configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Summarise {
            url,
            raw,
            save,
            out_dir,
        } => {
            let config = load_config(cli.config.as_ref())?;
            println!("Fetching: {}", url);

            let content = fetch::fetch_content(&url, &config.fetch).await?;
            let title = if content.title.is_empty() {
                "No title"
            } else {
                content.title.as_str()
            };

            if raw {
                // Just show raw extracted text
                println!("\n=== {} ===\n", title.bold());
                println!("{}", content.text);
                println!(
                    "\n--- Extracted {} characters ---",
                    content.text.chars().count()
                );
                return Ok(());
            }

            println!(
                "Summarising {} characters...\n",
                content.text.chars().count()
            );
            let client = SummaryClient::from_config(&config.agent)?;
            let summary = client.summarize(&content.text, config.api_key()).await?;
            let model = client.resolved_model();

            println!("=== {} ===\n", title.bold());
            println!("{}", summary.trim());
            if let Some(model) = &model {
                println!("\n{}", format!("(via {})", model).dimmed());
            }

            if save || out_dir.is_some() {
                let now = chrono::Utc::now();
                let document = render::markdown_document(&content, &summary, model.as_deref(), now);
                let dir = out_dir.unwrap_or_else(|| PathBuf::from("."));
                let path = dir.join(render::file_name(&content.title, now.date_naive()));
                std::fs::write(&path, document)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("\n{} {}", "Saved:".green(), path.display());
            }
        }
        Commands::Extract { file, url } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let content = extract::extract_html(&html, &url);
            if !content.title.is_empty() {
                println!("=== {} ===\n", content.title.bold());
            }
            println!("{}", content.text);
        }
        Commands::Models => {
            let config = load_config(cli.config.as_ref())?;
            let client = SummaryClient::from_config(&config.agent)?;
            let models = client.list_generation_models(config.api_key()).await?;

            if models.is_empty() {
                println!("No models support content generation for this key.");
            } else {
                println!("Models supporting content generation ({}):\n", models.len());
                for model in models {
                    let marker = if config.agent.models.contains(&model) {
                        "*".green()
                    } else {
                        " ".normal()
                    };
                    println!(" {} {}", marker, model);
                }
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "skimmer",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
