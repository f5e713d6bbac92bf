//! sourcewell CLI, the main entry point.
//!
//! Commands:
//! - `serve`   Start the HTTP gateway
//! - `ask`     Answer one question from the command line
//! - `config`  Print, locate or validate configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sourcewell_core::overrides::RetrievalMode;

mod commands;

#[derive(Parser)]
#[command(
    name = "sourcewell",
    about = "sourcewell: grounded chat and Q&A over your documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.sourcewell/config.toml)
    #[arg(short, long, global = true, env = "SOURCEWELL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question and print the grounded answer
    Ask {
        question: String,

        /// Number of documents to retrieve
        #[arg(short, long, default_value_t = 3)]
        top: usize,

        /// Retrieval mode: text, vectors or hybrid
        #[arg(short, long, default_value = "hybrid")]
        mode: RetrievalMode,

        /// Exclude documents of this category
        #[arg(long)]
        exclude_category: Option<String>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as TOML
    Default,
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask {
            question,
            top,
            mode,
            exclude_category,
            json,
        } => {
            let options = commands::ask::AskOptions {
                top,
                mode,
                exclude_category,
                json,
            };
            commands::ask::run(config_path, &question, options).await?
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Default) {
            ConfigAction::Default => commands::config_cmd::print_default(),
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path),
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
        },
    }

    Ok(())
}
