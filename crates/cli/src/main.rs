//! toolchat CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Interactive chat or single-message mode
//! - `tools`: List the tools the model can call
//! - `init`: Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use toolchat_config::AppConfig;
use tracing::warn;

mod commands;

#[derive(Parser)]
#[command(
    name = "toolchat",
    about = "toolchat: chat with a model that can read, write and ping",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.toolchat/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the model
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List available tools
    Tools,

    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Loaded before the subscriber so RUST_LOG may come from .env
    let dotenv = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only answers
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(problem) = dotenv_warning(&dotenv) {
        warn!(error = %problem, "Ignoring unreadable .env file");
    }

    let config_path = cli
        .config
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    match cli.command {
        Commands::Chat { message } => commands::chat::run(&config_path, message).await?,
        Commands::Tools => commands::tools::run(&config_path)?,
        Commands::Init => commands::init::run(&config_path)?,
    }

    Ok(())
}

/// A missing .env is normal; anything else is worth a warning.
fn dotenv_warning<T>(result: &Result<T, dotenvy::Error>) -> Option<String> {
    match result {
        Err(e) if !e.not_found() => Some(e.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dotenv_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let result = dotenvy::from_path(dir.path().join(".env"));
        assert!(dotenv_warning(&result).is_none());
    }

    #[test]
    fn malformed_dotenv_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "TOOLCHAT_TEST_BROKEN=\"unterminated\n").unwrap();

        let result = dotenvy::from_path(&path);
        assert!(result.is_err());
        assert!(dotenv_warning(&result).is_some());
    }

    #[test]
    fn loaded_dotenv_is_silent() {
        let result: Result<PathBuf, dotenvy::Error> = Ok(PathBuf::from(".env"));
        assert!(dotenv_warning(&result).is_none());
    }
}
