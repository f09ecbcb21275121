//! `toolchat chat`: Interactive or single-message chat mode.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use toolchat_agent::{Orchestrator, Session};
use toolchat_config::AppConfig;
use tracing::warn;

pub async fn run(config_path: &Path, message: Option<String>) -> anyhow::Result<()> {
    let config = AppConfig::load_with_env(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Fail early with setup guidance
    if !config.has_api_key() && config.provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in .env):");
        eprintln!("    TOOLCHAT_API_KEY=sk-...          (generic)");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...  (OpenRouter)");
        eprintln!("    OPENAI_API_KEY=sk-...            (OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", config_path.display());
        eprintln!();
        anyhow::bail!("No API key found. See above for setup instructions.");
    }

    let gateway = toolchat_providers::build_gateway(&config)?;

    if config.tools.allowed_roots.is_empty() {
        warn!("File tools are unrestricted; set tools.allowed_roots to confine them");
    }
    let tools = Arc::new(toolchat_tools::registry_from_config(&config.tools));
    let tool_names = tools.names().join(", ");

    let orchestrator = Arc::new(Orchestrator::from_config(gateway, tools, &config));
    let mut session = Session::new(orchestrator);

    if let Some(msg) = message {
        // Single message mode
        let response = session.submit_user_line(&msg).await?;
        println!("{response}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  toolchat interactive mode");
    println!();
    println!("  Provider:  {}", config.provider);
    println!("  Model:     {}", config.model);
    println!("  Tools:     {tool_names}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        // EOF
        let Some(line) = line else {
            println!();
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        eprint!("  ...");
        match session.submit_user_line(input).await {
            Ok(response) => {
                eprint!("\r     \r");
                println!();
                for line in response.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!("  Goodbye!");
    Ok(())
}
