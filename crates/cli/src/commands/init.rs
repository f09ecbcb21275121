//! `toolchat init`: Write a default config file.

use std::path::Path;

use toolchat_config::AppConfig;

pub fn run(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or delete it and re-run init.");
        return Ok(());
    }

    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        std::fs::create_dir_all(dir)?;
        println!("Created config directory: {}", dir.display());
    }

    std::fs::write(config_path, AppConfig::default_toml())?;
    println!("Created config at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set TOOLCHAT_API_KEY (or add api_key to the config)");
    println!("  2. Run: toolchat chat");

    Ok(())
}
