//! `toolchat tools`: List the tools offered to the model.

use std::path::Path;

use anyhow::Context;
use toolchat_config::AppConfig;

pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_with_env(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let registry = toolchat_tools::registry_from_config(&config.tools);

    println!("Available tools ({}):\n", registry.len());
    for descriptor in registry.descriptors() {
        println!("  {}", descriptor.name);
        println!("    {}", descriptor.description);
        for param in &descriptor.params {
            let required = if param.required { "required" } else { "optional" };
            println!("    - {} ({required}): {}", param.name, param.description);
        }
        println!();
    }

    if config.tools.allowed_roots.is_empty() {
        println!("File access: unrestricted");
    } else {
        println!("File access limited to: {}", config.tools.allowed_roots.join(", "));
    }

    Ok(())
}
