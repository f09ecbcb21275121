//! Built-in tool implementations for toolchat.
//!
//! Tools give the model the ability to explore and change the local
//! workspace (`read-file`, `read-directory`, `write-file`) and to check
//! network reachability (`ping`).

pub mod ping;
pub mod policy;
pub mod read_directory;
pub mod read_file;
pub mod write_file;

use std::sync::Arc;
use std::time::Duration;

use toolchat_config::ToolsConfig;
use toolchat_core::tool::ToolRegistry;

pub use ping::{PingReport, PingTool, Pinger, SystemPinger};
pub use policy::{PathPolicy, PathPolicyError};
pub use read_directory::ReadDirectoryTool;
pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;

/// Create a registry with all built-in tools, unrestricted paths and the
/// system `ping` binary.
pub fn default_registry() -> ToolRegistry {
    build_registry(
        Arc::new(PathPolicy::unrestricted()),
        Arc::new(SystemPinger::default()),
    )
}

/// Create the built-in registry from configuration.
pub fn registry_from_config(config: &ToolsConfig) -> ToolRegistry {
    let policy = PathPolicy::new(&config.allowed_roots, &config.forbidden_paths);
    let pinger = SystemPinger::new(
        config.ping.command.clone(),
        Duration::from_secs(config.ping.timeout_secs),
    );
    build_registry(Arc::new(policy), Arc::new(pinger))
}

/// Register the built-in tools in catalog order.
pub fn build_registry(policy: Arc<PathPolicy>, pinger: Arc<dyn Pinger>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ReadFileTool::with_policy(policy.clone())));
    registry.register(Box::new(WriteFileTool::with_policy(policy.clone())));
    registry.register(Box::new(ReadDirectoryTool::with_policy(policy)));
    registry.register(Box::new(PingTool::new(pinger)));
    registry
}
