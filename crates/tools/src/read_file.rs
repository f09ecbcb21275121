//! `read-file`: return a file's content as text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use toolchat_core::error::ToolError;
use toolchat_core::tool::{ParamSpec, ToolDescriptor, ToolOutput, TypedTool};
use tracing::debug;

use crate::policy::PathPolicy;

pub const NAME: &str = "read-file";

#[derive(Debug, Deserialize)]
pub struct ReadFileArgs {
    #[serde(rename = "filePath")]
    pub file_path: String,
}

pub struct ReadFileTool {
    policy: Arc<PathPolicy>,
}

impl ReadFileTool {
    /// Create a read-file tool with no path restrictions.
    pub fn new() -> Self {
        Self::with_policy(Arc::new(PathPolicy::unrestricted()))
    }

    pub fn with_policy(policy: Arc<PathPolicy>) -> Self {
        Self { policy }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TypedTool for ReadFileTool {
    type Args = ReadFileArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            NAME,
            "Read a file from the filesystem and return its content as plain text.",
        )
        .param(ParamSpec::required("filePath", "The path to the file to read"))
    }

    async fn run(&self, args: ReadFileArgs) -> Result<ToolOutput, ToolError> {
        let path = self
            .policy
            .check(&args.file_path)
            .map_err(|e| ToolError::PermissionDenied {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        debug!(path = %path.display(), "Reading file");

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(ToolOutput::completed(content)),
            Err(e) => Ok(ToolOutput::failed(format!(
                "Failed to read file {}: {e}",
                args.file_path
            ))),
        }
    }
}
