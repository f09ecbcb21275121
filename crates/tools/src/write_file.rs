//! `write-file`: create or overwrite a text file.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use toolchat_core::error::ToolError;
use toolchat_core::tool::{ParamSpec, ToolDescriptor, ToolOutput, TypedTool};
use tracing::debug;

use crate::policy::PathPolicy;

pub const NAME: &str = "write-file";

#[derive(Debug, Deserialize)]
pub struct WriteFileArgs {
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub content: String,
}

pub struct WriteFileTool {
    policy: Arc<PathPolicy>,
}

impl WriteFileTool {
    /// Create a write-file tool with no path restrictions.
    pub fn new() -> Self {
        Self::with_policy(Arc::new(PathPolicy::unrestricted()))
    }

    pub fn with_policy(policy: Arc<PathPolicy>) -> Self {
        Self { policy }
    }
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TypedTool for WriteFileTool {
    type Args = WriteFileArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            NAME,
            "Write content to a file on the filesystem. Creates the file if it does not exist, \
             or overwrites it if it does.",
        )
        .param(ParamSpec::required("filePath", "The path to the file to write"))
        .param(ParamSpec::required("content", "The content to write to the file"))
    }

    async fn run(&self, args: WriteFileArgs) -> Result<ToolOutput, ToolError> {
        let path = self
            .policy
            .check(&args.file_path)
            .map_err(|e| ToolError::PermissionDenied {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolOutput::failed(format!(
                "Failed to create directory for {}: {e}",
                args.file_path
            )));
        }

        debug!(path = %path.display(), bytes = args.content.len(), "Writing file");

        match tokio::fs::write(&path, &args.content).await {
            Ok(()) => Ok(
                ToolOutput::completed(format!("{} was created", args.file_path))
                    .with_data(serde_json::json!({ "bytes": args.content.len() })),
            ),
            Err(e) => Ok(ToolOutput::failed(format!(
                "Failed to write file {}: {e}",
                args.file_path
            ))),
        }
    }
}
