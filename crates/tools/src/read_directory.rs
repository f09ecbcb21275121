//! `read-directory`: best-effort, non-recursive directory listing.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use toolchat_core::error::ToolError;
use toolchat_core::tool::{ParamSpec, ToolDescriptor, ToolOutput, TypedTool};
use tracing::debug;

use crate::policy::PathPolicy;

pub const NAME: &str = "read-directory";

#[derive(Debug, Deserialize)]
pub struct ReadDirectoryArgs {
    #[serde(rename = "dirPath")]
    pub dir_path: String,
}

pub struct ReadDirectoryTool {
    policy: Arc<PathPolicy>,
}

impl ReadDirectoryTool {
    pub fn new() -> Self {
        Self::with_policy(Arc::new(PathPolicy::unrestricted()))
    }

    pub fn with_policy(policy: Arc<PathPolicy>) -> Self {
        Self { policy }
    }
}

impl Default for ReadDirectoryTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry names sorted by name; empty on any I/O failure.
async fn list_entries(path: &std::path::Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut dir = match tokio::fs::read_dir(path).await {
        Ok(dir) => dir,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Directory not readable");
            return names;
        }
    };

    loop {
        match dir.next_entry().await {
            Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
            Ok(None) => break,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Directory listing interrupted");
                return Vec::new();
            }
        }
    }

    names.sort();
    names
}

#[async_trait]
impl TypedTool for ReadDirectoryTool {
    type Args = ReadDirectoryArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            NAME,
            "Read a directory and return a list of file and folder names contained in it.",
        )
        .param(ParamSpec::required("dirPath", "The path to the directory to read"))
    }

    async fn run(&self, args: ReadDirectoryArgs) -> Result<ToolOutput, ToolError> {
        let path = self
            .policy
            .check(&args.dir_path)
            .map_err(|e| ToolError::PermissionDenied {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        let names = list_entries(&path).await;
        let output = serde_json::to_string(&names).map_err(|e| ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: e.to_string(),
        })?;

        Ok(ToolOutput::completed(output).with_data(serde_json::json!(names)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolchat_core::tool::{Tool, ToolStatus};

    #[tokio::test]
    async fn lists_files_and_folders_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src").join("nested.rs"), "").unwrap();

        let out = ReadDirectoryTool::new()
            .execute(serde_json::json!({ "dirPath": dir.path().to_str().unwrap() }))
            .await
            .unwrap();

        assert_eq!(out.status, ToolStatus::Completed);
        assert_eq!(out.output, r#"["a.rs","b.txt","src"]"#);
    }

    #[tokio::test]
    async fn missing_directory_is_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let out = ReadDirectoryTool::new()
            .execute(serde_json::json!({
                "dirPath": dir.path().join("does-not-exist").to_str().unwrap()
            }))
            .await
            .unwrap();

        assert_eq!(out.status, ToolStatus::Completed);
        assert_eq!(out.output, "[]");
    }

    #[tokio::test]
    async fn file_path_is_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();

        let out = ReadDirectoryTool::new()
            .execute(serde_json::json!({ "dirPath": file.to_str().unwrap() }))
            .await
            .unwrap();
        assert_eq!(out.output, "[]");
    }
}
