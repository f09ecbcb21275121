//! Tool trait: the abstraction over agent capabilities.
//!
//! A tool is one unit binding its descriptor (what the model is told) to its
//! handler (what runs locally). The [`ToolRegistry`] is both the catalog sent
//! to the model and the executor that dispatches invocations.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;

/// One parameter a tool accepts. All parameters are strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
        }
    }
}

/// Model-facing description of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique key across the registry
    pub name: String,

    /// Human/model-facing text
    pub description: String,

    /// Ordered parameter specs
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// JSON Schema object describing the parameters.
    pub fn parameters_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for p in &self.params {
            properties.insert(
                p.name.clone(),
                serde_json::json!({
                    "type": "string",
                    "description": p.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Reject arguments that are not an object or lack a required parameter.
    pub fn check_required(&self, arguments: &serde_json::Value) -> Result<(), ToolError> {
        let Some(map) = arguments.as_object() else {
            return Err(ToolError::InvalidArguments(format!(
                "arguments for '{}' must be a JSON object",
                self.name
            )));
        };

        for p in self.params.iter().filter(|p| p.required) {
            match map.get(&p.name) {
                None | Some(serde_json::Value::Null) => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required parameter '{}' for '{}'",
                        p.name, self.name
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// A request to execute a tool, as parsed from a model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Correlation token issued by the model gateway
    pub call_id: String,

    /// Name of the tool to execute
    pub tool_name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,

    /// Arguments exactly as the model sent them
    #[serde(default)]
    raw_arguments: String,
}

impl ToolInvocation {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        let raw_arguments = arguments.to_string();
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
            raw_arguments,
        }
    }

    /// Decode wire-format arguments (a JSON document in a string).
    ///
    /// An empty string means "no arguments". Anything that fails to parse
    /// becomes `Null`, which the executor rejects as malformed. The original
    /// text is kept either way.
    pub fn from_raw(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        raw_arguments: &str,
    ) -> Self {
        let arguments = if raw_arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw_arguments).unwrap_or(serde_json::Value::Null)
        };
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
            raw_arguments: raw_arguments.to_string(),
        }
    }

    /// Arguments as received, for the transcript.
    pub fn raw_arguments(&self) -> &str {
        &self.raw_arguments
    }
}

/// Outcome of a tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Completed,
    Failed,
}

/// What a handler produces; the registry stamps it with the call id.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub status: ToolStatus,
    pub output: String,
    pub data: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn completed(output: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Completed,
            output: output.into(),
            data: None,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Failed,
            output: output.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    pub tool_name: String,

    /// The output content
    pub output: String,

    pub status: ToolStatus,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn completed(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            output: output.into(),
            status: ToolStatus::Completed,
            data: None,
        }
    }

    pub fn failed(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            output: output.into(),
            status: ToolStatus::Failed,
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Completed
    }
}

/// The core Tool trait.
///
/// Most tools implement [`TypedTool`] instead and get this for free.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Descriptor sent to the model.
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError>;
}

/// A tool whose arguments decode into a typed record.
///
/// Decoding happens before the handler runs, so a handler only ever sees
/// well-formed arguments.
#[async_trait]
pub trait TypedTool: Send + Sync {
    type Args: DeserializeOwned + Send;

    fn descriptor(&self) -> ToolDescriptor;

    async fn run(&self, args: Self::Args) -> Result<ToolOutput, ToolError>;
}

#[async_trait]
impl<T: TypedTool> Tool for T {
    fn descriptor(&self) -> ToolDescriptor {
        TypedTool::descriptor(self)
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: T::Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        self.run(args).await
    }
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Box<dyn Tool>,
}

/// A registry of available tools.
///
/// The orchestrator uses this to:
/// 1. Get the ordered catalog to send to the model
/// 2. Execute tool calls the model requests
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let descriptor = tool.descriptor();
        let name = descriptor.name.clone();
        let entry = RegisteredTool {
            descriptor,
            handler: tool,
        };
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = entry,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(entry);
            }
        }
    }

    /// Get a tool descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i].descriptor)
    }

    /// All descriptors in registration order (the catalog sent to the model).
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    /// List all registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.descriptor.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call.
    ///
    /// Never fails: unknown tools, malformed arguments and handler errors all
    /// come back as a `Failed` result carrying the invocation's call id.
    pub async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let start = Instant::now();
        let outcome = self.dispatch(invocation).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(out) => {
                debug!(
                    tool = %invocation.tool_name,
                    call_id = %invocation.call_id,
                    status = ?out.status,
                    duration_ms,
                    "Tool executed"
                );
                ToolResult {
                    call_id: invocation.call_id.clone(),
                    tool_name: invocation.tool_name.clone(),
                    output: out.output,
                    status: out.status,
                    data: out.data,
                }
            }
            Err(e) => {
                warn!(
                    tool = %invocation.tool_name,
                    call_id = %invocation.call_id,
                    error = %e,
                    duration_ms,
                    "Tool execution failed"
                );
                ToolResult::failed(
                    invocation.call_id.clone(),
                    invocation.tool_name.clone(),
                    format!("Error: {e}"),
                )
            }
        }
    }

    async fn dispatch(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let &pos = self
            .index
            .get(&invocation.tool_name)
            .ok_or_else(|| ToolError::NotFound(invocation.tool_name.clone()))?;
        let entry = &self.tools[pos];
        entry.descriptor.check_required(&invocation.arguments)?;
        entry.handler.execute(invocation.arguments.clone()).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
