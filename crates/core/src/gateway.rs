//! Model gateway: the abstraction over LLM backends.
//!
//! A gateway takes the full transcript plus the tool catalog and returns one
//! structured response. How that maps onto a provider's wire format is the
//! implementation's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::tool::{ToolDescriptor, ToolInvocation};
use crate::transcript::Transcript;

/// Everything a gateway needs for one model call.
#[derive(Debug, Clone, Copy)]
pub struct GatewayRequest<'a> {
    /// The model to use (e.g., "mistralai/codestral-2508")
    pub model: &'a str,

    /// Instructions placed ahead of the transcript
    pub system_prompt: Option<&'a str>,

    /// The conversation so far
    pub transcript: &'a Transcript,

    /// Tools the model may call
    pub tools: &'a [ToolDescriptor],

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

/// One element of a response, in the order the model emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseItem {
    Reasoning { payload: serde_json::Value },
    ToolCall { invocation: ToolInvocation },
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete response from the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Final text, if the model produced any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Reasoning notes and tool calls, order preserved
    #[serde(default)]
    pub items: Vec<ResponseItem>,

    /// Which model actually responded
    #[serde(default)]
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ModelResponse {
    /// A text-only response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_tool_call(mut self, invocation: ToolInvocation) -> Self {
        self.items.push(ResponseItem::ToolCall { invocation });
        self
    }

    pub fn with_reasoning(mut self, payload: serde_json::Value) -> Self {
        self.items.push(ResponseItem::Reasoning { payload });
        self
    }

    /// Tool calls in the order received.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.items.iter().filter_map(|item| match item {
            ResponseItem::ToolCall { invocation } => Some(invocation),
            ResponseItem::Reasoning { .. } => None,
        })
    }

    /// Reasoning notes in the order received.
    pub fn reasoning_notes(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.items.iter().filter_map(|item| match item {
            ResponseItem::Reasoning { payload } => Some(payload),
            ResponseItem::ToolCall { .. } => None,
        })
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls().next().is_some()
    }
}

/// The model gateway capability.
///
/// The orchestrator calls `send()` without knowing which backend answers.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// A human-readable name for this gateway (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send the transcript and get one complete response.
    async fn send(&self, request: GatewayRequest<'_>) -> Result<ModelResponse, GatewayError>;
}
