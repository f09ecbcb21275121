//! OpenAI-compatible gateway implementation.
//!
//! Works with: OpenRouter, OpenAI, Ollama, vLLM, and any endpoint exposing
//! `/chat/completions` with function calling.
//!
//! The transcript is flattened into chat messages round by round: an
//! `Assistant` turn opens an assistant message that collects the round's
//! tool calls and reasoning details, and the round's tool results follow it
//! as `tool` messages.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use toolchat_core::error::GatewayError;
use toolchat_core::gateway::{GatewayRequest, ModelGateway, ModelResponse, ResponseItem, Usage};
use toolchat_core::tool::{ToolDescriptor, ToolInvocation};
use toolchat_core::transcript::{Transcript, Turn};
use tracing::{debug, warn};

/// An OpenAI-compatible model gateway.
pub struct OpenAiCompatGateway {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

impl OpenAiCompatGateway {
    /// Create a new OpenAI-compatible gateway.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: http_client(Duration::from_secs(120)),
        }
    }

    /// Replace the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// Create an OpenRouter gateway (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI gateway (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama gateway (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert the system prompt and transcript to OpenAI API messages.
    fn to_api_messages(system_prompt: Option<&str>, transcript: &Transcript) -> Vec<ApiMessage> {
        let mut out = Vec::new();
        if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
            out.push(ApiMessage::text("system", prompt));
        }

        let mut round = RoundBuilder::default();
        for turn in transcript {
            match turn {
                Turn::User { text } => {
                    round.flush(&mut out);
                    round.pending_reasoning.clear();
                    out.push(ApiMessage::text("user", text));
                }
                Turn::Assistant { text } => {
                    round.flush(&mut out);
                    round.open(text);
                }
                Turn::Reasoning { payload } => round.reasoning(payload.clone()),
                Turn::ToolCallRequest {
                    call_id,
                    tool_name,
                    raw_arguments,
                } => round.request(ApiToolCall {
                    id: call_id.clone(),
                    r#type: "function".into(),
                    function: ApiFunction {
                        name: tool_name.clone(),
                        arguments: raw_arguments.clone(),
                    },
                }),
                Turn::ToolCallResult { call_id, output, .. } => {
                    round.results.push(ApiMessage {
                        role: "tool".into(),
                        content: Some(output.clone()),
                        tool_calls: None,
                        tool_call_id: Some(call_id.clone()),
                        reasoning_details: None,
                    });
                }
            }
        }
        round.flush(&mut out);
        out
    }

    /// Convert tool descriptors to OpenAI API format.
    fn to_api_tools(tools: &[ToolDescriptor]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    fn request_body(request: &GatewayRequest<'_>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request.system_prompt, request.transcript),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(request.tools));
        }

        body
    }

    /// Unpack the first choice into a `ModelResponse`.
    fn to_model_response(api_response: ApiResponse) -> Result<ModelResponse, GatewayError> {
        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| GatewayError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;
        let message = choice.message;

        let mut items = Vec::new();
        match message.reasoning_details {
            Some(details) if !details.is_empty() => {
                items.extend(
                    details
                        .into_iter()
                        .map(|payload| ResponseItem::Reasoning { payload }),
                );
            }
            _ => {
                if let Some(text) = message.reasoning.filter(|r| !r.is_empty()) {
                    items.push(ResponseItem::Reasoning {
                        payload: serde_json::json!({ "type": "reasoning.text", "text": text }),
                    });
                }
            }
        }

        for tc in message.tool_calls.unwrap_or_default() {
            let call_id = if tc.id.is_empty() {
                format!("call_{}", uuid::Uuid::new_v4().simple())
            } else {
                tc.id
            };
            items.push(ResponseItem::ToolCall {
                invocation: ToolInvocation::from_raw(
                    call_id,
                    tc.function.name,
                    &tc.function.arguments,
                ),
            });
        }

        Ok(ModelResponse {
            text: message.content,
            items,
            model: api_response.model,
            usage: api_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

/// Groups one round's turns into an assistant message plus tool messages.
#[derive(Default)]
struct RoundBuilder {
    assistant: Option<ApiMessage>,
    results: Vec<ApiMessage>,
    pending_reasoning: Vec<serde_json::Value>,
}

impl RoundBuilder {
    fn open(&mut self, text: &str) {
        let mut message = ApiMessage::text("assistant", text);
        if !self.pending_reasoning.is_empty() {
            message.reasoning_details = Some(std::mem::take(&mut self.pending_reasoning));
        }
        self.assistant = Some(message);
    }

    /// Reasoning seen after tool results may belong to the next round, so it
    /// waits until the next request or assistant turn claims it.
    fn reasoning(&mut self, payload: serde_json::Value) {
        match self.assistant.as_mut() {
            Some(message) if self.results.is_empty() => {
                message.reasoning_details.get_or_insert_with(Vec::new).push(payload);
            }
            _ => self.pending_reasoning.push(payload),
        }
    }

    fn request(&mut self, call: ApiToolCall) {
        if self.assistant.is_none() {
            self.open("");
        }
        let pending = std::mem::take(&mut self.pending_reasoning);
        if let Some(message) = self.assistant.as_mut() {
            if !pending.is_empty() {
                message.reasoning_details.get_or_insert_with(Vec::new).extend(pending);
            }
            message.tool_calls.get_or_insert_with(Vec::new).push(call);
        }
    }

    fn flush(&mut self, out: &mut Vec<ApiMessage>) {
        if let Some(message) = self.assistant.take() {
            out.push(message);
        }
        out.append(&mut self.results);
    }
}

#[async_trait]
impl ModelGateway for OpenAiCompatGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: GatewayRequest<'_>) -> Result<ModelResponse, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            gateway = %self.name,
            model = %request.model,
            turns = request.transcript.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(e.to_string())
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(GatewayError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(GatewayError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gateway returned error");
            return Err(GatewayError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| GatewayError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Self::to_model_response(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_details: Option<Vec<serde_json::Value>>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            reasoning_details: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    reasoning_details: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolchat_core::tool::{ParamSpec, ToolResult};

    fn roles(messages: &[ApiMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.role.as_str()).collect()
    }

    #[test]
    fn openrouter_constructor() {
        let gateway = OpenAiCompatGateway::openrouter("sk-test");
        assert_eq!(gateway.name(), "openrouter");
        assert!(gateway.base_url().contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let gateway = OpenAiCompatGateway::ollama(None);
        assert_eq!(gateway.name(), "ollama");
        assert!(gateway.base_url().contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let gateway = OpenAiCompatGateway::new("custom", "http://host/v1/", "k");
        assert_eq!(gateway.base_url(), "http://host/v1");
    }

    #[test]
    fn system_prompt_comes_first() {
        let mut t = Transcript::new();
        t.push(Turn::user("Hello"));
        let msgs = OpenAiCompatGateway::to_api_messages(Some("Be helpful"), &t);
        assert_eq!(roles(&msgs), vec!["system", "user"]);

        let msgs = OpenAiCompatGateway::to_api_messages(None, &t);
        assert_eq!(roles(&msgs), vec!["user"]);
    }

    #[test]
    fn tool_round_is_grouped_under_one_assistant_message() {
        let mut t = Transcript::new();
        t.push(Turn::user("look around"));
        t.push(Turn::assistant(""));
        t.push(Turn::tool_call_request("c1", "read-directory", r#"{"dirPath":"."}"#));
        t.push(Turn::tool_call_result(ToolResult::completed("c1", "read-directory", "[]")));
        t.push(Turn::tool_call_request("c2", "read-file", r#"{"filePath":"a"}"#));
        t.push(Turn::tool_call_result(ToolResult::failed("c2", "read-file", "missing")));
        t.push(Turn::assistant("Nothing here."));

        let msgs = OpenAiCompatGateway::to_api_messages(None, &t);
        assert_eq!(roles(&msgs), vec!["user", "assistant", "tool", "tool", "assistant"]);

        let calls = msgs[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "c1");
        assert_eq!(calls[1].function.name, "read-file");
        assert_eq!(msgs[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(msgs[3].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(msgs[4].content.as_deref(), Some("Nothing here."));
        assert!(msgs[4].tool_calls.is_none());
    }

    #[test]
    fn reasoning_attaches_to_its_round() {
        let mut t = Transcript::new();
        t.push(Turn::user("go"));
        // round 1: leading reasoning, then text, then a call
        t.push(Turn::reasoning(serde_json::json!({"id": "r1"})));
        t.push(Turn::assistant(""));
        t.push(Turn::tool_call_request("c1", "ping", r#"{"host":"a"}"#));
        t.push(Turn::tool_call_result(ToolResult::completed("c1", "ping", "{}")));
        // still round 1: reasoning between calls
        t.push(Turn::reasoning(serde_json::json!({"id": "r2"})));
        t.push(Turn::tool_call_request("c2", "ping", r#"{"host":"b"}"#));
        t.push(Turn::tool_call_result(ToolResult::completed("c2", "ping", "{}")));
        // round 2: leading reasoning
        t.push(Turn::reasoning(serde_json::json!({"id": "r3"})));
        t.push(Turn::assistant("both up"));

        let msgs = OpenAiCompatGateway::to_api_messages(None, &t);
        assert_eq!(roles(&msgs), vec!["user", "assistant", "tool", "tool", "assistant"]);

        let ids = |m: &ApiMessage| -> Vec<String> {
            m.reasoning_details
                .as_ref()
                .map(|d| d.iter().map(|v| v["id"].as_str().unwrap().to_string()).collect())
                .unwrap_or_default()
        };
        assert_eq!(ids(&msgs[1]), vec!["r1", "r2"]);
        assert_eq!(msgs[1].tool_calls.as_ref().unwrap().len(), 2);
        assert_eq!(ids(&msgs[4]), vec!["r3"]);
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![
            ToolDescriptor::new("read-file", "Read a file")
                .param(ParamSpec::required("filePath", "path")),
        ];
        let api_tools = OpenAiCompatGateway::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "read-file");
        assert_eq!(api_tools[0].r#type, "function");
        assert_eq!(
            api_tools[0].function.parameters["required"],
            serde_json::json!(["filePath"])
        );
    }

    #[test]
    fn request_body_includes_tools_and_limits() {
        let t = Transcript::new();
        let tools = vec![ToolDescriptor::new("ping", "Ping")];
        let request = GatewayRequest {
            model: "m",
            system_prompt: Some("sys"),
            transcript: &t,
            tools: &tools,
            temperature: 0.2,
            max_tokens: Some(256),
        };
        let body = OpenAiCompatGateway::request_body(&request);
        assert_eq!(body["model"], "m");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["tools"][0]["function"]["name"], "ping");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn parse_text_response() {
        let data = r#"{
            "model": "mistralai/codestral-2508",
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        }"#;
        let api: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = OpenAiCompatGateway::to_model_response(api).unwrap();
        assert_eq!(resp.text.as_deref(), Some("Hi there"));
        assert!(!resp.has_tool_calls());
        assert_eq!(resp.usage.unwrap().total_tokens, 13);
    }

    #[test]
    fn parse_tool_call_response_with_reasoning() {
        let data = r#"{
            "model": "m",
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "reasoning_details": [{"type": "reasoning.text", "text": "look first"}],
                "tool_calls": [
                    {"id": "call_a", "type": "function",
                     "function": {"name": "read-directory", "arguments": "{\"dirPath\":\"./src\"}"}},
                    {"id": "call_b", "type": "function",
                     "function": {"name": "read-file", "arguments": "not json"}}
                ]
            }}]
        }"#;
        let api: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = OpenAiCompatGateway::to_model_response(api).unwrap();

        assert!(resp.text.is_none());
        assert!(matches!(resp.items[0], ResponseItem::Reasoning { .. }));
        let calls: Vec<&ToolInvocation> = resp.tool_calls().collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].call_id, "call_a");
        assert_eq!(calls[0].arguments["dirPath"], "./src");
        assert!(calls[1].arguments.is_null());
        assert_eq!(calls[1].raw_arguments(), "not json");
    }

    #[test]
    fn plain_reasoning_string_becomes_note() {
        let data = r#"{"model": "m", "choices": [{"message": {"content": "ok", "reasoning": "hmm"}}]}"#;
        let api: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = OpenAiCompatGateway::to_model_response(api).unwrap();
        let notes: Vec<&serde_json::Value> = resp.reasoning_notes().collect();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["text"], "hmm");
    }

    #[test]
    fn missing_call_id_is_generated() {
        let data = r#"{"model": "m", "choices": [{"message": {"tool_calls": [
            {"function": {"name": "ping", "arguments": "{\"host\":\"a\"}"}}
        ]}}]}"#;
        let api: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = OpenAiCompatGateway::to_model_response(api).unwrap();
        let call = resp.tool_calls().next().unwrap();
        assert!(call.call_id.starts_with("call_"));
        assert!(call.call_id.len() > "call_".len());
    }

    #[test]
    fn empty_choices_is_error() {
        let api: ApiResponse = serde_json::from_str(r#"{"model": "m", "choices": []}"#).unwrap();
        assert!(matches!(
            OpenAiCompatGateway::to_model_response(api),
            Err(GatewayError::ApiError { .. })
        ));
    }
}
