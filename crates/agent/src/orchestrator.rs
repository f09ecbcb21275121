//! The round loop: send the transcript, run the requested tools, repeat.

use std::sync::Arc;

use toolchat_config::AppConfig;
use toolchat_core::error::{Error, Result};
use toolchat_core::gateway::{GatewayRequest, ModelGateway, ModelResponse, ResponseItem};
use toolchat_core::tool::ToolRegistry;
use toolchat_core::transcript::{Transcript, Turn};
use tracing::{debug, info, warn};

/// Drives one user turn to completion against a gateway and a tool registry.
///
/// Holds no per-conversation state, so one orchestrator can serve many
/// sessions at once.
pub struct Orchestrator {
    /// The model gateway to use
    gateway: Arc<dyn ModelGateway>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// The model to use
    model: String,

    /// Instructions sent ahead of the transcript
    system_prompt: Option<String>,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per model response
    max_tokens: Option<u32>,

    /// Maximum gateway rounds per user turn
    max_rounds: u32,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            tools,
            model: model.into(),
            system_prompt: None,
            temperature: 0.7,
            max_tokens: None,
            max_rounds: 25,
        }
    }

    /// Build an orchestrator with model settings and limits taken from config.
    pub fn from_config(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        let mut orchestrator = Self::new(gateway, tools, &config.model)
            .with_system_prompt(&config.agent.system_prompt)
            .with_temperature(config.temperature)
            .with_max_rounds(config.agent.max_rounds);
        if let Some(max) = config.max_tokens {
            orchestrator = orchestrator.with_max_tokens(max);
        }
        orchestrator
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of gateway rounds per turn (at least 1).
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Process one user message and return the model's final text.
    ///
    /// Every round appends the model's output to `transcript` and, for each
    /// tool call, the request and its result back to back. The turn ends on
    /// the first round that calls no tools. On error the transcript keeps
    /// everything appended so far.
    pub async fn run_turn(
        &self,
        transcript: &mut Transcript,
        user_text: impl Into<String>,
    ) -> Result<String> {
        transcript.push(Turn::user(user_text));

        info!(
            transcript_id = %transcript.id,
            turns = transcript.len(),
            "Processing user turn"
        );

        let descriptors = self.tools.descriptors();

        for round in 1..=self.max_rounds {
            let open = transcript.open_calls();
            if !open.is_empty() {
                return Err(Error::Internal(format!(
                    "transcript has unanswered tool calls: {}",
                    open.join(", ")
                )));
            }

            debug!(
                transcript_id = %transcript.id,
                round,
                turns = transcript.len(),
                "Orchestrator round"
            );

            let response = self
                .gateway
                .send(GatewayRequest {
                    model: &self.model,
                    system_prompt: self.system_prompt.as_deref(),
                    transcript,
                    tools: &descriptors,
                    temperature: self.temperature,
                    max_tokens: self.max_tokens,
                })
                .await?;

            if let Some(usage) = &response.usage {
                debug!(
                    model = %response.model,
                    total_tokens = usage.total_tokens,
                    "Gateway usage"
                );
            }

            let executed = self.apply_response(transcript, response).await;
            match executed {
                RoundOutcome::Final(text) => {
                    info!(transcript_id = %transcript.id, rounds = round, "Turn complete");
                    return Ok(text);
                }
                RoundOutcome::ToolsRan(count) => {
                    debug!(round, tool_calls = count, "Tool calls executed");
                }
            }
        }

        warn!(
            transcript_id = %transcript.id,
            limit = self.max_rounds,
            "Round limit reached with tool calls still requested"
        );
        Err(Error::RoundLimitExceeded {
            limit: self.max_rounds,
        })
    }

    /// Append one response to the transcript, executing tool calls inline.
    async fn apply_response(
        &self,
        transcript: &mut Transcript,
        response: ModelResponse,
    ) -> RoundOutcome {
        let text = response.text.unwrap_or_default();
        let mut items = response.items.into_iter().peekable();

        // Notes emitted before the first tool call precede the assistant text.
        while let Some(ResponseItem::Reasoning { .. }) = items.peek() {
            if let Some(ResponseItem::Reasoning { payload }) = items.next() {
                transcript.push(Turn::reasoning(payload));
            }
        }
        transcript.push(Turn::assistant(text.clone()));

        let mut executed = 0usize;
        for item in items {
            match item {
                ResponseItem::Reasoning { payload } => transcript.push(Turn::reasoning(payload)),
                ResponseItem::ToolCall { invocation } => {
                    transcript.push(Turn::tool_call_request(
                        invocation.call_id.clone(),
                        invocation.tool_name.clone(),
                        invocation.raw_arguments(),
                    ));
                    let result = self.tools.execute(&invocation).await;
                    if !result.is_success() {
                        warn!(
                            tool = %result.tool_name,
                            call_id = %result.call_id,
                            "Tool call failed, reporting to model"
                        );
                    }
                    transcript.push(Turn::tool_call_result(result));
                    executed += 1;
                }
            }
        }

        if executed == 0 {
            RoundOutcome::Final(text)
        } else {
            RoundOutcome::ToolsRan(executed)
        }
    }
}

enum RoundOutcome {
    Final(String),
    ToolsRan(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use toolchat_core::error::{GatewayError, ToolError};
    use toolchat_core::tool::{
        ParamSpec, ToolDescriptor, ToolInvocation, ToolOutput, ToolStatus, TypedTool,
    };

    /// Replays a fixed list of responses and records what it was sent.
    struct ScriptedGateway {
        responses: Mutex<Vec<std::result::Result<ModelResponse, GatewayError>>>,
        call_count: Mutex<usize>,
        seen_turns: Mutex<Vec<usize>>,
    }

    impl ScriptedGateway {
        fn new(responses: Vec<std::result::Result<ModelResponse, GatewayError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                call_count: Mutex::new(0),
                seen_turns: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(
            &self,
            request: GatewayRequest<'_>,
        ) -> std::result::Result<ModelResponse, GatewayError> {
            *self.call_count.lock().unwrap() += 1;
            self.seen_turns.lock().unwrap().push(request.transcript.len());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(ModelResponse::text("script exhausted"))
            } else {
                responses.remove(0)
            }
        }
    }

    /// Always calls the same tool.
    struct LoopingGateway;

    #[async_trait]
    impl ModelGateway for LoopingGateway {
        fn name(&self) -> &str {
            "looping"
        }

        async fn send(
            &self,
            request: GatewayRequest<'_>,
        ) -> std::result::Result<ModelResponse, GatewayError> {
            let id = format!("call_{}", request.transcript.len());
            Ok(ModelResponse::default().with_tool_call(ToolInvocation::new(
                id,
                "echo",
                serde_json::json!({"text": "again"}),
            )))
        }
    }

    #[derive(serde::Deserialize)]
    struct EchoArgs {
        text: String,
    }

    struct EchoTool;

    #[async_trait]
    impl TypedTool for EchoTool {
        type Args = EchoArgs;

        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("echo", "Echo the input")
                .param(ParamSpec::required("text", "Text to echo"))
        }

        async fn run(&self, args: EchoArgs) -> std::result::Result<ToolOutput, ToolError> {
            Ok(ToolOutput::completed(args.text))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(EchoTool));
        Arc::new(tools)
    }

    fn echo_call(id: &str, text: &str) -> ToolInvocation {
        ToolInvocation::new(id, "echo", serde_json::json!({ "text": text }))
    }

    fn kinds(transcript: &Transcript) -> Vec<&'static str> {
        transcript
            .iter()
            .map(|t| match t {
                Turn::User { .. } => "user",
                Turn::Assistant { .. } => "assistant",
                Turn::Reasoning { .. } => "reasoning",
                Turn::ToolCallRequest { .. } => "request",
                Turn::ToolCallResult { .. } => "result",
            })
            .collect()
    }

    #[tokio::test]
    async fn text_only_response_takes_one_round() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(ModelResponse::text(
            "Hello! How can I help?",
        ))]));
        let orchestrator = Orchestrator::new(gateway.clone(), registry(), "mock-model");

        let mut transcript = Transcript::new();
        let answer = orchestrator.run_turn(&mut transcript, "Hello!").await.unwrap();

        assert_eq!(answer, "Hello! How can I help?");
        assert_eq!(gateway.calls(), 1);
        assert_eq!(kinds(&transcript), vec!["user", "assistant"]);
    }

    #[tokio::test]
    async fn tool_calls_are_closed_in_request_order() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(ModelResponse::default()
                .with_tool_call(echo_call("c1", "first"))
                .with_tool_call(echo_call("c2", "second"))),
            Ok(ModelResponse::text("done")),
        ]));
        let orchestrator = Orchestrator::new(gateway.clone(), registry(), "mock-model");

        let mut transcript = Transcript::new();
        let answer = orchestrator.run_turn(&mut transcript, "go").await.unwrap();

        assert_eq!(answer, "done");
        assert_eq!(gateway.calls(), 2);
        assert_eq!(
            kinds(&transcript),
            vec!["user", "assistant", "request", "result", "request", "result", "assistant"]
        );
        // second call saw both pairs
        assert_eq!(*gateway.seen_turns.lock().unwrap(), vec![1, 6]);

        let results: Vec<(&str, &str)> = transcript
            .iter()
            .filter_map(|t| match t {
                Turn::ToolCallResult { call_id, output, .. } => {
                    Some((call_id.as_str(), output.as_str()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(results, vec![("c1", "first"), ("c2", "second")]);
        assert!(transcript.open_calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_fails_and_loop_continues() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(ModelResponse::default().with_tool_call(ToolInvocation::new(
                "c1",
                "delete-everything",
                serde_json::json!({}),
            ))),
            Ok(ModelResponse::text("sorry")),
        ]));
        let orchestrator = Orchestrator::new(gateway.clone(), registry(), "mock-model");

        let mut transcript = Transcript::new();
        let answer = orchestrator.run_turn(&mut transcript, "wipe it").await.unwrap();

        assert_eq!(answer, "sorry");
        assert_eq!(gateway.calls(), 2);
        let status = transcript.iter().find_map(|t| match t {
            Turn::ToolCallResult { status, .. } => Some(*status),
            _ => None,
        });
        assert_eq!(status, Some(ToolStatus::Failed));
    }

    #[tokio::test]
    async fn reasoning_is_ordered_around_assistant_turn() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(ModelResponse::text("checking")
                .with_reasoning(serde_json::json!({"text": "lead"}))
                .with_tool_call(echo_call("c1", "x"))
                .with_reasoning(serde_json::json!({"text": "between"}))
                .with_tool_call(echo_call("c2", "y"))),
            Ok(ModelResponse::text("ok")),
        ]));
        let orchestrator = Orchestrator::new(gateway, registry(), "mock-model");

        let mut transcript = Transcript::new();
        orchestrator.run_turn(&mut transcript, "go").await.unwrap();

        assert_eq!(
            kinds(&transcript),
            vec![
                "user",
                "reasoning",
                "assistant",
                "request",
                "result",
                "reasoning",
                "request",
                "result",
                "assistant"
            ]
        );
        assert_eq!(transcript.turns()[2].text(), Some("checking"));
    }

    #[tokio::test]
    async fn malformed_arguments_are_recorded_as_sent() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(ModelResponse::default().with_tool_call(ToolInvocation::from_raw(
                "c1",
                "echo",
                r#"{"text": "cut off"#,
            ))),
            Ok(ModelResponse::text("retrying")),
        ]));
        let orchestrator = Orchestrator::new(gateway, registry(), "mock-model");

        let mut transcript = Transcript::new();
        orchestrator.run_turn(&mut transcript, "go").await.unwrap();

        let raw = transcript.iter().find_map(|t| match t {
            Turn::ToolCallRequest { raw_arguments, .. } => Some(raw_arguments.as_str()),
            _ => None,
        });
        assert_eq!(raw, Some(r#"{"text": "cut off"#));
        let status = transcript.iter().find_map(|t| match t {
            Turn::ToolCallResult { status, .. } => Some(*status),
            _ => None,
        });
        assert_eq!(status, Some(ToolStatus::Failed));
    }

    #[tokio::test]
    async fn round_limit_fails_closed() {
        let orchestrator =
            Orchestrator::new(Arc::new(LoopingGateway), registry(), "mock-model").with_max_rounds(3);

        let mut transcript = Transcript::new();
        let err = orchestrator.run_turn(&mut transcript, "loop").await.unwrap_err();

        assert!(matches!(err, Error::RoundLimitExceeded { limit: 3 }));
        assert!(transcript.open_calls().is_empty());
        // user + 3 * (assistant, request, result)
        assert_eq!(transcript.len(), 1 + 3 * 3);
    }

    #[tokio::test]
    async fn gateway_error_propagates_and_keeps_user_turn() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Err(GatewayError::Network(
            "connection refused".into(),
        ))]));
        let orchestrator = Orchestrator::new(gateway, registry(), "mock-model");

        let mut transcript = Transcript::new();
        let err = orchestrator.run_turn(&mut transcript, "hi").await.unwrap_err();

        assert!(matches!(err, Error::Gateway(GatewayError::Network(_))));
        assert_eq!(kinds(&transcript), vec!["user"]);
    }

    #[tokio::test]
    async fn open_calls_block_the_gateway() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let orchestrator = Orchestrator::new(gateway.clone(), registry(), "mock-model");

        let mut transcript = Transcript::new();
        transcript.push(Turn::tool_call_request("dangling", "echo", "{}"));
        let err = orchestrator.run_turn(&mut transcript, "hi").await.unwrap_err();

        assert!(matches!(err, Error::Internal(ref m) if m.contains("dangling")));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn transcript_grows_append_only_across_turns() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(ModelResponse::default().with_tool_call(echo_call("c1", "a"))),
            Ok(ModelResponse::text("first")),
            Ok(ModelResponse::text("second")),
        ]));
        let orchestrator = Orchestrator::new(gateway, registry(), "mock-model");

        let mut transcript = Transcript::new();
        orchestrator.run_turn(&mut transcript, "one").await.unwrap();
        let snapshot: Vec<Turn> = transcript.turns().to_vec();
        assert_eq!(snapshot.len(), 5);

        orchestrator.run_turn(&mut transcript, "two").await.unwrap();
        assert_eq!(transcript.len(), 7);
        assert_eq!(&transcript.turns()[..5], snapshot.as_slice());
    }

    #[test]
    fn from_config_applies_settings() {
        let mut config = AppConfig::default();
        config.agent.max_rounds = 4;
        config.max_tokens = Some(512);
        let orchestrator = Orchestrator::from_config(
            Arc::new(LoopingGateway),
            registry(),
            &config,
        );
        assert_eq!(orchestrator.model(), config.model);
        assert_eq!(orchestrator.max_rounds, 4);
        assert_eq!(orchestrator.max_tokens, Some(512));
        assert!(orchestrator.system_prompt.is_some());
        assert_eq!(orchestrator.tools().len(), 1);
    }
}
