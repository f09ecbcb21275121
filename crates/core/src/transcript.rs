//! Turns and the transcript they form.
//!
//! The transcript is the literal conversation history replayed to the model
//! on every call. It only ever grows: turns are appended, never removed or
//! reordered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::{ToolResult, ToolStatus};

/// Unique identifier for a transcript (one per session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscriptId(pub String);

impl TranscriptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TranscriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TranscriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One atomic entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    /// Text typed by the user.
    User { text: String },

    /// Text produced by the model. May be empty when the model only called tools.
    Assistant { text: String },

    /// Provider-specific reasoning payload, kept verbatim for replay.
    Reasoning { payload: serde_json::Value },

    /// A tool invocation the model asked for.
    ToolCallRequest {
        call_id: String,
        tool_name: String,
        /// Arguments exactly as the model sent them (a JSON document).
        raw_arguments: String,
    },

    /// The answer to a `ToolCallRequest` with the same `call_id`.
    ToolCallResult {
        call_id: String,
        tool_name: String,
        output: String,
        status: ToolStatus,
    },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant { text: text.into() }
    }

    pub fn reasoning(payload: serde_json::Value) -> Self {
        Self::Reasoning { payload }
    }

    pub fn tool_call_request(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        raw_arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCallRequest {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }

    /// Build the result turn for an executed tool call.
    pub fn tool_call_result(result: ToolResult) -> Self {
        Self::ToolCallResult {
            call_id: result.call_id,
            tool_name: result.tool_name,
            output: result.output,
            status: result.status,
        }
    }

    /// Text content of the turn, if it has any (reasoning payloads do not).
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::User { text } | Self::Assistant { text } => Some(text),
            Self::ToolCallRequest { raw_arguments, .. } => Some(raw_arguments),
            Self::ToolCallResult { output, .. } => Some(output),
            Self::Reasoning { .. } => None,
        }
    }
}

/// Ordered, append-only conversation state owned by one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Unique transcript ID
    pub id: TranscriptId,

    turns: Vec<Turn>,

    /// When this transcript was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was appended
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    /// Create a new empty transcript.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: TranscriptId::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Call ids that were requested but have not been answered yet.
    ///
    /// Must be empty whenever the transcript is sent to the model.
    pub fn open_calls(&self) -> Vec<&str> {
        let mut open: Vec<&str> = Vec::new();
        for turn in &self.turns {
            match turn {
                Turn::ToolCallRequest { call_id, .. } => open.push(call_id),
                Turn::ToolCallResult { call_id, .. } => {
                    if let Some(pos) = open.iter().position(|id| id == call_id) {
                        open.remove(pos);
                    }
                }
                _ => {}
            }
        }
        open
    }

    /// Get the total token count estimate (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.turns
            .iter()
            .filter_map(Turn::text)
            .map(|t| t.len() / 4)
            .sum()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
