//! The toolchat agent loop.
//!
//! Each user line becomes a turn that runs in rounds:
//!
//! 1. **Send** the system prompt, transcript and tool catalog to the gateway
//! 2. **Record** the response (reasoning notes, assistant text, tool calls)
//! 3. **Execute** each tool call in order and record its result
//! 4. **Repeat** while the model keeps calling tools
//!
//! The turn ends when a round calls no tools, or fails once `max_rounds`
//! is exhausted.

pub mod orchestrator;
pub mod session;

pub use orchestrator::Orchestrator;
pub use session::Session;
