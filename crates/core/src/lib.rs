//! # toolchat core
//!
//! Domain types, traits, and error definitions for the toolchat agent loop.
//! This crate has no I/O of its own: it defines the transcript, the tool
//! contract and the model gateway contract that the other crates implement
//! against.

pub mod error;
pub mod gateway;
pub mod tool;
pub mod transcript;

// Re-export key types at crate root for ergonomics
pub use error::{Error, GatewayError, Result, ToolError};
pub use gateway::{GatewayRequest, ModelGateway, ModelResponse, ResponseItem, Usage};
pub use tool::{
    ParamSpec, Tool, ToolDescriptor, ToolInvocation, ToolOutput, ToolRegistry, ToolResult,
    ToolStatus, TypedTool,
};
pub use transcript::{Transcript, TranscriptId, Turn};
