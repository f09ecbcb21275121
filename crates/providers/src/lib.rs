//! Model gateway implementations for toolchat.
//!
//! All gateways implement the `toolchat_core::ModelGateway` trait.
//! The router builds the configured gateway from `AppConfig`.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatGateway;
pub use retry::RetryingGateway;
pub use router::{build_gateway, default_base_url};
