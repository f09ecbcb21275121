//! One conversation: a transcript plus a shared orchestrator.

use std::sync::Arc;

use toolchat_core::error::{Error, Result};
use toolchat_core::transcript::Transcript;

use crate::orchestrator::Orchestrator;

pub struct Session {
    orchestrator: Arc<Orchestrator>,
    transcript: Transcript,
}

impl Session {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            transcript: Transcript::new(),
        }
    }

    /// Run one user line through the orchestrator.
    ///
    /// Blank input is rejected before anything is appended.
    pub async fn submit_user_line(&mut self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::Internal("empty input".into()));
        }
        self.orchestrator.run_turn(&mut self.transcript, text).await
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use toolchat_core::error::GatewayError;
    use toolchat_core::gateway::{GatewayRequest, ModelGateway, ModelResponse};
    use toolchat_core::tool::ToolRegistry;

    /// Answers with the number of turns it was shown.
    struct CountingGateway;

    #[async_trait]
    impl ModelGateway for CountingGateway {
        fn name(&self) -> &str {
            "counting"
        }

        async fn send(
            &self,
            request: GatewayRequest<'_>,
        ) -> std::result::Result<ModelResponse, GatewayError> {
            Ok(ModelResponse::text(format!("saw {}", request.transcript.len())))
        }
    }

    fn orchestrator() -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            Arc::new(CountingGateway),
            Arc::new(ToolRegistry::new()),
            "mock-model",
        ))
    }

    #[tokio::test]
    async fn blank_line_is_rejected_untouched() {
        let mut session = Session::new(orchestrator());
        let err = session.submit_user_line("   \n").await.unwrap_err();
        assert!(matches!(err, Error::Internal(ref m) if m == "empty input"));
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn history_accumulates() {
        let mut session = Session::new(orchestrator());
        assert_eq!(session.submit_user_line("one").await.unwrap(), "saw 1");
        assert_eq!(session.submit_user_line("two").await.unwrap(), "saw 3");
        assert_eq!(session.transcript().len(), 4);
    }

    #[tokio::test]
    async fn sessions_share_one_orchestrator_independently() {
        let shared = orchestrator();
        let mut a = Session::new(shared.clone());
        let mut b = Session::new(shared);

        a.submit_user_line("hi").await.unwrap();
        a.submit_user_line("again").await.unwrap();
        assert_eq!(b.submit_user_line("hello").await.unwrap(), "saw 1");
        assert_ne!(a.transcript().id, b.transcript().id);
    }
}
