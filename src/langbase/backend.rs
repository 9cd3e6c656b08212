use async_trait::async_trait;
use tracing::debug;

use super::client::LangbaseClient;
use super::types::PipeRequest;
use crate::error::{LangbaseError, LangbaseResult};

/// Text-generation backend used by the graph builder.
///
/// Implementations may return well-formed JSON, JSON wrapped in prose,
/// malformed text, or an error. Callers treat every error the same way.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion for the given system instructions and user prompt.
    async fn complete(&self, system_instructions: &str, user_prompt: &str)
        -> LangbaseResult<String>;
}

/// [`CompletionBackend`] backed by a named Langbase pipe.
#[derive(Clone)]
pub struct PipeBackend {
    client: LangbaseClient,
    pipe_name: String,
}

impl PipeBackend {
    /// Create a backend that runs `pipe_name` through `client`.
    pub fn new(client: LangbaseClient, pipe_name: impl Into<String>) -> Self {
        Self {
            client,
            pipe_name: pipe_name.into(),
        }
    }

    /// Name of the pipe this backend calls.
    pub fn pipe_name(&self) -> &str {
        &self.pipe_name
    }
}

#[async_trait]
impl CompletionBackend for PipeBackend {
    async fn complete(
        &self,
        system_instructions: &str,
        user_prompt: &str,
    ) -> LangbaseResult<String> {
        let request = PipeRequest::chat(&self.pipe_name, system_instructions, user_prompt);

        let response = self.client.call_pipe(request).await?;
        debug!(
            pipe = %self.pipe_name,
            model = response.model().unwrap_or("unknown"),
            total_tokens = ?response.total_tokens(),
            "Completion received"
        );
        if !response.success {
            return Err(LangbaseError::InvalidResponse {
                message: "Pipe reported an unsuccessful completion".to_string(),
            });
        }

        Ok(response.completion)
    }
}
