use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{CreatePipeRequest, CreatePipeResponse, Message, PipeRequest, PipeResponse};
use crate::config::{LangbaseConfig, RequestConfig};
use crate::error::{LangbaseError, LangbaseResult};
use crate::prompts::MINDMAP_SYSTEM_PROMPT;

const RUN_PATH: &str = "/v1/pipes/run";
const PIPES_PATH: &str = "/v1/pipes";

/// Model the mind map pipe is created with.
const MINDMAP_MODEL: &str = "openai:gpt-4o-mini";

/// HTTP client for the Langbase Pipes API.
///
/// Pipe runs are retried with exponential backoff up to
/// `RequestConfig::max_retries` times; pipe creation is attempted once.
#[derive(Clone)]
pub struct LangbaseClient {
    http: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl LangbaseClient {
    /// Build a client with the configured per-request timeout
    pub fn new(config: &LangbaseConfig, request_config: RequestConfig) -> LangbaseResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LangbaseError::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a pipe, retrying failed attempts.
    ///
    /// Exhausting the retries yields [`LangbaseError::Unavailable`] carrying
    /// the last failure and the number of retries after the first attempt.
    pub async fn call_pipe(&self, request: PipeRequest) -> LangbaseResult<PipeResponse> {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts <= self.request_config.max_retries {
            if attempts > 0 {
                let delay = self.backoff(attempts);
                warn!(
                    pipe = %request.name,
                    retry = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying pipe run"
                );
                tokio::time::sleep(delay).await;
            }

            let started = Instant::now();
            debug!(
                pipe = %request.name,
                messages = request.messages.len(),
                "Running pipe"
            );

            match self
                .post::<_, PipeResponse>(RUN_PATH, &request, "response")
                .await
            {
                Ok(response) => {
                    info!(
                        pipe = %request.name,
                        latency_ms = started.elapsed().as_millis() as u64,
                        "Pipe run succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        pipe = %request.name,
                        error = %e,
                        attempt = attempts,
                        latency_ms = started.elapsed().as_millis() as u64,
                        "Pipe run failed"
                    );
                    last_error = Some(e.to_string());
                    attempts += 1;
                }
            }
        }

        Err(LangbaseError::Unavailable {
            message: last_error.unwrap_or_else(|| "no attempt made".to_string()),
            retries: attempts.saturating_sub(1),
        })
    }

    /// Create or upsert a pipe.
    pub async fn create_pipe(
        &self,
        request: CreatePipeRequest,
    ) -> LangbaseResult<CreatePipeResponse> {
        info!(pipe = %request.name, upsert = ?request.upsert, "Creating pipe");

        let created: CreatePipeResponse = self
            .post(PIPES_PATH, &request, "create pipe response")
            .await?;

        info!(pipe = %created.name, url = %created.url, "Pipe created");
        Ok(created)
    }

    /// Upsert the mind map pipe with its system prompt and JSON output.
    ///
    /// A 409 conflict means the pipe already exists and counts as success.
    pub async fn ensure_mindmap_pipe(&self, pipe_name: &str) -> LangbaseResult<()> {
        let request = CreatePipeRequest::new(pipe_name)
            .with_description("Turns free-text requests into hierarchical mind map JSON")
            .with_model(MINDMAP_MODEL)
            .with_upsert(true)
            .with_json_output(true)
            .with_temperature(0.7)
            .with_max_tokens(2500)
            .with_messages(vec![Message::system(MINDMAP_SYSTEM_PROMPT)]);

        match self.create_pipe(request).await {
            Ok(_) => {
                info!(pipe = %pipe_name, "Mind map pipe ready");
                Ok(())
            }
            Err(LangbaseError::Api { status, .. }) if status == StatusCode::CONFLICT.as_u16() => {
                info!(pipe = %pipe_name, "Mind map pipe already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delay before retry number `attempt` (1-based): base delay doubled each time.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.request_config.retry_delay_ms.saturating_mul(factor))
    }

    /// POST a JSON body and decode a JSON reply; non-2xx becomes [`LangbaseError::Api`].
    async fn post<B, T>(&self, path: &str, body: &B, what: &str) -> LangbaseResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LangbaseError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    LangbaseError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LangbaseError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LangbaseError::InvalidResponse {
                message: format!("Failed to parse {}: {}", what, e),
            })
    }
}
