//! Claude API client
//!
//! Uses a long-lived reqwest::Client for connection pooling. Calls carry a
//! bounded timeout and a bounded retry count with linear backoff; only
//! transport errors and 5xx responses are retried, 4xx is terminal, and a
//! malformed 2xx body is terminal as well.

use crate::config::AdvisorConfig;
use crate::error::{AdvisorError, Result};
use crate::models::{ModelTier, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The seam between the orchestrator and the model provider. The
/// orchestrator only ever sees this trait.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate a completion. Returns the answer text and token usage.
    async fn complete(
        &self,
        tier: ModelTier,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(String, TokenUsage)>;
}

/// Reusable Claude client (connection-pooled)
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    max_tokens: u32,
    temperature: f64,
}

impl ClaudeClient {
    pub fn new(cfg: &AdvisorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone(),
            max_retries: cfg.max_retries,
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        })
    }

    async fn send_once(&self, request: &MessagesRequest<'_>) -> Result<(String, TokenUsage)> {
        let url = format!("{}/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdvisorError::Upstream {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::MalformedResponse(format!("invalid JSON body: {}", e)))?;

        let text = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                AdvisorError::MalformedResponse("empty content in API response".to_string())
            })?;

        let usage = TokenUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens);

        Ok((text, usage))
    }
}

#[async_trait]
impl ModelBackend for ClaudeClient {
    async fn complete(
        &self,
        tier: ModelTier,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(String, TokenUsage)> {
        if self.api_key.is_empty() {
            return Err(AdvisorError::Config(
                "ANTHROPIC_API_KEY not configured".to_string(),
            ));
        }

        let request = MessagesRequest {
            model: tier.api_model(),
            max_tokens: self.max_tokens,
            system: system_prompt,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: user_prompt,
            }],
        };

        info!(model = tier.api_model(), "calling Claude API");

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Linear backoff between attempts
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }

            match self.send_once(&request).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() => {
                    warn!(attempt, error = %err, "retryable model API failure");
                    last_err = Some(err);
                }
                Err(err) => {
                    error!(error = %err, "terminal model API failure");
                    return Err(err);
                }
            }
        }

        Err(last_err.unwrap_or(AdvisorError::Upstream {
            status: 0,
            detail: "request retries exhausted".to_string(),
        }))
    }
}

//
// ================= Wire Types =================
//

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u64,
    output_tokens: u64,
}

//
// ================= Mock =================
//

/// Deterministic backend for development and testing.
/// Keeps the service functional without a network dependency.
pub struct MockBackend {
    reply: String,
    usage: TokenUsage,
    failing: bool,
    calls: AtomicU64,
}

impl MockBackend {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            usage: TokenUsage::new(120, 80),
            failing: false,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_usage(mut self, input: u64, output: u64) -> Self {
        self.usage = TokenUsage::new(input, output);
        self
    }

    /// A backend whose every call fails like an exhausted upstream
    pub fn failing() -> Self {
        Self {
            reply: String::new(),
            usage: TokenUsage::default(),
            failing: true,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of completions issued so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn complete(
        &self,
        _tier: ModelTier,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<(String, TokenUsage)> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if self.failing {
            return Err(AdvisorError::Upstream {
                status: 503,
                detail: "mock upstream failure".to_string(),
            });
        }

        Ok((self.reply.clone(), self.usage))
    }
}
