use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::{Config, ADVISORY_FALLBACK};
use crate::error::{AppError, Result};
use crate::types::{AdvisoryContext, AdvisoryReply};

const SYSTEM_PROMPT: &str = "You advise policymakers on sugar supply, prices and export quotas. \
Be concise and concrete. Say so when the parameters are not enough to answer.";
const MAX_TOKENS: u32 = 400;
const TEMPERATURE: f64 = 0.3;

/// Forwards a rendered [`AdvisoryContext`] to an OpenAI-compatible
/// chat-completions endpoint. Never fails: every problem degrades to the
/// static [`ADVISORY_FALLBACK`] reply.
pub struct AdvisoryClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    latency: Arc<LatencyStats>,
    health: Arc<HealthState>,
}

impl AdvisoryClient {
    pub fn new(
        url: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
        latency: Arc<LatencyStats>,
        health: Arc<HealthState>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url,
            api_key,
            model,
            timeout,
            latency,
            health,
        })
    }

    pub fn from_config(cfg: &Config, latency: Arc<LatencyStats>, health: Arc<HealthState>) -> Result<Self> {
        Self::new(
            cfg.advisory_url.clone(),
            cfg.advisory_api_key.clone(),
            cfg.advisory_model.clone(),
            Duration::from_secs(cfg.advisory_timeout_secs),
            latency,
            health,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn advise(&self, ctx: &AdvisoryContext) -> AdvisoryReply {
        if !self.is_configured() {
            debug!("Advisory service not configured, returning fallback");
            return self.fallback(0);
        }

        let start = Instant::now();
        // The client timeout covers the HTTP exchange; this bounds body parsing too.
        let outcome = match tokio::time::timeout(self.timeout, self.ask(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::AdvisoryUnavailable(format!(
                "no reply within {}ms",
                self.timeout.as_millis()
            ))),
        };
        let elapsed = start.elapsed();
        self.latency.record(elapsed);
        let latency_ms = elapsed.as_millis() as u64;

        match outcome {
            Ok(text) => {
                info!(
                    latency_ms,
                    chars = text.chars().count(),
                    "Advisory reply received in {latency_ms}ms"
                );
                AdvisoryReply {
                    text,
                    fallback: false,
                    latency_ms,
                }
            }
            Err(e) => {
                warn!(latency_ms, "Advisory call failed, using fallback: {e}");
                self.fallback(latency_ms)
            }
        }
    }

    fn fallback(&self, latency_ms: u64) -> AdvisoryReply {
        self.health.inc_advisory_fallbacks();
        AdvisoryReply {
            text: ADVISORY_FALLBACK.to_string(),
            fallback: true,
            latency_ms,
        }
    }

    async fn ask(&self, ctx: &AdvisoryContext) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::AdvisoryUnavailable("no API key configured".to_string()))?;

        let req = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: ctx.prompt_text.clone(),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let snippet: String = body.chars().take(300).collect();
            return Err(AppError::AdvisoryUnavailable(format!(
                "{}: {snippet}",
                status.as_u16()
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(AppError::AdvisoryUnavailable("empty reply".to_string()));
        }
        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageOut>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    #[serde(default)]
    content: String,
}
