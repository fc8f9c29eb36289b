use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::{ChatError, ChatMessage};
use crate::config::LlmConfig;

const TEMPERATURE: f64 = 0.2;
const MAX_TOKENS: u32 = 1000;
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// OpenAI-compatible chat completions client.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// One completion with the function definitions attached. A 429 waits
    /// for `retry-after` seconds (at most 30) and tries again, at most
    /// `max_retries` times.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        functions: &[serde_json::Value],
    ) -> Result<ChatMessage, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "functions": functions,
            "function_call": "auto",
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        let mut attempt = 0;
        loop {
            tracing::debug!(model = %self.model, attempt, "Sending chat completion request");

            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| ChatError::Upstream(format!("request failed: {e}")))?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.max_retries {
                    tracing::warn!(attempts = attempt + 1, "Chat provider kept rate limiting");
                    return Err(ChatError::RateLimited);
                }
                let wait = retry_after(response.headers());
                tracing::info!(wait_secs = wait.as_secs(), "Chat provider rate limited, retrying");
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ChatError::Upstream(error_message(status, &text)));
            }

            let parsed: CompletionResponse = response
                .json()
                .await
                .map_err(|e| ChatError::Upstream(format!("invalid response: {e}")))?;

            return parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message)
                .ok_or_else(|| ChatError::Upstream("response had no choices".to_string()));
        }
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS))
}

/// Prefer the provider's `{"error": {"message"}}` body over the raw text.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());
    format!("{status}: {detail}")
}
