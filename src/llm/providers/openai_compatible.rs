use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;

use crate::config::LlmConfig;
use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::llm::prompt;
use crate::llm::provider::ActionAdvisor;
use crate::llm::sse_parser;
use crate::llm::types::{CallConfig, StreamChunkKind};
use crate::report::AnalysisReport;

/// Any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatibleAdvisor {
    api_base: String,
    api_key: String,
    goal: String,
    include_screenshot: bool,
    call: CallConfig,
    max_retries: u32,
    base_delay: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatibleAdvisor {
    pub fn from_config(cfg: &LlmConfig) -> DeskPilotResult<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DeskPilotError::Config(
                    "no API key: set DESKPILOT_API_KEY or OPENAI_API_KEY, or llm.api_key".into(),
                )
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        tracing::info!(api_base = %cfg.api_base, model = %cfg.model, "advisor ready");
        Ok(Self {
            api_base: cfg.api_base.clone(),
            api_key,
            goal: cfg.goal.clone(),
            include_screenshot: cfg.include_screenshot,
            call: CallConfig {
                model: cfg.model.clone(),
                temperature: cfg.temperature,
                max_tokens: cfg.max_tokens,
                stream: cfg.stream,
            },
            max_retries: cfg.max_retries,
            base_delay: Duration::from_secs(1),
            client,
        })
    }

    /// First retry delay; later retries double it.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }
}

/// Rate limits and transient server errors are worth another attempt.
pub fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// `base * 2^(attempt - 1)`, so 1 s, 2 s, 4 s … for a one-second base.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

/// Copy of the request body with base64 image payloads replaced, for logging.
fn redact_images(body: &serde_json::Value) -> serde_json::Value {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                    if let Some(url) = part.get_mut("image_url").and_then(|i| i.get_mut("url")) {
                        *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                    }
                }
            }
        }
    }
    log_body
}

#[async_trait]
impl ActionAdvisor for OpenAiCompatibleAdvisor {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    async fn propose(
        &self,
        report: &AnalysisReport,
        screenshot_png: Option<&[u8]>,
    ) -> DeskPilotResult<Option<String>> {
        let image = screenshot_png.filter(|_| self.include_screenshot);
        let messages = prompt::build_messages(report, &self.goal, image)?;
        let body = serde_json::json!({
            "model": self.call.model,
            "messages": &messages,
            "temperature": self.call.temperature,
            "max_tokens": self.call.max_tokens,
            "stream": self.call.stream,
        });

        tracing::debug!(
            model = %self.call.model,
            stream = self.call.stream,
            with_image = image.is_some(),
            "sending advisor request"
        );
        tracing::trace!(
            body = %serde_json::to_string(&redact_images(&body)).unwrap_or_default(),
            "request body (base64 omitted)"
        );

        let response = self.send_with_retry(&body).await?;
        let content = if self.call.stream {
            self.handle_stream(response).await?
        } else {
            self.handle_json(response).await?
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            tracing::warn!("advisor returned empty content");
            return Ok(None);
        }
        Ok(Some(trimmed.to_string()))
    }
}

impl OpenAiCompatibleAdvisor {
    async fn send_with_retry(&self, body: &serde_json::Value) -> DeskPilotResult<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = self
                .client
                .post(&self.api_base)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if is_retryable(status) && attempt <= self.max_retries {
                        let delay = backoff_delay(self.base_delay, attempt);
                        tracing::warn!(
                            %status,
                            attempt,
                            max_retries = self.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "advisor request rejected, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let err_body = response.text().await.unwrap_or_default();
                    return Err(DeskPilotError::Advisor(format!("{status}: {err_body}")));
                }
                Err(e) => {
                    if attempt <= self.max_retries {
                        let delay = backoff_delay(self.base_delay, attempt);
                        tracing::warn!(
                            error = %e,
                            attempt,
                            max_retries = self.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "advisor request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// Accumulate content deltas from an SSE stream. Bytes are buffered until
    /// a full line arrives so multi-byte characters split across network
    /// chunks decode intact.
    async fn handle_stream(&self, response: reqwest::Response) -> DeskPilotResult<String> {
        let mut byte_stream = response.bytes_stream();
        let mut line_buf: Vec<u8> = Vec::new();
        let mut content = String::new();
        let mut reasoning_len = 0usize;

        'stream: while let Some(result) = byte_stream.next().await {
            line_buf.extend_from_slice(&result?);

            while let Some(pos) = line_buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = line_buf.drain(..=pos).collect();
                if !apply_sse_line(&line, &mut content, &mut reasoning_len) {
                    break 'stream;
                }
            }
        }
        if !line_buf.is_empty() {
            apply_sse_line(&line_buf, &mut content, &mut reasoning_len);
        }

        tracing::info!(
            content_len = content.len(),
            reasoning_len,
            "advisor stream complete"
        );
        Ok(content)
    }

    async fn handle_json(&self, response: reqwest::Response) -> DeskPilotResult<String> {
        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        tracing::info!(content_len = content.len(), "advisor response received");
        Ok(content)
    }
}

/// Fold one raw SSE line into the accumulators. Returns `false` on `[DONE]`.
fn apply_sse_line(raw: &[u8], content: &mut String, reasoning_len: &mut usize) -> bool {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return true;
    }
    match sse_parser::parse_sse_line(line) {
        Ok(Some(chunk)) => match chunk.kind {
            StreamChunkKind::Content => content.push_str(&chunk.content),
            StreamChunkKind::Reasoning => *reasoning_len += chunk.content.len(),
            StreamChunkKind::Done => return false,
        },
        Ok(None) => {}
        Err(e) => tracing::debug!("SSE parse skipped: {e}"),
    }
    true
}
