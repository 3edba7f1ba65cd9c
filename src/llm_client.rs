use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionResponseFormat, ChatCompletionResponseFormatType,
    CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client as AsyncOpenAiClient};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::config::AppConfig;

pub type SharedLlmClient = Arc<dyn LlmClient>;

/// One system + user exchange with the completion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    /// `None` uses the client's configured temperature.
    pub temperature: Option<f32>,
    pub max_tokens: Option<u16>,
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u16) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String>;
}

/// Offline stand-in. Never returns JSON, so structured agents fall back to their defaults.
#[derive(Debug, Default, Clone)]
pub struct EchoLlmClient;

#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String> {
        Ok(format!(
            "[offline response]\n{}\n\nConnect an LLM backend (set OPENAI_API_KEY) for generated content.",
            request.user.trim()
        ))
    }
}

impl EchoLlmClient {
    pub fn shared() -> SharedLlmClient {
        Arc::new(Self)
    }
}

/// OpenAI-compatible client that can point at OpenAI, vLLM, or any HTTP-compatible backend.
pub struct OpenAiLlmClient {
    client: AsyncOpenAiClient<OpenAIConfig>,
    model: String,
    default_temperature: f32,
    default_max_tokens: u16,
}

impl OpenAiLlmClient {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("Set OPENAI_API_KEY (or HIRETRON_OPENAI_API_KEY) to use the OpenAI client")?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url.clone());
        }

        Ok(Self {
            client: AsyncOpenAiClient::with_config(openai_config),
            model: config.chat_model.clone(),
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
        })
    }

    fn temperature_for(&self, request: &ChatRequest) -> f32 {
        request.temperature.unwrap_or(self.default_temperature)
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model, json = request.json_mode))]
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<String> {
        let system_message = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system.as_str())
            .build()?;
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user.as_str())
            .build()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .temperature(self.temperature_for(request))
            .max_tokens(request.max_tokens.unwrap_or(self.default_max_tokens))
            .messages(vec![system_message.into(), user_message.into()]);

        if request.json_mode {
            builder.response_format(ChatCompletionResponseFormat {
                r#type: ChatCompletionResponseFormatType::JsonObject,
            });
        }

        let response = self.client.chat().create(builder.build()?).await?;
        let choice = response
            .choices
            .first()
            .context("LLM response did not contain any choices")?;

        let output = choice
            .message
            .content
            .clone()
            .filter(|content| !content.trim().is_empty())
            .context("LLM returned empty content")?;

        debug!(chars = output.len(), "LLM completion received");
        Ok(output)
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String> {
        self.chat(request).await
    }
}

/// Exponential backoff between attempts, clamped to `[min_delay, max_delay]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = Duration::from_secs(1u64 << attempt.min(16));
        exp.clamp(self.min_delay, self.max_delay)
    }
}

/// Wraps another client with a per-attempt deadline and retries.
pub struct ResilientLlmClient {
    inner: SharedLlmClient,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl ResilientLlmClient {
    pub fn new(inner: SharedLlmClient, policy: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self {
            inner,
            policy,
            attempt_timeout,
        }
    }
}

#[async_trait]
impl LlmClient for ResilientLlmClient {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(self.attempt_timeout, self.inner.complete(request))
                .await
                .unwrap_or_else(|_| {
                    Err(anyhow::anyhow!(
                        "LLM call timed out after {}s",
                        self.attempt_timeout.as_secs_f32()
                    ))
                });

            match outcome {
                Ok(output) => return Ok(output),
                Err(err) if attempt >= self.policy.max_attempts => {
                    return Err(err.context(format!("LLM call failed after {attempt} attempts")));
                }
                Err(err) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        ?err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "LLM call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Selects the backend: the echo client offline, otherwise OpenAI with retries.
pub fn build_llm_client(config: &AppConfig, offline: bool) -> anyhow::Result<SharedLlmClient> {
    if offline {
        warn!("Offline mode: using EchoLlmClient, agents will emit fallback content");
        return Ok(EchoLlmClient::shared());
    }

    let client: SharedLlmClient = Arc::new(OpenAiLlmClient::from_config(config)?);
    Ok(Arc::new(ResilientLlmClient::new(
        client,
        RetryPolicy::with_attempts(config.max_retries),
        config.agent_timeout,
    )))
}

/// Strips ```json ... ``` or ``` ... ``` fences some models wrap around JSON.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));

    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(str::trim)
            .unwrap_or_else(|| stripped.trim()),
        None => text,
    }
}

/// Parses a completion as a JSON object; arrays and scalars are rejected.
pub fn parse_json_object(text: &str) -> anyhow::Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(strip_json_fences(text))
        .context("LLM response was not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Expected a JSON object, got {}", json_kind(&other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedLlmClient;
    use super::*;

    const SYSTEM: &str = "You are a test harness.";

    #[test]
    fn strips_fences_with_and_without_tag() {
        assert_eq!(strip_json_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_json_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_json_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn parse_json_object_rejects_arrays_and_prose() {
        assert!(parse_json_object("[1, 2]").is_err());
        assert!(parse_json_object("Sure! Here is the JSON").is_err());
        let map = parse_json_object("```json\n{\"job_title\": \"SRE\"}\n```").expect("object");
        assert_eq!(map["job_title"], "SRE");
    }

    #[test]
    fn retry_delays_are_clamped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(4));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(4), Duration::from_secs(10));
        assert_eq!(policy.delay_after(40), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn resilient_client_retries_until_success() {
        let scripted = ScriptedLlmClient::new()
            .fail(SYSTEM, "503 upstream")
            .reply(SYSTEM, "ok")
            .shared();
        let client = ResilientLlmClient::new(
            scripted.clone(),
            RetryPolicy::with_attempts(3),
            Duration::from_secs(60),
        );

        let output = client
            .complete(&ChatRequest::new(SYSTEM, "ping"))
            .await
            .expect("second attempt succeeds");
        assert_eq!(output, "ok");
        assert_eq!(scripted.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn resilient_client_gives_up_after_max_attempts() {
        let scripted = ScriptedLlmClient::new().fail(SYSTEM, "boom").shared();
        let client = ResilientLlmClient::new(
            scripted.clone(),
            RetryPolicy::with_attempts(3),
            Duration::from_secs(60),
        );

        let err = client
            .complete(&ChatRequest::new(SYSTEM, "ping"))
            .await
            .expect_err("all attempts fail");
        assert!(format!("{err:#}").contains("after 3 attempts"));
        assert_eq!(scripted.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn resilient_client_times_out_slow_attempts() {
        let scripted = ScriptedLlmClient::new()
            .with_delay(Duration::from_secs(120))
            .reply(SYSTEM, "late")
            .shared();
        let client = ResilientLlmClient::new(
            scripted.clone(),
            RetryPolicy::with_attempts(1),
            Duration::from_secs(5),
        );

        let err = client
            .complete(&ChatRequest::new(SYSTEM, "ping"))
            .await
            .expect_err("deadline exceeded");
        assert!(format!("{err:#}").contains("timed out"));
    }

    #[test]
    fn configured_temperature_is_the_default() {
        let config = AppConfig {
            api_key: Some("sk-test".to_string()),
            temperature: 0.1,
            ..AppConfig::default()
        };
        let client = OpenAiLlmClient::from_config(&config).expect("client");

        assert_eq!(client.temperature_for(&ChatRequest::new(SYSTEM, "hi")), 0.1);
        assert_eq!(
            client.temperature_for(&ChatRequest::new(SYSTEM, "hi").temperature(0.3)),
            0.3
        );
    }

    #[tokio::test]
    async fn echo_client_never_produces_json() {
        let output = EchoLlmClient
            .complete(&ChatRequest::new(SYSTEM, "Senior Rust Engineer").json())
            .await
            .expect("echo");
        assert!(output.contains("Senior Rust Engineer"));
        assert!(parse_json_object(&output).is_err());
    }
}
