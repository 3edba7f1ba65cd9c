use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

/// Runtime settings shared by the LLM client, the agents and the retrieval layer.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub max_tokens: u16,
    pub agent_timeout: Duration,
    pub max_retries: u32,
    pub store_path: PathBuf,
    pub chroma_url: Option<String>,
    pub top_k: usize,
    pub max_file_mb: u64,
    pub pass_threshold: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            chat_model: Self::DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: Self::DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            agent_timeout: Duration::from_secs(60),
            max_retries: 3,
            store_path: PathBuf::from(Self::DEFAULT_STORE_PATH),
            chroma_url: None,
            top_k: 10,
            max_file_mb: 10,
            pass_threshold: 70,
        }
    }
}

impl AppConfig {
    const DEFAULT_CHAT_MODEL: &'static str = "gpt-4o-mini";
    const DEFAULT_EMBEDDING_MODEL: &'static str = "text-embedding-3-small";
    const DEFAULT_STORE_PATH: &'static str = "./vector_store/store.json";

    const API_KEY_VARS: [&'static str; 2] = ["HIRETRON_OPENAI_API_KEY", "OPENAI_API_KEY"];
    const BASE_URL_VARS: [&'static str; 2] = ["HIRETRON_OPENAI_BASE_URL", "OPENAI_BASE_URL"];
    const CHAT_MODEL_VARS: [&'static str; 1] = ["HIRETRON_CHAT_MODEL"];
    const EMBEDDING_MODEL_VARS: [&'static str; 1] = ["HIRETRON_EMBEDDING_MODEL"];
    const TEMPERATURE_VARS: [&'static str; 1] = ["HIRETRON_TEMPERATURE"];
    const MAX_TOKENS_VARS: [&'static str; 1] = ["HIRETRON_MAX_TOKENS"];
    const TIMEOUT_VARS: [&'static str; 1] = ["HIRETRON_AGENT_TIMEOUT_SECS"];
    const MAX_RETRIES_VARS: [&'static str; 1] = ["HIRETRON_MAX_RETRIES"];
    const STORE_PATH_VARS: [&'static str; 1] = ["HIRETRON_STORE_PATH"];
    const CHROMA_URL_VARS: [&'static str; 1] = ["HIRETRON_CHROMA_URL"];
    const TOP_K_VARS: [&'static str; 1] = ["HIRETRON_TOP_K"];
    const MAX_FILE_MB_VARS: [&'static str; 1] = ["HIRETRON_MAX_FILE_MB"];
    const PASS_THRESHOLD_VARS: [&'static str; 1] = ["HIRETRON_PASS_THRESHOLD"];

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source; `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |candidates: &[&'static str]| -> Option<String> {
            candidates
                .iter()
                .find_map(|key| lookup(key).filter(|value| !value.trim().is_empty()))
        };
        let defaults = Self::default();

        Self {
            api_key: read(&Self::API_KEY_VARS),
            base_url: read(&Self::BASE_URL_VARS),
            chat_model: read(&Self::CHAT_MODEL_VARS).unwrap_or(defaults.chat_model),
            embedding_model: read(&Self::EMBEDDING_MODEL_VARS)
                .unwrap_or(defaults.embedding_model),
            temperature: parse_or(
                read(&Self::TEMPERATURE_VARS),
                "temperature",
                defaults.temperature,
            ),
            max_tokens: parse_or(read(&Self::MAX_TOKENS_VARS), "max_tokens", defaults.max_tokens),
            agent_timeout: Duration::from_secs(parse_or(
                read(&Self::TIMEOUT_VARS),
                "agent_timeout_secs",
                defaults.agent_timeout.as_secs(),
            )),
            max_retries: parse_or(
                read(&Self::MAX_RETRIES_VARS),
                "max_retries",
                defaults.max_retries,
            )
            .max(1),
            store_path: read(&Self::STORE_PATH_VARS)
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            chroma_url: read(&Self::CHROMA_URL_VARS),
            top_k: parse_or(read(&Self::TOP_K_VARS), "top_k", defaults.top_k),
            max_file_mb: parse_or(
                read(&Self::MAX_FILE_MB_VARS),
                "max_file_mb",
                defaults.max_file_mb,
            ),
            pass_threshold: parse_or(
                read(&Self::PASS_THRESHOLD_VARS),
                "pass_threshold",
                defaults.pass_threshold,
            )
            .min(100),
        }
    }

    /// Checks that an LLM backend is reachable in principle and prepares the store directory.
    pub fn validate(&self, offline: bool) -> anyhow::Result<()> {
        if !offline && self.api_key.is_none() {
            anyhow::bail!(
                "OPENAI_API_KEY not set. Add it to .env, export it, or pass --offline"
            );
        }

        if let Some(parent) = self.store_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory {}", parent.display())
                })?;
            }
        }

        Ok(())
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_or<T: FromStr + Copy>(raw: Option<String>, field: &str, default: T) -> T {
    match raw {
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(field, value = %value, "Ignoring unparseable config value");
                default
            }
        },
        None => default,
    }
}
