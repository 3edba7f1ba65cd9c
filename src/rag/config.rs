use std::env;

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub base_url: String,
    pub http_timeout_ms: u64,
}

impl ChromaConfig {
    const TIMEOUT_VARS: [&'static str; 2] = ["HIRETRON_CHROMA_TIMEOUT_MS", "CHROMA_HTTP_TIMEOUT_MS"];
    const DEFAULT_TIMEOUT_MS: u64 = 10_000;

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http_timeout_ms: Self::DEFAULT_TIMEOUT_MS,
        }
    }

    /// `None` when no Chroma URL is configured, meaning the local store is used.
    pub fn from_app(config: &AppConfig) -> Option<Self> {
        let base_url = config.chroma_url.clone()?;
        let http_timeout_ms = Self::read_env(&Self::TIMEOUT_VARS)
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(Self::DEFAULT_TIMEOUT_MS);
        Some(Self {
            base_url,
            http_timeout_ms,
        })
    }

    fn read_env(candidates: &[&'static str]) -> Option<String> {
        candidates.iter().find_map(|key| env::var(key).ok())
    }
}

/// Embedding backend settings, taken from the shared app config.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    /// Size of the offline hashing vectors.
    pub hashing_dim: usize,
}

impl EmbeddingConfig {
    pub const DEFAULT_HASHING_DIM: usize = 256;

    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.embedding_model.clone(),
            hashing_dim: Self::DEFAULT_HASHING_DIM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chroma_is_optional() {
        let mut app = AppConfig::default();
        assert!(ChromaConfig::from_app(&app).is_none());

        app.chroma_url = Some("http://localhost:8000".to_string());
        let chroma = ChromaConfig::from_app(&app).expect("configured");
        assert_eq!(chroma.base_url, "http://localhost:8000");
        assert!(chroma.http_timeout_ms > 0);
    }

    #[test]
    fn embedding_config_follows_app_config() {
        let app = AppConfig {
            api_key: Some("sk-test".to_string()),
            ..AppConfig::default()
        };
        let embed = EmbeddingConfig::from_app(&app);
        assert_eq!(embed.model, "text-embedding-3-small");
        assert_eq!(embed.api_key.as_deref(), Some("sk-test"));
        assert_eq!(embed.hashing_dim, EmbeddingConfig::DEFAULT_HASHING_DIM);
    }
}
