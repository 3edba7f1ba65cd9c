use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use async_openai::{
    config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client as OpenAiClient,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::EmbeddingConfig;

/// Longest input sent to the embeddings endpoint, in characters.
pub const MAX_EMBED_CHARS: usize = 8000;

#[async_trait]
pub trait EmbeddingsProvider: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// One vector per input; items that failed come back empty.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            match self.embed(text).await {
                Ok(embedding) => embeddings.push(embedding),
                Err(err) => {
                    warn!(?err, "Failed to embed text");
                    embeddings.push(Vec::new());
                }
            }
        }
        embeddings
    }
}

pub type SharedEmbeddings = Arc<dyn EmbeddingsProvider>;

/// Newlines become spaces, outer whitespace is trimmed, long text is cut.
pub fn prepare_text(text: &str) -> String {
    let flattened = text.replace('\n', " ");
    flattened.trim().chars().take(MAX_EMBED_CHARS).collect()
}

pub struct OpenAiEmbeddingsClient {
    client: OpenAiClient<OpenAIConfig>,
    model: String,
    cache: Mutex<HashMap<String, Vec<f32>>>,
    cache_capacity: usize,
}

impl OpenAiEmbeddingsClient {
    pub fn from_config(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("Set OPENAI_API_KEY to use OpenAI embeddings")?;
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url.clone());
        }

        Ok(Self {
            client: OpenAiClient::with_config(openai_config),
            model: config.model.clone(),
            cache: Mutex::new(HashMap::new()),
            cache_capacity: 512,
        })
    }
}

#[async_trait]
impl EmbeddingsProvider for OpenAiEmbeddingsClient {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let text = prepare_text(text);
        anyhow::ensure!(!text.is_empty(), "Cannot embed empty text");
        let cache_key = blake3::hash(text.as_bytes()).to_hex().to_string();

        if let Some(hit) = self
            .cache
            .lock()
            .map_err(|_| anyhow!("embedding cache poisoned"))?
            .get(&cache_key)
            .cloned()
        {
            return Ok(hit);
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text.as_str())
            .build()?;

        let response = self.client.embeddings().create(request).await?;
        let embedding = response
            .data
            .first()
            .context("Embedding response missing data")?
            .embedding
            .clone();
        debug!(dimensions = embedding.len(), "Generated embedding");

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("embedding cache poisoned"))?;
        if cache.len() >= self.cache_capacity {
            cache.clear();
        }
        cache.insert(cache_key, embedding.clone());

        Ok(embedding)
    }
}

/// Offline embedder: lowercase word tokens hashed into fixed buckets, L2-normalised.
pub struct HashingEmbeddings {
    dim: usize,
}

impl HashingEmbeddings {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket(&self, token: &str) -> usize {
        let hash = blake3::hash(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        (u64::from_le_bytes(prefix) % self.dim as u64) as usize
    }
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[async_trait]
impl EmbeddingsProvider for HashingEmbeddings {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let tokens = tokenize(&prepare_text(text));
        anyhow::ensure!(!tokens.is_empty(), "Cannot embed empty text");

        let mut vector = vec![0.0f32; self.dim];
        for token in &tokens {
            vector[self.bucket(token)] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }
}

pub fn build_embeddings(config: &EmbeddingConfig, offline: bool) -> anyhow::Result<SharedEmbeddings> {
    if offline {
        warn!("Offline mode: using hashing embeddings");
        return Ok(Arc::new(HashingEmbeddings::new(config.hashing_dim)));
    }
    Ok(Arc::new(OpenAiEmbeddingsClient::from_config(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::local::cosine_distance;

    #[test]
    fn prepare_text_flattens_and_truncates() {
        assert_eq!(prepare_text("  line one\nline two  "), "line one line two");
        let long = "x".repeat(MAX_EMBED_CHARS + 50);
        assert_eq!(prepare_text(&long).chars().count(), MAX_EMBED_CHARS);
    }

    #[tokio::test]
    async fn hashing_embeddings_are_deterministic_and_normalised() {
        let embedder = HashingEmbeddings::new(64);
        let a = embedder.embed("Rust engineer, Tokio and async").await.expect("embed");
        let b = embedder.embed("rust ENGINEER tokio and async").await.expect("embed");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_vocabulary_is_closer() {
        let embedder = HashingEmbeddings::new(256);
        let jd = embedder.embed("python django postgres aws backend").await.expect("embed");
        let close = embedder.embed("backend developer python django aws").await.expect("embed");
        let far = embedder.embed("watercolour painting gallery curator").await.expect("embed");
        assert!(cosine_distance(&jd, &close) < cosine_distance(&jd, &far));
    }

    #[tokio::test]
    async fn batch_leaves_failed_items_empty() {
        let embedder = HashingEmbeddings::new(16);
        let out = embedder
            .embed_batch(&["hello world".to_string(), " \n ".to_string()])
            .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 16);
        assert!(out[1].is_empty());
    }

    #[test]
    fn openai_embeddings_need_a_key() {
        let config = EmbeddingConfig {
            api_key: None,
            base_url: None,
            model: "text-embedding-3-small".to_string(),
            hashing_dim: 8,
        };
        assert!(OpenAiEmbeddingsClient::from_config(&config).is_err());
        assert!(build_embeddings(&config, true).is_ok());
    }
}
