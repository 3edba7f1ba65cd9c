use std::sync::Arc;

use anyhow::Context;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::config::AppConfig;

use super::chroma::ChromaVectorStore;
use super::client::SharedVectorStore;
use super::config::ChromaConfig;
use super::embed::SharedEmbeddings;
use super::local::LocalVectorStore;
use super::types::{Collection, RetrievedCandidate, StoreStats, StoredDocument};

/// Indexes job descriptions and resumes, and ranks resumes against a stored job.
pub struct RetrievalService {
    store: SharedVectorStore,
    embeddings: SharedEmbeddings,
}

impl RetrievalService {
    pub fn new(store: SharedVectorStore, embeddings: SharedEmbeddings) -> Self {
        Self { store, embeddings }
    }

    pub fn store(&self) -> &SharedVectorStore {
        &self.store
    }

    #[instrument(skip_all, fields(id = %id))]
    pub async fn index_job_description(
        &self,
        id: &str,
        text: &str,
        metadata: Map<String, Value>,
    ) -> anyhow::Result<()> {
        self.index(Collection::JobDescriptions, id, text, metadata).await
    }

    #[instrument(skip_all, fields(id = %id))]
    pub async fn index_resume(
        &self,
        id: &str,
        text: &str,
        metadata: Map<String, Value>,
    ) -> anyhow::Result<()> {
        self.index(Collection::Resumes, id, text, metadata).await
    }

    async fn index(
        &self,
        collection: Collection,
        id: &str,
        text: &str,
        metadata: Map<String, Value>,
    ) -> anyhow::Result<()> {
        let embedding = self
            .embeddings
            .embed(text)
            .await
            .with_context(|| format!("Failed to embed {collection} document {id}"))?;
        self.store
            .add(
                collection,
                StoredDocument {
                    id: id.to_string(),
                    text: text.to_string(),
                    metadata,
                    embedding,
                },
            )
            .await
            .with_context(|| format!("Failed to store {collection} document {id}"))?;
        info!(%collection, id, "Document indexed");
        Ok(())
    }

    /// Indexes several resumes with one batched embedding pass. Resumes whose
    /// embedding failed are skipped; returns how many were stored.
    #[instrument(skip_all, fields(resumes = resumes.len()))]
    pub async fn index_resumes(
        &self,
        resumes: Vec<(String, String, Map<String, Value>)>,
    ) -> anyhow::Result<usize> {
        let texts: Vec<String> = resumes.iter().map(|(_, text, _)| text.clone()).collect();
        let embeddings = self.embeddings.embed_batch(&texts).await;

        let mut stored = 0;
        for ((id, text, metadata), embedding) in resumes.into_iter().zip(embeddings) {
            if embedding.is_empty() {
                warn!(id = %id, "Skipping resume that could not be embedded");
                continue;
            }
            self.store
                .add(
                    Collection::Resumes,
                    StoredDocument {
                        id: id.clone(),
                        text,
                        metadata,
                        embedding,
                    },
                )
                .await
                .with_context(|| format!("Failed to store resumes document {id}"))?;
            stored += 1;
        }
        info!(stored, "Resumes indexed");
        Ok(stored)
    }

    pub async fn list_documents(&self, collection: Collection) -> anyhow::Result<Vec<StoredDocument>> {
        self.store.list(collection).await
    }

    pub async fn job_description_text(&self, jd_id: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .store
            .get(Collection::JobDescriptions, jd_id)
            .await?
            .map(|doc| doc.text))
    }

    /// Resumes closest to the stored job description; an unknown job id yields no candidates.
    #[instrument(skip_all, fields(jd_id = %jd_id, top_k))]
    pub async fn retrieve_candidates_for_job(
        &self,
        jd_id: &str,
        top_k: usize,
    ) -> anyhow::Result<Vec<RetrievedCandidate>> {
        let Some(text) = self.job_description_text(jd_id).await? else {
            warn!("Job description not found");
            return Ok(Vec::new());
        };

        let embedding = self.embeddings.embed(&text).await?;
        let hits = self.store.query(Collection::Resumes, &embedding, top_k).await?;
        let candidates: Vec<RetrievedCandidate> = hits.into_iter().map(Into::into).collect();
        info!(count = candidates.len(), "Candidates retrieved");
        Ok(candidates)
    }

    pub async fn stats(&self) -> anyhow::Result<StoreStats> {
        Ok(StoreStats {
            job_descriptions: self.store.count(Collection::JobDescriptions).await?,
            resumes: self.store.count(Collection::Resumes).await?,
        })
    }
}

/// Chroma when a URL is configured (and not offline), otherwise the JSON file store.
/// A configured Chroma server must answer its heartbeat.
pub async fn build_vector_store(config: &AppConfig, offline: bool) -> anyhow::Result<SharedVectorStore> {
    if !offline {
        if let Some(chroma) = ChromaConfig::from_app(config) {
            let url = chroma.base_url.clone();
            let store = ChromaVectorStore::new(chroma)?;
            store
                .heartbeat()
                .await
                .with_context(|| format!("ChromaDB at {url} is not reachable"))?;
            info!(url = %url, "Using ChromaDB vector store");
            return Ok(Arc::new(store));
        }
    }
    Ok(Arc::new(LocalVectorStore::open(&config.store_path)?))
}
