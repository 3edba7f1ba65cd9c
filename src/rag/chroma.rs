use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use super::client::VectorStore;
use super::config::ChromaConfig;
use super::types::{Collection, SearchHit, StoredDocument};

/// Minimal HTTP client for ChromaDB's v1 REST surface.
pub struct ChromaVectorStore {
    http: reqwest::Client,
    config: ChromaConfig,
    collection_ids: Mutex<HashMap<Collection, String>>,
}

#[derive(Debug, Deserialize)]
struct ChromaCollection {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChromaGetResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Map<String, Value>>>>,
    #[serde(default)]
    embeddings: Option<Vec<Option<Vec<f32>>>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChromaQueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

#[derive(Debug, Serialize)]
struct ChromaUpsertRequest<'a> {
    ids: [&'a str; 1],
    embeddings: [&'a [f32]; 1],
    documents: [&'a str; 1],
    metadatas: [&'a Map<String, Value>; 1],
}

impl ChromaGetResponse {
    fn into_documents(self) -> Vec<StoredDocument> {
        let mut documents = self.documents.unwrap_or_default().into_iter();
        let mut metadatas = self.metadatas.unwrap_or_default().into_iter();
        let mut embeddings = self.embeddings.unwrap_or_default().into_iter();

        self.ids
            .into_iter()
            .map(|id| StoredDocument {
                id,
                text: documents.next().flatten().unwrap_or_default(),
                metadata: metadatas.next().flatten().unwrap_or_default(),
                embedding: embeddings.next().flatten().unwrap_or_default(),
            })
            .collect()
    }
}

impl ChromaQueryResponse {
    /// Chroma nests results per query embedding; we only ever send one.
    fn into_hits(self) -> Vec<SearchHit> {
        let mut documents = first_row(self.documents).into_iter();
        let mut metadatas = first_row(self.metadatas).into_iter();
        let mut distances = first_row(self.distances).into_iter();

        self.ids
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|id| SearchHit {
                id,
                text: documents.next().flatten().unwrap_or_default(),
                metadata: metadatas.next().flatten().unwrap_or_default(),
                distance: distances.next().unwrap_or(1.0),
            })
            .collect()
    }
}

fn first_row<T>(rows: Option<Vec<Vec<T>>>) -> Vec<T> {
    rows.and_then(|rows| rows.into_iter().next()).unwrap_or_default()
}

impl ChromaVectorStore {
    pub fn new(config: ChromaConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(config.http_timeout_ms.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Chroma HTTP client")?;

        Ok(Self {
            http,
            config,
            collection_ids: Mutex::new(HashMap::new()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/api/v1/{path}")
    }

    fn cached_id(&self, collection: Collection) -> anyhow::Result<Option<String>> {
        Ok(self
            .collection_ids
            .lock()
            .map_err(|_| anyhow!("chroma collection cache poisoned"))?
            .get(&collection)
            .cloned())
    }

    fn forget_id(&self, collection: Collection) -> anyhow::Result<()> {
        self.collection_ids
            .lock()
            .map_err(|_| anyhow!("chroma collection cache poisoned"))?
            .remove(&collection);
        Ok(())
    }

    /// Check the server answers its heartbeat endpoint.
    pub async fn heartbeat(&self) -> anyhow::Result<()> {
        self.http
            .get(self.endpoint("heartbeat"))
            .send()
            .await
            .context("Failed to reach ChromaDB")?
            .error_for_status()
            .context("ChromaDB heartbeat returned error status")?;
        Ok(())
    }

    async fn collection_id(&self, collection: Collection) -> anyhow::Result<String> {
        if let Some(id) = self.cached_id(collection)? {
            return Ok(id);
        }

        let body = json!({
            "name": collection.name(),
            "get_or_create": true,
            "metadata": {"description": collection.description(), "hnsw:space": "cosine"},
        });
        let created: ChromaCollection = self.post("collections", &body).await?;
        info!(%collection, id = %created.id, "Chroma collection ready");

        self.collection_ids
            .lock()
            .map_err(|_| anyhow!("chroma collection cache poisoned"))?
            .insert(collection, created.id.clone());
        Ok(created.id)
    }

    async fn post<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        payload: &T,
    ) -> anyhow::Result<R> {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Chroma request '{path}' failed"))?
            .error_for_status()
            .with_context(|| format!("Chroma request '{path}' returned error status"))?;

        response
            .json::<R>()
            .await
            .with_context(|| format!("Failed to deserialize Chroma '{path}' response"))
    }
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    #[instrument(skip_all, fields(%collection, id = %document.id))]
    async fn add(&self, collection: Collection, document: StoredDocument) -> anyhow::Result<()> {
        let id = self.collection_id(collection).await?;
        let payload = ChromaUpsertRequest {
            ids: [document.id.as_str()],
            embeddings: [document.embedding.as_slice()],
            documents: [document.text.as_str()],
            metadatas: [&document.metadata],
        };
        // Upsert so an existing id is replaced.
        let _: Value = self.post(&format!("collections/{id}/upsert"), &payload).await?;
        Ok(())
    }

    async fn get(&self, collection: Collection, doc_id: &str) -> anyhow::Result<Option<StoredDocument>> {
        let id = self.collection_id(collection).await?;
        let body = json!({"ids": [doc_id], "include": ["documents", "metadatas", "embeddings"]});
        let response: ChromaGetResponse = self.post(&format!("collections/{id}/get"), &body).await?;
        Ok(response.into_documents().into_iter().next())
    }

    async fn list(&self, collection: Collection) -> anyhow::Result<Vec<StoredDocument>> {
        let id = self.collection_id(collection).await?;
        let body = json!({"include": ["documents", "metadatas"]});
        let response: ChromaGetResponse = self.post(&format!("collections/{id}/get"), &body).await?;
        Ok(response.into_documents())
    }

    #[instrument(skip_all, fields(%collection, top_k))]
    async fn query(
        &self,
        collection: Collection,
        embedding: &[f32],
        top_k: usize,
    ) -> anyhow::Result<Vec<SearchHit>> {
        if top_k == 0 || self.count(collection).await? == 0 {
            return Ok(Vec::new());
        }
        let id = self.collection_id(collection).await?;
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "include": ["documents", "metadatas", "distances"],
        });
        let response: ChromaQueryResponse = self.post(&format!("collections/{id}/query"), &body).await?;
        Ok(response.into_hits())
    }

    async fn count(&self, collection: Collection) -> anyhow::Result<usize> {
        let id = self.collection_id(collection).await?;
        self.http
            .get(self.endpoint(&format!("collections/{id}/count")))
            .send()
            .await
            .context("Chroma count request failed")?
            .error_for_status()
            .context("Chroma count returned error status")?
            .json::<usize>()
            .await
            .context("Failed to deserialize Chroma count response")
    }

    async fn clear(&self, collection: Collection) -> anyhow::Result<()> {
        let response = self
            .http
            .delete(self.endpoint(&format!("collections/{}", collection.name())))
            .send()
            .await
            .context("Chroma delete collection request failed")?;
        if response.status() != StatusCode::NOT_FOUND {
            response
                .error_for_status()
                .context("Chroma delete collection returned error status")?;
        }
        self.forget_id(collection)?;
        info!(%collection, "Chroma collection cleared");
        Ok(())
    }
}
