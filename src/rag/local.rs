use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::client::VectorStore;
use super::types::{Collection, SearchHit, StoredDocument};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    collections: BTreeMap<Collection, Vec<StoredDocument>>,
}

/// Embedded vector store backed by one JSON file; brute-force cosine search.
pub struct LocalVectorStore {
    path: Option<PathBuf>,
    state: Mutex<StoreFile>,
}

impl LocalVectorStore {
    /// Loads `path` if it exists, otherwise starts empty and creates it on first write.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read(&path)
                .with_context(|| format!("Failed to read vector store {}", path.display()))?;
            serde_json::from_slice(&raw)
                .with_context(|| format!("Vector store {} is not valid JSON", path.display()))?
        } else {
            StoreFile::default()
        };

        info!(path = %path.display(), "Local vector store opened");
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoreFile::default()),
        }
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, StoreFile>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("local vector store lock poisoned"))
    }

    fn persist(&self, state: &StoreFile) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec(state).context("Failed to serialise vector store")?;
        fs::write(&tmp, body).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
        debug!(path = %path.display(), "Vector store persisted");
        Ok(())
    }
}

/// `1 - cos(a, b)`; zero vectors are maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn add(&self, collection: Collection, document: StoredDocument) -> anyhow::Result<()> {
        anyhow::ensure!(!document.id.trim().is_empty(), "Document id must not be empty");
        let mut state = self.lock()?;
        let documents = state.collections.entry(collection).or_default();
        match documents.iter_mut().find(|existing| existing.id == document.id) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
        self.persist(&state)
    }

    async fn get(&self, collection: Collection, id: &str) -> anyhow::Result<Option<StoredDocument>> {
        let state = self.lock()?;
        Ok(state
            .collections
            .get(&collection)
            .and_then(|documents| documents.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn list(&self, collection: Collection) -> anyhow::Result<Vec<StoredDocument>> {
        let state = self.lock()?;
        Ok(state.collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn query(
        &self,
        collection: Collection,
        embedding: &[f32],
        top_k: usize,
    ) -> anyhow::Result<Vec<SearchHit>> {
        let state = self.lock()?;
        let Some(documents) = state.collections.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = documents
            .iter()
            .filter(|doc| {
                let comparable = doc.embedding.len() == embedding.len();
                if !comparable {
                    warn!(id = %doc.id, "Skipping document with mismatched embedding size");
                }
                comparable
            })
            .map(|doc| SearchHit {
                id: doc.id.clone(),
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
                distance: cosine_distance(embedding, &doc.embedding),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self, collection: Collection) -> anyhow::Result<usize> {
        let state = self.lock()?;
        Ok(state.collections.get(&collection).map_or(0, Vec::len))
    }

    async fn clear(&self, collection: Collection) -> anyhow::Result<()> {
        let mut state = self.lock()?;
        state.collections.remove(&collection);
        info!(%collection, "Collection cleared");
        self.persist(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn doc(id: &str, embedding: Vec<f32>) -> StoredDocument {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), json!(format!("Person {id}")));
        StoredDocument {
            id: id.to_string(),
            text: format!("text for {id}"),
            metadata,
            embedding,
        }
    }

    #[test]
    fn cosine_distance_bounds() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn query_orders_by_distance_and_respects_top_k() {
        let store = LocalVectorStore::in_memory();
        store.add(Collection::Resumes, doc("far", vec![0.0, 1.0])).await.expect("add");
        store.add(Collection::Resumes, doc("near", vec![1.0, 0.1])).await.expect("add");
        store.add(Collection::Resumes, doc("mid", vec![1.0, 1.0])).await.expect("add");
        store.add(Collection::Resumes, doc("odd", vec![1.0])).await.expect("add");

        let hits = store
            .query(Collection::Resumes, &[1.0, 0.0], 2)
            .await
            .expect("query");
        let ids: Vec<&str> = hits.iter().map(|hit| hit.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);

        let none = store
            .query(Collection::JobDescriptions, &[1.0, 0.0], 5)
            .await
            .expect("query");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn add_replaces_existing_id() {
        let store = LocalVectorStore::in_memory();
        store.add(Collection::JobDescriptions, doc("jd-1", vec![1.0])).await.expect("add");
        let mut updated = doc("jd-1", vec![0.5]);
        updated.text = "revised".to_string();
        store.add(Collection::JobDescriptions, updated).await.expect("add");

        assert_eq!(store.count(Collection::JobDescriptions).await.expect("count"), 1);
        let stored = store
            .get(Collection::JobDescriptions, "jd-1")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(stored.text, "revised");
    }

    #[tokio::test]
    async fn persists_and_reloads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("store.json");

        {
            let store = LocalVectorStore::open(&path).expect("open");
            store.add(Collection::Resumes, doc("r-1", vec![0.1, 0.2])).await.expect("add");
            store.add(Collection::JobDescriptions, doc("jd-1", vec![0.3, 0.4])).await.expect("add");
            store.clear(Collection::JobDescriptions).await.expect("clear");
        }

        let reopened = LocalVectorStore::open(&path).expect("reopen");
        assert_eq!(reopened.count(Collection::Resumes).await.expect("count"), 1);
        assert_eq!(reopened.count(Collection::JobDescriptions).await.expect("count"), 0);
        let listed = reopened.list(Collection::Resumes).await.expect("list");
        assert_eq!(listed[0].metadata["name"], "Person r-1");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").expect("write");
        assert!(LocalVectorStore::open(&path).is_err());
    }
}
