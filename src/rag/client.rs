use std::sync::Arc;

use async_trait::async_trait;

use super::types::{Collection, SearchHit, StoredDocument};

/// Storage for embedded documents, one namespace per [`Collection`].
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts the document, replacing any existing one with the same id.
    async fn add(&self, collection: Collection, document: StoredDocument) -> anyhow::Result<()>;
    async fn get(&self, collection: Collection, id: &str) -> anyhow::Result<Option<StoredDocument>>;
    async fn list(&self, collection: Collection) -> anyhow::Result<Vec<StoredDocument>>;
    /// Nearest documents first.
    async fn query(
        &self,
        collection: Collection,
        embedding: &[f32],
        top_k: usize,
    ) -> anyhow::Result<Vec<SearchHit>>;
    async fn count(&self, collection: Collection) -> anyhow::Result<usize>;
    async fn clear(&self, collection: Collection) -> anyhow::Result<()>;
}

pub type SharedVectorStore = Arc<dyn VectorStore>;
