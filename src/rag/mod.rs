pub mod chroma;
pub mod client;
pub mod config;
pub mod embed;
pub mod local;
pub mod retriever;
pub mod types;

pub use config::EmbeddingConfig;
pub use embed::build_embeddings;
pub use retriever::{build_vector_store, RetrievalService};
pub use types::Collection;
