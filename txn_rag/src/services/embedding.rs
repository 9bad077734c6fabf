//! Sentence-embedding provider.
//!
//! A single model instance is shared across all users; it is large and
//! read-only after load. Inference is CPU-bound and is dispatched to the
//! blocking pool by the async wrappers below.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

/// All stores hold vectors of this width.
pub const EMBEDDING_DIMENSION: usize = 384;

const EMBED_BATCH_SIZE: usize = 256;

/// Text → vector provider. Deterministic for fixed input and model.
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(vec![text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedding model returned no vector"))
    }

    fn dimension(&self) -> usize;
}

/// Local MiniLM-class encoder backed by fastembed.
pub struct LocalEmbedder {
    model: TextEmbedding,
    dimension: usize,
}

impl LocalEmbedder {
    /// Load the model. Failure here is fatal for the service: without an
    /// encoder there is nothing to serve.
    pub fn new(model_id: &str) -> Result<Self> {
        let embedding_model = match model_id {
            id if id.contains("all-MiniLM-L6-v2") || id.contains("AllMiniLML6V2") => {
                EmbeddingModel::AllMiniLML6V2
            }
            id if id.contains("bge-small") || id.contains("BGESmallENV15") => {
                EmbeddingModel::BGESmallENV15
            }
            _ => EmbeddingModel::AllMiniLML6V2,
        };

        let cache_dir = std::env::var("FASTEMBED_CACHE_PATH")
            .ok()
            .or_else(|| std::env::var("HOME").ok().map(|home| format!("{home}/.cache/fastembed")))
            .unwrap_or_else(|| ".fastembed_cache".to_string());

        let model = TextEmbedding::try_new(
            InitOptions::new(embedding_model)
                .with_cache_dir(std::path::PathBuf::from(cache_dir))
                .with_show_download_progress(false),
        )
        .map_err(|e| anyhow!("failed to initialize embedding model {model_id}: {e}"))?;

        // Probe once so the advertised dimension is the measured one.
        let probe = model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| anyhow!("embedding model probe failed: {e}"))?;
        let dimension = probe.first().map(Vec::len).unwrap_or(0);
        if dimension != EMBEDDING_DIMENSION {
            return Err(anyhow!(
                "embedding model {model_id} produces {dimension}-dim vectors, expected {EMBEDDING_DIMENSION}"
            ));
        }

        Ok(Self { model, dimension })
    }
}

impl Embedder for LocalEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.model
            .embed(texts, Some(EMBED_BATCH_SIZE))
            .map_err(|e| anyhow!("failed to generate embeddings: {e}"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embed a document batch on the blocking pool.
pub async fn embed_documents(
    embedder: Arc<dyn Embedder>,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>> {
    tokio::task::spawn_blocking(move || embedder.embed_batch(texts))
        .await
        .map_err(|e| anyhow!("embedding task panicked: {e}"))?
}

/// Embed a single query string on the blocking pool.
pub async fn embed_query(embedder: Arc<dyn Embedder>, text: String) -> Result<Vec<f32>> {
    tokio::task::spawn_blocking(move || embedder.embed_one(&text))
        .await
        .map_err(|e| anyhow!("embedding task panicked: {e}"))?
}
