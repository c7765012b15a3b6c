//! Text embedding backends used for both documents and questions.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::core::{AppConfig, EmbedderKind};

const FASTEMBED_DIMENSIONS: usize = 384;
pub const HASHING_DIMENSIONS: usize = 2048;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector returned by `embed`
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

pub type SharedEmbedder = Arc<dyn Embedder>;

/// Local sentence embedding model. The model files are downloaded to
/// the cache dir on first use.
pub struct FastEmbedder {
    model: Arc<TextEmbedding>,
}

impl FastEmbedder {
    pub fn new(cache_dir: &str) -> Result<Self> {
        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_cache_dir(PathBuf::from(cache_dir))
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(options)?;
        Ok(Self {
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    fn dimensions(&self) -> usize {
        FASTEMBED_DIMENSIONS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        // Inference is CPU bound so keep it off the async workers
        let mut embeddings =
            tokio::task::spawn_blocking(move || model.embed(vec![text], None)).await??;
        embeddings
            .pop()
            .ok_or_else(|| anyhow!("Embedding model returned no vectors"))
    }
}

/// Bag of words embedding using the hashing trick. Words map to a
/// bucket via FNV-1a and vectors are L2 normalized, so documents that
/// share words with the question end up closest to it.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % self.dimensions as u64) as usize
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() > 2)
        {
            vector[self.bucket(token)] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

pub fn embedder_from_config(config: &AppConfig) -> Result<SharedEmbedder> {
    match config.embedder {
        EmbedderKind::FastEmbed => {
            let cache_dir = format!("{}/models", config.storage_path.trim_end_matches('/'));
            tracing::info!("Loading embedding model from {}", cache_dir);
            Ok(Arc::new(FastEmbedder::new(&cache_dir)?))
        }
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::default())),
    }
}
