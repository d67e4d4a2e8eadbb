//! Embedding production.
//!
//! - `EmbeddingProducer`: the async contract every provider implements
//! - `produce_embedding`: timeout + failure boundary, yields `Option`
//! - `LocalEmbedder`: fastembed model, lazily loaded, run on the blocking pool

use async_trait::async_trait;
use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;

use super::preprocess::normalize_whitespace;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Model download timed out after {0} seconds")]
    DownloadTimeout(u64),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("Text cannot be empty")]
    EmptyInput,

    #[error("Embedding request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait EmbeddingProducer: Send + Sync {
    /// Provider name used in log lines
    fn name(&self) -> &str;

    async fn produce(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Produce an embedding, degrading to `None` on failure.
///
/// Text is whitespace-normalized first. Failure, timeout and an empty vector
/// from the provider are all logged and reported as `None`; callers persist
/// the note without an embedding. Nothing is retried.
pub async fn produce_embedding(
    producer: &dyn EmbeddingProducer,
    text: &str,
    timeout: Duration,
) -> Option<Vec<f32>> {
    let text = normalize_whitespace(text);
    if text.is_empty() {
        log::warn!("skipping embedding: {}", EmbeddingError::EmptyInput);
        return None;
    }

    match tokio::time::timeout(timeout, producer.produce(&text)).await {
        Ok(Ok(embedding)) if embedding.is_empty() => {
            log::warn!("embedding provider '{}' returned an empty vector", producer.name());
            None
        }
        Ok(Ok(embedding)) => Some(embedding),
        Ok(Err(err)) => {
            log::warn!("failed to generate embedding with '{}': {err}", producer.name());
            None
        }
        Err(_) => {
            log::warn!(
                "embedding provider '{}' timed out after {}ms",
                producer.name(),
                timeout.as_millis()
            );
            None
        }
    }
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl EmbeddingModel {
    /// Load a model by name, downloading it into `cache_dir/models` on first use.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let model_enum = Self::parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(false);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    pub fn name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Generate an embedding for a single text.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-small-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGESmallENV15Q),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-base-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGEBaseENV15Q),
            _ => Err(EmbeddingError::InvalidModel(format!(
                "Unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5 (add -q suffix for quantized)",
                name
            ))),
        }
    }

    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        let test_embeddings = model
            .embed(vec!["test"], None)
            .map_err(|e| EmbeddingError::InitFailed(format!("Failed to probe dimensions: {}", e)))?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))
    }
}

/// Local embedding provider backed by fastembed.
///
/// The model is loaded on the first `produce` call, not at startup.
pub struct LocalEmbedder {
    model_name: String,
    cache_dir: PathBuf,
    download_timeout: Duration,
    model: OnceCell<Arc<EmbeddingModel>>,
}

impl LocalEmbedder {
    pub fn new(model_name: &str, cache_dir: PathBuf, download_timeout: Duration) -> Self {
        Self {
            model_name: model_name.to_string(),
            cache_dir,
            download_timeout,
            model: OnceCell::new(),
        }
    }

    async fn model(&self) -> Result<Arc<EmbeddingModel>, EmbeddingError> {
        self.model
            .get_or_try_init(|| async {
                log::info!("loading embedding model '{}'", self.model_name);

                let model_name = self.model_name.clone();
                let cache_dir = self.cache_dir.clone();
                let load = tokio::task::spawn_blocking(move || {
                    EmbeddingModel::new(&model_name, cache_dir)
                });

                let model = tokio::time::timeout(self.download_timeout, load)
                    .await
                    .map_err(|_| EmbeddingError::DownloadTimeout(self.download_timeout.as_secs()))?
                    .map_err(|e| EmbeddingError::InitFailed(e.to_string()))??;

                log::info!(
                    "embedding model '{}' ready ({} dimensions)",
                    model.name(),
                    model.dimensions()
                );
                Ok::<_, EmbeddingError>(Arc::new(model))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl EmbeddingProducer for LocalEmbedder {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn produce(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let model = self.model().await?;
        let text = text.to_string();

        tokio::task::spawn_blocking(move || model.embed(&text))
            .await
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
    }
}
