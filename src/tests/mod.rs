mod notes;

use crate::{
    ai::{AiError, TextGenerator},
    app::App,
    config::Config,
    semantic::{EmbeddingError, EmbeddingProducer},
};
use async_trait::async_trait;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Returns the vector of the first keyword found in the text.
pub struct KeywordEmbedder {
    table: Vec<(&'static str, Vec<f32>)>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(table: Vec<(&'static str, Vec<f32>)>) -> Arc<Self> {
        Arc::new(Self {
            table,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProducer for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn produce(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = text.to_lowercase();
        self.table
            .iter()
            .find(|(keyword, _)| text.contains(keyword))
            .map(|(_, vector)| vector.clone())
            .ok_or_else(|| EmbeddingError::EmbeddingFailed(format!("no keyword in '{text}'")))
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProducer for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn produce(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed("provider unavailable".to_string()))
    }
}

/// Fails the first `failures` calls, then answers with a fixed vector.
pub struct FlakyEmbedder {
    failures: AtomicUsize,
    vector: Vec<f32>,
}

impl FlakyEmbedder {
    pub fn new(failures: usize, vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicUsize::new(failures),
            vector,
        })
    }
}

#[async_trait]
impl EmbeddingProducer for FlakyEmbedder {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn produce(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(EmbeddingError::EmbeddingFailed("provider warming up".to_string()));
        }
        Ok(self.vector.clone())
    }
}

pub struct SlowEmbedder(pub Duration);

#[async_trait]
impl EmbeddingProducer for SlowEmbedder {
    fn name(&self) -> &str {
        "slow"
    }

    async fn produce(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        tokio::time::sleep(self.0).await;
        Ok(vec![1.0, 0.0])
    }
}

/// Echoes the last line of the prompt back.
pub struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, AiError> {
        Ok(format!("\"{}\"", prompt.lines().last().unwrap_or_default()))
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.semantic_search.embed_timeout_secs = 1;
    config
}

/// Note and folder stores under `dir`, reloaded from disk when present.
pub fn load_backends(
    dir: &std::path::Path,
) -> (Arc<crate::notes::BackendCsv>, Arc<crate::folders::BackendCsv>) {
    let notes = crate::notes::BackendCsv::load(dir.join("notes.csv").to_str().unwrap())
        .expect("failed to create notes csv");
    let folders = crate::folders::BackendCsv::load(dir.join("folders.csv").to_str().unwrap())
        .expect("failed to create folders csv");
    (Arc::new(notes), Arc::new(folders))
}

/// Creates an isolated App using a unique temp directory.
/// Each test gets its own directory so parallel tests never collide.
pub fn create_app_with(
    embedder: Option<Arc<dyn EmbeddingProducer>>,
    ai: Option<Arc<dyn TextGenerator>>,
    config: Config,
) -> (App, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let (notes, folders) = load_backends(tmp.path());

    (App::new(notes, folders, embedder, ai, config), tmp)
}

pub fn create_app(embedder: Arc<dyn EmbeddingProducer>) -> (App, tempfile::TempDir) {
    create_app_with(Some(embedder), None, test_config())
}

/// Vectors for the three-note related scenario: alpha and gamma are close,
/// beta is orthogonal to both.
pub fn scenario_embedder() -> Arc<KeywordEmbedder> {
    KeywordEmbedder::new(vec![
        ("alpha", vec![1.0, 0.0]),
        ("beta", vec![0.0, 1.0]),
        ("gamma", vec![0.9, 0.1]),
        ("delta", vec![-1.0, 0.0]),
    ])
}
