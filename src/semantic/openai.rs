//! OpenAI-compatible embeddings endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::embeddings::{EmbeddingError, EmbeddingProducer};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedding provider calling `POST {base_url}/embeddings`.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiEmbedder {
    /// The request timeout is a transport bound only; callers apply their own
    /// deadline through `produce_embedding`.
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(EmbeddingError::InitFailed("missing API key".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

#[async_trait]
impl EmbeddingProducer for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn produce(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbeddingsRequest {
            model: &self.model,
            input: text,
            encoding_format: "float",
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::EmbeddingFailed(format!(
                "embeddings API error {status}: {body}"
            )));
        }

        let response: EmbeddingsResponse = response.json().await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }
}
