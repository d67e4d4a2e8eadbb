//! Semantic similarity over note embeddings.
//!
//! # Architecture
//!
//! - `similarity`: cosine similarity primitive
//! - `ranker`: threshold + top-K selection over a candidate set
//! - `preprocess`: title/content to embedding input text
//! - `embeddings`: producer contract, failure boundary, fastembed provider
//! - `openai`: OpenAI-compatible HTTP provider

pub mod embeddings;
pub mod openai;
mod preprocess;
mod ranker;
mod similarity;

pub use embeddings::{produce_embedding, EmbeddingError, EmbeddingProducer, LocalEmbedder};
pub use openai::OpenAiEmbedder;
pub use preprocess::{
    content_hash, normalize_whitespace, prepare_embedding_input, MAX_EMBEDDING_INPUT_CHARS,
    TITLE_WEIGHT, TRUNCATION_SUFFIX,
};
pub use ranker::{rank_by_similarity, Candidate, SimilarityResult};
pub use similarity::{cosine_similarity, SimilarityError};

/// Default local embedding model
pub const DEFAULT_MODEL: &str = "bge-base-en-v1.5";

/// Default minimum similarity for related notes
pub const DEFAULT_THRESHOLD: f32 = 0.3;

/// Default number of related notes returned
pub const DEFAULT_LIMIT: usize = 8;
