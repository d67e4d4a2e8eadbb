use crate::{ai::AiError, semantic::SimilarityError};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("note not found")]
    NotFound,

    #[error("folder not found")]
    FolderNotFound,

    #[error("Note embedding not available. Please update the note to generate embeddings.")]
    NoEmbedding,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("similarity error: {0}")]
    Similarity(#[from] SimilarityError),

    #[error("assistant error: {0}")]
    Ai(#[from] AiError),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}
