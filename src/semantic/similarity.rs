//! Cosine similarity between two embeddings.

/// Errors raised by the similarity primitive.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimilarityError {
    /// Both embeddings come from the same fixed-dimension model, so unequal
    /// lengths mean a model change or corrupted data.
    #[error("invalid input: vector lengths differ ({left} vs {right})")]
    InvalidInput { left: usize, right: usize },
}

/// Compute cosine similarity between two equal-length vectors.
///
/// Returns `0.0` when either vector has zero norm, so all-zero embeddings
/// never divide by zero. The score is not clamped.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::InvalidInput {
            left: a.len(),
            right: b.len(),
        });
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot(a, b) / (norm_a * norm_b))
}

/// Compute L2 norm of a vector.
pub(crate) fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
