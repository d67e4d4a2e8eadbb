//! Top-K similarity ranking over an in-memory candidate set.
//!
//! The candidate set is one user's note collection, so a full linear scan is
//! used instead of an index.

use super::similarity::{cosine_similarity, SimilarityError};

/// A note offered for comparison against the query.
#[derive(Debug, Clone)]
pub struct Candidate<M> {
    pub id: u64,
    pub embedding: Vec<f32>,
    /// Pass-through display data, never inspected by the ranker
    pub meta: M,
}

/// A ranked candidate. Borrows its metadata from the candidate slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityResult<'a, M> {
    pub id: u64,
    pub score: f32,
    pub meta: &'a M,
}

/// Rank `candidates` by cosine similarity to `query`.
///
/// Keeps candidates with `score >= threshold`, sorted by score descending,
/// at most `limit` of them. Equal scores keep their input order.
///
/// An empty embedding on either side carries no signal and scores `0`.
/// Any other length disagreement fails with [`SimilarityError::InvalidInput`].
pub fn rank_by_similarity<'a, M>(
    query: &[f32],
    candidates: &'a [Candidate<M>],
    threshold: f32,
    limit: usize,
) -> Result<Vec<SimilarityResult<'a, M>>, SimilarityError> {
    if limit == 0 {
        return Ok(vec![]);
    }

    let mut results = Vec::new();
    for candidate in candidates {
        let score = score(query, &candidate.embedding)?;
        if score >= threshold {
            results.push(SimilarityResult {
                id: candidate.id,
                score,
                meta: &candidate.meta,
            });
        }
    }

    // stable, so ties stay in candidate order
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);

    Ok(results)
}

fn score(query: &[f32], target: &[f32]) -> Result<f32, SimilarityError> {
    if query.is_empty() || target.is_empty() {
        return Ok(0.0);
    }
    cosine_similarity(query, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u64, embedding: Vec<f32>) -> Candidate<&'static str> {
        Candidate {
            id,
            embedding,
            meta: "meta",
        }
    }

    #[test]
    fn test_empty_candidates() {
        let candidates: Vec<Candidate<()>> = vec![];
        let results = rank_by_similarity(&[1.0, 0.0], &candidates, 0.0, 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_limit_zero() {
        let candidates = vec![candidate(1, vec![1.0, 0.0])];
        let results = rank_by_similarity(&[1.0, 0.0], &candidates, -1.0, 0).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_threshold_inclusive() {
        let candidates = vec![candidate(1, vec![1.0, 0.0]), candidate(2, vec![0.0, 1.0])];
        let results = rank_by_similarity(&[1.0, 0.0], &candidates, 1.0, 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);

        let results = rank_by_similarity(&[1.0, 0.0], &candidates, 0.0, 5).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let candidates = vec![
            candidate(7, vec![0.6, 0.8]),
            candidate(3, vec![0.6, 0.8]),
            candidate(5, vec![0.6, 0.8]),
        ];
        let results = rank_by_similarity(&[0.6, 0.8], &candidates, 0.5, 10).unwrap();
        let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![7, 3, 5]);
    }

    #[test]
    fn test_mismatched_candidate_fails() {
        let candidates = vec![candidate(1, vec![1.0, 0.0]), candidate(2, vec![1.0, 0.0, 0.0])];
        let result = rank_by_similarity(&[1.0, 0.0], &candidates, 0.0, 5);
        assert!(matches!(result, Err(SimilarityError::InvalidInput { .. })));
    }

    #[test]
    fn test_empty_candidate_embedding_scores_zero() {
        let candidates = vec![candidate(1, vec![]), candidate(2, vec![1.0, 0.0])];
        let results = rank_by_similarity(&[1.0, 0.0], &candidates, 0.1, 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 2);
    }

    #[test]
    fn test_nan_never_passes_threshold() {
        let candidates = vec![candidate(1, vec![f32::NAN, 1.0])];
        let results = rank_by_similarity(&[1.0, 0.0], &candidates, -1.0, 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_metadata_is_borrowed_from_candidates() {
        let candidates = vec![Candidate {
            id: 9,
            embedding: vec![0.2, 0.8],
            meta: String::from("Groceries"),
        }];
        let results = rank_by_similarity(&[0.2, 0.8], &candidates, 0.5, 1).unwrap();
        assert!(std::ptr::eq(results[0].meta, &candidates[0].meta));
    }
}
