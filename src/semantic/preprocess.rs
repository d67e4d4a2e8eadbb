//! Content preprocessing for embedding generation.
//!
//! Prepares note title and content for embedding:
//! 1. Repeat the title `TITLE_WEIGHT` times so it dominates the embedding
//! 2. Append the content
//! 3. Truncate to max length with ellipsis

/// How many times the title is repeated ahead of the content
pub const TITLE_WEIGHT: usize = 2;

/// Maximum embedding input length (characters, not tokens)
pub const MAX_EMBEDDING_INPUT_CHARS: usize = 6000;

/// Ellipsis suffix when content is truncated
pub const TRUNCATION_SUFFIX: &str = "...";

/// Build the text sent to the embedding producer for a note.
///
/// Truncation keeps the head of the string, so the weighted title survives
/// even when the content alone is longer than the cap.
pub fn prepare_embedding_input(title: &str, content: &str) -> String {
    let mut combined = format!("{title} ").repeat(TITLE_WEIGHT);
    combined.push_str(content);

    truncate_content(combined)
}

/// Truncate to MAX_EMBEDDING_INPUT_CHARS characters, adding ellipsis if truncated.
fn truncate_content(content: String) -> String {
    match content.char_indices().nth(MAX_EMBEDDING_INPUT_CHARS) {
        None => content,
        Some((cut, _)) => {
            // cut is a char boundary, so UTF-8 sequences stay intact
            let mut truncated = content;
            truncated.truncate(cut);
            truncated.push_str(TRUNCATION_SUFFIX);
            truncated
        }
    }
}

/// Trim and collapse whitespace runs into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compute a hash of the content for change detection.
/// Used to determine if a note needs re-embedding.
///
/// `DefaultHasher` output may change between Rust releases, so only compare
/// hashes computed by the same process. Never persist them.
pub fn content_hash(title: &str, content: &str) -> u64 {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    title.hash(&mut hasher);
    content.hash(&mut hasher);
    hasher.finish()
}
