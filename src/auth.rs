//! Bearer token to user resolution for the daemon.

use std::collections::HashMap;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid bearer token")]
    InvalidToken,
}

/// Resolve the user a request acts as.
///
/// With no tokens configured every request is `default_user`. Otherwise the
/// `Authorization` header must carry a bearer token belonging to one of the
/// configured users. Every configured token is compared so the time taken
/// does not reveal which user matched.
pub fn resolve_user(
    authorization: Option<&str>,
    api_tokens: &HashMap<String, String>,
    default_user: &str,
) -> Result<String, AuthError> {
    if api_tokens.is_empty() {
        return Ok(default_user.to_string());
    }

    let provided = authorization
        .and_then(extract_bearer_token)
        .ok_or(AuthError::MissingToken)?;

    let mut matched = None;
    for (user, token) in api_tokens {
        if validate_token(provided, token) && matched.is_none() {
            matched = Some(user.clone());
        }
    }

    matched.ok_or(AuthError::InvalidToken)
}

/// Constant-time token comparison. Empty tokens never match.
pub fn validate_token(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    if provided.is_empty() || expected.is_empty() {
        return false;
    }

    let len_match = provided.len() == expected.len();

    let diff = provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));

    len_match && diff == 0
}

/// Token from an `Authorization: Bearer <token>` value, scheme case-insensitive.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let (scheme, token) = header.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    Some(token.trim()).filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> HashMap<String, String> {
        HashMap::from([
            ("alice".to_string(), "alice-secret".to_string()),
            ("bob".to_string(), "bob-secret".to_string()),
        ])
    }

    #[test]
    fn test_resolve_user_without_tokens() {
        let user = resolve_user(None, &HashMap::new(), "local").unwrap();
        assert_eq!(user, "local");

        // header is ignored when auth is off
        let user = resolve_user(Some("Bearer whatever"), &HashMap::new(), "local").unwrap();
        assert_eq!(user, "local");
    }

    #[test]
    fn test_resolve_user_by_token() {
        let tokens = tokens();
        assert_eq!(
            resolve_user(Some("Bearer alice-secret"), &tokens, "local").unwrap(),
            "alice"
        );
        assert_eq!(
            resolve_user(Some("bearer bob-secret"), &tokens, "local").unwrap(),
            "bob"
        );
    }

    #[test]
    fn test_resolve_user_rejects() {
        let tokens = tokens();
        assert_eq!(
            resolve_user(None, &tokens, "local"),
            Err(AuthError::MissingToken)
        );
        assert_eq!(
            resolve_user(Some("Basic YWxpY2U6"), &tokens, "local"),
            Err(AuthError::MissingToken)
        );
        assert_eq!(
            resolve_user(Some("Bearer alice-secre"), &tokens, "local"),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_validate_token() {
        assert!(validate_token("secret123", "secret123"));
        assert!(!validate_token("secret123", "SECRET123"));
        assert!(!validate_token("short", "longer"));
        assert!(!validate_token("", ""));
        assert!(!validate_token("secret", ""));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer secret123"), Some("secret123"));
        assert_eq!(extract_bearer_token("BEARER secret123"), Some("secret123"));
        assert_eq!(extract_bearer_token("  Bearer   spaced  "), Some("spaced"));
        assert_eq!(extract_bearer_token("Bearer"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Bearersecret123"), None);
        assert_eq!(extract_bearer_token("Basic secret123"), None);
    }
}
