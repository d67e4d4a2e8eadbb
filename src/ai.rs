//! Assistant text features: summaries, shorthand expansion and titles.
//!
//! Generation goes through the `TextGenerator` trait so the prompts and
//! output cleanup can be tested without a provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("assistant is disabled")]
    Disabled,

    #[error("assistant initialization failed: {0}")]
    InitFailed(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("provider returned no text")]
    EmptyResponse,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, AiError>;
}

pub async fn summarize(generator: &dyn TextGenerator, content: &str) -> Result<String, AiError> {
    let prompt = format!(
        "Please provide a concise, clear summary of the following note content. Focus on the main points and key information. Keep it brief but comprehensive:\n\n{content}\n\nSummary:"
    );
    let text = generator.generate(&prompt, 200, 0.3).await?;
    non_empty(text.trim())
}

pub async fn expand(generator: &dyn TextGenerator, shorthand: &str) -> Result<String, AiError> {
    let prompt = format!(
        "Expand the following shorthand notes into a well-structured, detailed note. Maintain the original meaning and add context, proper formatting, and clarity. Make it professional and easy to read:\n\nShorthand: {shorthand}\n\nExpanded Note:"
    );
    let text = generator.generate(&prompt, 500, 0.4).await?;
    non_empty(text.trim())
}

pub async fn generate_title(
    generator: &dyn TextGenerator,
    content: &str,
) -> Result<String, AiError> {
    let prompt = format!(
        "Generate a clear, concise, and descriptive title for the following note content. The title should capture the main topic or purpose of the note. Keep it under 60 characters:\n\nContent: {content}\n\nTitle:"
    );
    let text = generator.generate(&prompt, 50, 0.3).await?;
    non_empty(clean_title(&text))
}

/// Strip whitespace and one pair of surrounding quotes.
pub fn clean_title(raw: &str) -> &str {
    let title = raw.trim();
    let title = title
        .strip_prefix('"')
        .or_else(|| title.strip_prefix('\''))
        .unwrap_or(title);
    title
        .strip_suffix('"')
        .or_else(|| title.strip_suffix('\''))
        .unwrap_or(title)
}

fn non_empty(text: &str) -> Result<String, AiError> {
    if text.is_empty() {
        return Err(AiError::EmptyResponse);
    }
    Ok(text.to_string())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat completions client for OpenAI-compatible APIs.
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiChat {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AiError::InitFailed("missing API key".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Provider(format!("{status}: {body}")));
        }

        let response: ChatResponse = response.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AiError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        seen: Mutex<Vec<(String, u32)>>,
    }

    impl Canned {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(
            &self,
            prompt: &str,
            max_tokens: u32,
            _temperature: f32,
        ) -> Result<String, AiError> {
            self.seen.lock().unwrap().push((prompt.to_string(), max_tokens));
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("  \"Weekly Planning\"  "), "Weekly Planning");
        assert_eq!(clean_title("'Groceries'"), "Groceries");
        assert_eq!(clean_title("Plain title"), "Plain title");
        assert_eq!(clean_title("\"Half quoted"), "Half quoted");
    }

    #[tokio::test]
    async fn test_generate_title_cleans_output() {
        let generator = Canned::new("\"Trip to Lisbon\"\n");
        let title = generate_title(&generator, "flights, hotel, museums").await.unwrap();

        assert_eq!(title, "Trip to Lisbon");
        let seen = generator.seen.lock().unwrap();
        assert!(seen[0].0.contains("Content: flights, hotel, museums"));
        assert_eq!(seen[0].1, 50);
    }

    #[tokio::test]
    async fn test_summarize_trims() {
        let generator = Canned::new("  Short summary.  ");
        let summary = summarize(&generator, "long text").await.unwrap();
        assert_eq!(summary, "Short summary.");
        assert_eq!(generator.seen.lock().unwrap()[0].1, 200);
    }

    #[tokio::test]
    async fn test_expand_includes_shorthand() {
        let generator = Canned::new("Expanded");
        expand(&generator, "mtg w/ bob re: q3").await.unwrap();
        let seen = generator.seen.lock().unwrap();
        assert!(seen[0].0.contains("Shorthand: mtg w/ bob re: q3"));
        assert_eq!(seen[0].1, 500);
    }

    #[tokio::test]
    async fn test_blank_reply_is_error() {
        let generator = Canned::new("  \"\" ");
        let result = generate_title(&generator, "content").await;
        assert!(matches!(result, Err(AiError::EmptyResponse)));
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Hi"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi"));
    }
}
