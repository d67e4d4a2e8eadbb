use crate::{
    ai::DEFAULT_CHAT_MODEL,
    semantic::{
        openai::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_EMBEDDING_MODEL},
        DEFAULT_LIMIT, DEFAULT_MODEL, DEFAULT_THRESHOLD,
    },
    storage::{self, StorageManager},
};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_USER: &str = "local";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Default embedding request timeout in seconds
const DEFAULT_EMBED_TIMEOUT_SECS: u64 = 30;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const DEFAULT_ASSISTANT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// fastembed model running in-process
    #[default]
    Local,
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAi,
}

/// Configuration for related-notes search
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticSearchConfig {
    /// Generate embeddings at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    /// Model name; a fastembed model for `local`, a remote model id for `openai`
    #[serde(default = "default_semantic_model")]
    pub model: String,

    /// Base url for the `openai` provider
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Environment variable holding the `openai` provider API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Minimum similarity for a related note [-1.0, 1.0]
    #[serde(default = "default_semantic_threshold")]
    pub default_threshold: f32,

    /// Maximum number of related notes
    #[serde(default = "default_semantic_limit")]
    pub default_limit: usize,

    /// Upper bound on a single embedding call in seconds
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: EmbeddingProviderKind::Local,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            default_threshold: DEFAULT_THRESHOLD,
            default_limit: DEFAULT_LIMIT,
            embed_timeout_secs: DEFAULT_EMBED_TIMEOUT_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

impl SemanticSearchConfig {
    /// Model name to use, substituting the remote default when the local
    /// default was left in place for the `openai` provider.
    pub fn effective_model(&self) -> &str {
        match self.provider {
            EmbeddingProviderKind::OpenAi if self.model == DEFAULT_MODEL => {
                DEFAULT_OPENAI_EMBEDDING_MODEL
            }
            _ => &self.model,
        }
    }
}

/// Configuration for the LLM-backed summarize/expand/title features
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_assistant_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: DEFAULT_CHAT_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: DEFAULT_ASSISTANT_TIMEOUT_SECS,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_semantic_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_semantic_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_semantic_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_embed_timeout_secs() -> u64 {
    DEFAULT_EMBED_TIMEOUT_SECS
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_assistant_timeout_secs() -> u64 {
    DEFAULT_ASSISTANT_TIMEOUT_SECS
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// User every request acts as when no api tokens are configured
    #[serde(default = "default_user")]
    pub default_user: String,

    /// user id -> bearer token accepted by the daemon
    #[serde(default)]
    pub api_tokens: HashMap<String, String>,

    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_user: default_user(),
            api_tokens: HashMap::new(),
            semantic_search: SemanticSearchConfig::default(),
            assistant: AssistantConfig::default(),
            base_path: String::new(),
        }
    }
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.default_user.trim().is_empty() {
            bail!("default_user must not be empty");
        }

        for (user, token) in &self.api_tokens {
            if token.trim().is_empty() {
                bail!("api_tokens.{user} must not be empty");
            }
        }

        let sem = &self.semantic_search;
        if !(-1.0..=1.0).contains(&sem.default_threshold) {
            bail!(
                "semantic_search.default_threshold must be between -1.0 and 1.0, got {}",
                sem.default_threshold
            );
        }

        if sem.default_limit == 0 {
            bail!("semantic_search.default_limit must be greater than 0");
        }

        if sem.embed_timeout_secs == 0 {
            bail!("semantic_search.embed_timeout_secs must be greater than 0");
        }

        if sem.download_timeout_secs == 0 {
            bail!("semantic_search.download_timeout_secs must be greater than 0");
        }

        if self.assistant.timeout_secs == 0 {
            bail!("assistant.timeout_secs must be greater than 0");
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store.write(
                CONFIG_FILE,
                serde_yml::to_string(&Self::default())?.as_bytes(),
            )?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            log::info!("upgrading {CONFIG_FILE}");
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }
}
