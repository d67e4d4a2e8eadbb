use crate::{
    ai::{OpenAiChat, TextGenerator},
    app::App,
    config::{AssistantConfig, Config, EmbeddingProviderKind, SemanticSearchConfig},
    folders, notes,
    semantic::{EmbeddingProducer, LocalEmbedder, OpenAiEmbedder},
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Build the app from the config and note store under `paths`.
    pub fn create_app(paths: &AppPaths) -> Result<App> {
        let config = Config::load_with(&paths.base_path)?;
        let notes = notes::BackendCsv::load(&paths.notes_path)
            .with_context(|| format!("failed to load notes from {}", paths.notes_path))?;
        let folders = folders::BackendCsv::load(&paths.folders_path)
            .with_context(|| format!("failed to load folders from {}", paths.folders_path))?;

        let embedder = Self::create_embedder(&config.semantic_search, paths)?;
        let ai = Self::create_generator(&config.assistant)?;

        Ok(App::new(
            Arc::new(notes),
            Arc::new(folders),
            embedder,
            ai,
            config,
        ))
    }

    /// Get application paths with validation
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;
        let notes_path = format!("{base_path}/notes.csv");
        let folders_path = format!("{base_path}/folders.csv");

        // Ensure base directory exists
        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Ok(AppPaths {
            base_path,
            notes_path,
            folders_path,
        })
    }

    /// Get the base path for the application
    fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("NB_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(format!("{}/.local/share/nb", home.to_string_lossy()))
    }

    fn create_embedder(
        config: &SemanticSearchConfig,
        paths: &AppPaths,
    ) -> Result<Option<Arc<dyn EmbeddingProducer>>> {
        if !config.enabled {
            log::info!("semantic search disabled");
            return Ok(None);
        }

        let model = config.effective_model();
        let producer: Arc<dyn EmbeddingProducer> = match config.provider {
            EmbeddingProviderKind::Local => Arc::new(LocalEmbedder::new(
                model,
                PathBuf::from(&paths.base_path),
                Duration::from_secs(config.download_timeout_secs),
            )),
            EmbeddingProviderKind::OpenAi => {
                let Some(api_key) = read_api_key(&config.api_key_env) else {
                    log::warn!(
                        "{} is not set, notes will be saved without embeddings",
                        config.api_key_env
                    );
                    return Ok(None);
                };
                Arc::new(OpenAiEmbedder::new(
                    &config.base_url,
                    model,
                    &api_key,
                    Duration::from_secs(config.embed_timeout_secs),
                )?)
            }
        };

        log::info!("using embedding provider '{}' ({model})", producer.name());
        Ok(Some(producer))
    }

    fn create_generator(config: &AssistantConfig) -> Result<Option<Arc<dyn TextGenerator>>> {
        if !config.enabled {
            return Ok(None);
        }

        let Some(api_key) = read_api_key(&config.api_key_env) else {
            log::warn!("{} is not set, assistant disabled", config.api_key_env);
            return Ok(None);
        };

        let chat = OpenAiChat::new(
            &config.base_url,
            &config.model,
            &api_key,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Some(Arc::new(chat)))
    }
}

fn read_api_key(env: &str) -> Option<String> {
    std::env::var(env)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// Application paths structure
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: String,
    pub notes_path: String,
    pub folders_path: String,
}
