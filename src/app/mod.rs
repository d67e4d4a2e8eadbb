pub mod errors;
pub mod factory;

pub use errors::AppError;
pub use factory::{AppFactory, AppPaths};

use crate::{
    ai::{self, TextGenerator},
    config::Config,
    folders::{Folder, FolderCreate, FolderManager, FolderUpdate},
    notes::{Note, NoteCreate, NoteManager, NoteQuery, NoteUpdate},
    semantic::{
        content_hash, prepare_embedding_input, produce_embedding, rank_by_similarity, Candidate,
        EmbeddingProducer,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

/// Longest accepted note title, in characters
pub const MAX_TITLE_CHARS: usize = 200;

/// Characters of content shown for a related note
pub const EXCERPT_CHARS: usize = 200;

/// Longest accepted folder name, in characters
pub const MAX_FOLDER_NAME_CHARS: usize = 100;

/// Per-request overrides for related-note search.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct RelatedOptions {
    pub threshold: Option<f32>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedNote {
    pub id: u64,
    pub title: String,
    /// Content excerpt
    pub content: String,
    pub tags: Vec<String>,
    /// Cosine similarity rounded to two decimals
    pub similarity: f32,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub folder: Option<FolderRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderRef {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl From<&Folder> for FolderRef {
    fn from(folder: &Folder) -> Self {
        Self {
            id: folder.id.clone(),
            name: folder.name.clone(),
            color: folder.color.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedNotes {
    pub related_notes: Vec<RelatedNote>,
    pub total_found: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderSummary {
    #[serde(flatten)]
    pub folder: Folder,
    pub note_count: usize,
}

/// Note operations scoped to a user, with embeddings kept in step with
/// title and content.
#[derive(Clone)]
pub struct App {
    notes: Arc<dyn NoteManager>,
    folders: Arc<dyn FolderManager>,
    embedder: Option<Arc<dyn EmbeddingProducer>>,
    ai: Option<Arc<dyn TextGenerator>>,
    config: Arc<Config>,
}

impl App {
    pub fn new(
        notes: Arc<dyn NoteManager>,
        folders: Arc<dyn FolderManager>,
        embedder: Option<Arc<dyn EmbeddingProducer>>,
        ai: Option<Arc<dyn TextGenerator>>,
        config: Config,
    ) -> Self {
        Self {
            notes,
            folders,
            embedder,
            ai,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `None` when no producer is configured or production failed.
    async fn embed(&self, title: &str, content: &str) -> Option<Vec<f32>> {
        let Some(embedder) = &self.embedder else {
            log::debug!("semantic search is disabled, skipping embedding");
            return None;
        };

        let input = prepare_embedding_input(title, content);
        let timeout = Duration::from_secs(self.config.semantic_search.embed_timeout_secs);
        produce_embedding(embedder.as_ref(), &input, timeout).await
    }

    pub async fn create_note(&self, user_id: &str, mut create: NoteCreate) -> Result<Note, AppError> {
        create.title = validate_title(&create.title)?;
        create.tags = validate_tags(create.tags)?;
        create.folder_id = create.folder_id.filter(|f| !f.is_empty());
        if let Some(folder_id) = &create.folder_id {
            self.require_folder(user_id, folder_id)?;
        }

        let embedding = self.embed(&create.title, &create.content).await;
        if embedding.is_none() {
            log::warn!("saving note '{}' without an embedding", create.title);
        }

        let note = self
            .notes
            .create(user_id, create, embedding.unwrap_or_default())?;
        log::info!("created note {} for {user_id}", note.id);

        Ok(note)
    }

    pub async fn update_note(
        &self,
        user_id: &str,
        id: u64,
        mut update: NoteUpdate,
    ) -> Result<Note, AppError> {
        let existing = self.get_note(user_id, id)?;

        if let Some(title) = &update.title {
            update.title = Some(validate_title(title)?);
        }
        if let Some(tags) = update.tags.take() {
            update.tags = Some(validate_tags(tags)?);
        }
        if let Some(folder_id) = update.folder_id.as_deref().filter(|f| !f.is_empty()) {
            self.require_folder(user_id, folder_id)?;
        }

        let title = update.title.as_deref().unwrap_or(&existing.title);
        let content = update.content.as_deref().unwrap_or(&existing.content);

        if !existing.has_embedding()
            || content_hash(title, content) != content_hash(&existing.title, &existing.content)
        {
            match self.embed(title, content).await {
                Some(embedding) => update.embedding = Some(embedding),
                None => log::warn!("keeping previous embedding of note {id}"),
            }
        }

        self.notes
            .update(user_id, id, update)?
            .ok_or(AppError::NotFound)
    }

    /// Regenerate the note's embedding from its current title and content.
    pub async fn reembed_note(&self, user_id: &str, id: u64) -> Result<Note, AppError> {
        let existing = self.get_note(user_id, id)?;

        let embedding = self.embed(&existing.title, &existing.content).await;
        if embedding.is_none() {
            log::warn!("could not regenerate embedding of note {id}");
        }

        let update = NoteUpdate {
            embedding,
            ..Default::default()
        };

        self.notes
            .update(user_id, id, update)?
            .ok_or(AppError::NotFound)
    }

    pub fn get_note(&self, user_id: &str, id: u64) -> Result<Note, AppError> {
        self.notes.get(user_id, id)?.ok_or(AppError::NotFound)
    }

    pub fn delete_note(&self, user_id: &str, id: u64) -> Result<(), AppError> {
        if !self.notes.delete(user_id, id)? {
            return Err(AppError::NotFound);
        }
        log::info!("deleted note {id} for {user_id}");
        Ok(())
    }

    pub fn list_notes(&self, user_id: &str, query: NoteQuery) -> Result<Vec<Note>, AppError> {
        Ok(self.notes.list(user_id, query)?)
    }

    pub fn tags(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let tags: BTreeSet<String> = self
            .notes
            .list(user_id, NoteQuery::default())?
            .into_iter()
            .flat_map(|note| note.tags)
            .collect();

        Ok(tags.into_iter().collect())
    }

    /// Notes of the same user whose embeddings are closest to the given note.
    pub fn related_notes(
        &self,
        user_id: &str,
        id: u64,
        opts: RelatedOptions,
    ) -> Result<RelatedNotes, AppError> {
        let note = self.get_note(user_id, id)?;
        if !note.has_embedding() {
            return Err(AppError::NoEmbedding);
        }

        let threshold = opts
            .threshold
            .unwrap_or(self.config.semantic_search.default_threshold);
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(AppError::Validation(format!(
                "threshold must be between -1.0 and 1.0, got {threshold}"
            )));
        }
        let limit = opts.limit.unwrap_or(self.config.semantic_search.default_limit);

        let candidates: Vec<Candidate<Note>> = self
            .notes
            .list(user_id, NoteQuery::default())?
            .into_iter()
            .filter(|other| other.id != note.id && other.has_embedding())
            .map(|other| Candidate {
                id: other.id,
                embedding: other.embedding.clone(),
                meta: other,
            })
            .collect();

        let folders: HashMap<String, FolderRef> = self
            .folders
            .list(user_id)?
            .iter()
            .map(|folder| (folder.id.clone(), FolderRef::from(folder)))
            .collect();

        let ranked = rank_by_similarity(&note.embedding, &candidates, threshold, limit)?;
        log::debug!(
            "note {id}: {} of {} candidates above {threshold}",
            ranked.len(),
            candidates.len()
        );

        let related_notes: Vec<RelatedNote> = ranked
            .into_iter()
            .map(|result| RelatedNote {
                id: result.id,
                title: result.meta.title.clone(),
                content: excerpt(&result.meta.content),
                tags: result.meta.tags.clone(),
                similarity: round_score(result.score),
                color: result.meta.color.clone(),
                created_at: result.meta.created_at,
                updated_at: result.meta.updated_at,
                folder: result
                    .meta
                    .folder_id
                    .as_ref()
                    .and_then(|id| folders.get(id))
                    .cloned(),
            })
            .collect();

        Ok(RelatedNotes {
            total_found: related_notes.len(),
            related_notes,
        })
    }

    fn require_folder(&self, user_id: &str, folder_id: &str) -> Result<(), AppError> {
        match self.folders.get(user_id, folder_id)? {
            Some(_) => Ok(()),
            None => Err(AppError::Validation(format!(
                "folder {folder_id} does not exist"
            ))),
        }
    }

    /// Folders of the user, newest first, with how many notes each holds.
    pub fn list_folders(&self, user_id: &str) -> Result<Vec<FolderSummary>, AppError> {
        let notes = self.notes.list(user_id, NoteQuery::default())?;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for folder_id in notes.iter().filter_map(|n| n.folder_id.as_deref()) {
            *counts.entry(folder_id).or_default() += 1;
        }

        Ok(self
            .folders
            .list(user_id)?
            .into_iter()
            .map(|folder| FolderSummary {
                note_count: counts.get(folder.id.as_str()).copied().unwrap_or(0),
                folder,
            })
            .collect())
    }

    pub fn get_folder(&self, user_id: &str, id: &str) -> Result<FolderSummary, AppError> {
        let folder = self
            .folders
            .get(user_id, id)?
            .ok_or(AppError::FolderNotFound)?;
        self.summarize_folder(user_id, folder)
    }

    pub fn create_folder(
        &self,
        user_id: &str,
        mut create: FolderCreate,
    ) -> Result<FolderSummary, AppError> {
        create.name = validate_folder_name(&create.name)?;

        let folder = self.folders.create(user_id, create)?;
        log::info!("created folder {} for {user_id}", folder.id);

        Ok(FolderSummary {
            folder,
            note_count: 0,
        })
    }

    pub fn update_folder(
        &self,
        user_id: &str,
        id: &str,
        mut update: FolderUpdate,
    ) -> Result<FolderSummary, AppError> {
        if let Some(name) = &update.name {
            update.name = Some(validate_folder_name(name)?);
        }

        let folder = self
            .folders
            .update(user_id, id, update)?
            .ok_or(AppError::FolderNotFound)?;
        self.summarize_folder(user_id, folder)
    }

    /// Deletes the folder; its notes stay, outside any folder.
    pub fn delete_folder(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        if self.folders.get(user_id, id)?.is_none() {
            return Err(AppError::FolderNotFound);
        }

        let moved = self.notes.clear_folder(user_id, id)?;
        if !self.folders.delete(user_id, id)? {
            return Err(AppError::FolderNotFound);
        }
        log::info!("deleted folder {id} for {user_id}, {moved} notes moved out");

        Ok(())
    }

    fn summarize_folder(&self, user_id: &str, folder: Folder) -> Result<FolderSummary, AppError> {
        let query = NoteQuery {
            folder_id: Some(folder.id.clone()),
            ..Default::default()
        };
        let note_count = self.notes.list(user_id, query)?.len();

        Ok(FolderSummary { folder, note_count })
    }

    fn generator(&self) -> Result<&dyn TextGenerator, AppError> {
        self.ai
            .as_deref()
            .ok_or(AppError::Ai(ai::AiError::Disabled))
    }

    pub async fn summarize(&self, content: &str) -> Result<String, AppError> {
        let content = require_text("content", content)?;
        Ok(ai::summarize(self.generator()?, content).await?)
    }

    pub async fn expand(&self, shorthand: &str) -> Result<String, AppError> {
        let shorthand = require_text("shorthand", shorthand)?;
        Ok(ai::expand(self.generator()?, shorthand).await?)
    }

    pub async fn generate_title(&self, content: &str) -> Result<String, AppError> {
        let content = require_text("content", content)?;
        Ok(ai::generate_title(self.generator()?, content).await?)
    }
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_tags(tags: Vec<String>) -> Result<Vec<String>, AppError> {
    let tags: Vec<String> = tags
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();

    if tags.is_empty() {
        return Err(AppError::Validation(
            "at least one tag is required".to_string(),
        ));
    }
    if let Some(tag) = tags.iter().find(|tag| tag.contains(',')) {
        return Err(AppError::Validation(format!(
            "tag '{tag}' must not contain a comma"
        )));
    }
    Ok(tags)
}

fn validate_folder_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("folder name is required".to_string()));
    }
    if name.chars().count() > MAX_FOLDER_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "folder name must be at most {MAX_FOLDER_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn require_text<'a>(field: &str, text: &'a str) -> Result<&'a str, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(text)
}

fn excerpt(content: &str) -> String {
    match content.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}

fn round_score(score: f32) -> f32 {
    (score * 100.0).round() / 100.0
}
