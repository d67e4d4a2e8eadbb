use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    io::ErrorKind,
    sync::{Arc, RwLock},
    time::Instant,
};

pub const DEFAULT_COLOR: &str = "#FFE066";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub user_id: String,

    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub color: String,
    pub is_pinned: bool,
    pub position: u64,
    pub folder_id: Option<String>,

    /// Empty when embedding production failed
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NoteCreate {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NoteUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,

    /// Replaces the stored embedding; set by the app layer, not by clients
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NoteQuery {
    /// Case-insensitive match on title or content, or exact tag match
    pub search: Option<String>,
    /// Note must carry at least one of these tags
    pub tags: Option<Vec<String>>,
    pub folder_id: Option<String>,
}

pub trait NoteManager: Send + Sync {
    fn get(&self, user_id: &str, id: u64) -> anyhow::Result<Option<Note>>;
    fn list(&self, user_id: &str, query: NoteQuery) -> anyhow::Result<Vec<Note>>;
    fn create(&self, user_id: &str, note: NoteCreate, embedding: Vec<f32>)
        -> anyhow::Result<Note>;
    fn update(&self, user_id: &str, id: u64, update: NoteUpdate) -> anyhow::Result<Option<Note>>;
    fn delete(&self, user_id: &str, id: u64) -> anyhow::Result<bool>;
    /// Detach every note of the user from the folder, returning how many moved.
    fn clear_folder(&self, user_id: &str, folder_id: &str) -> anyhow::Result<usize>;
}

/// Split a comma separated tag list, dropping blanks and duplicates.
pub fn parse_tags(tags: &str) -> Vec<String> {
    dedup_tags(
        tags.split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
    )
}

fn dedup_tags(mut tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.retain(|item| seen.insert(item.clone()));
    tags
}

fn format_embedding(embedding: &[f32]) -> String {
    embedding
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_embedding(field: &str) -> anyhow::Result<Vec<f32>> {
    field
        .split_whitespace()
        .map(|v| v.parse::<f32>().map_err(Into::into))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct BackendCsv {
    list: Arc<RwLock<Vec<Note>>>,
    path: String,
}

const CSV_HEADERS: [&str; 12] = [
    "id",
    "user_id",
    "title",
    "content",
    "tags",
    "color",
    "is_pinned",
    "position",
    "folder_id",
    "created_at",
    "updated_at",
    "embedding",
];

impl BackendCsv {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if let Err(err) = std::fs::metadata(path) {
            match err.kind() {
                ErrorKind::NotFound => {
                    log::info!("Creating new database at {path}");
                    let mut csv_wrt = csv::Writer::from_path(path)?;
                    csv_wrt.write_record(CSV_HEADERS)?;
                    csv_wrt.flush()?;
                }
                _ => Err(err)?,
            }
        }

        let now = Instant::now();
        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut notes = vec![];
        for record in csv_reader.records() {
            let record = record?;
            let field = |idx: usize| {
                record
                    .get(idx)
                    .ok_or_else(|| anyhow!("couldnt get record {}", CSV_HEADERS[idx]))
            };

            let folder_id = field(8)?;
            notes.push(Note {
                id: field(0)?.parse::<u64>()?,
                user_id: field(1)?.to_string(),
                title: field(2)?.to_string(),
                content: field(3)?.to_string(),
                tags: parse_tags(field(4)?),
                color: field(5)?.to_string(),
                is_pinned: field(6)?.parse::<bool>()?,
                position: field(7)?.parse::<u64>()?,
                folder_id: if folder_id.is_empty() {
                    None
                } else {
                    Some(folder_id.to_string())
                },
                created_at: DateTime::parse_from_rfc3339(field(9)?)?.with_timezone(&Utc),
                updated_at: DateTime::parse_from_rfc3339(field(10)?)?.with_timezone(&Utc),
                embedding: parse_embedding(field(11)?)?,
            });
        }

        log::debug!(
            "took {}ms to read csv",
            now.elapsed().as_micros() as f64 / 1000.0
        );

        Ok(BackendCsv {
            list: Arc::new(RwLock::new(notes)),
            path: path.to_string(),
        })
    }

    fn save(&self, notes: &[Note]) -> anyhow::Result<()> {
        let temp_path = format!("{}-tmp", &self.path);
        let mut csv_wrt = csv::Writer::from_path(&temp_path)?;
        csv_wrt.write_record(CSV_HEADERS)?;
        for note in notes {
            csv_wrt.write_record([
                note.id.to_string(),
                note.user_id.clone(),
                note.title.clone(),
                note.content.clone(),
                note.tags.join(","),
                note.color.clone(),
                note.is_pinned.to_string(),
                note.position.to_string(),
                note.folder_id.clone().unwrap_or_default(),
                note.created_at.to_rfc3339(),
                note.updated_at.to_rfc3339(),
                format_embedding(&note.embedding),
            ])?;
        }
        csv_wrt.flush()?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn lock_err<T>(err: std::sync::PoisonError<T>) -> anyhow::Error {
        anyhow!("note list lock poisoned: {err}")
    }
}

impl NoteManager for BackendCsv {
    fn get(&self, user_id: &str, id: u64) -> anyhow::Result<Option<Note>> {
        let notes = self.list.read().map_err(Self::lock_err)?;
        Ok(notes
            .iter()
            .find(|n| n.id == id && n.user_id == user_id)
            .cloned())
    }

    fn list(&self, user_id: &str, query: NoteQuery) -> anyhow::Result<Vec<Note>> {
        let notes = self.list.read().map_err(Self::lock_err)?;

        let search = query
            .search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let tags = query.tags.filter(|tags| !tags.is_empty());

        let mut output: Vec<Note> = notes
            .iter()
            .filter(|note| note.user_id == user_id)
            .filter(|note| {
                query
                    .folder_id
                    .as_ref()
                    .map(|folder| note.folder_id.as_ref() == Some(folder))
                    .unwrap_or(true)
            })
            .filter(|note| {
                tags.as_ref()
                    .map(|tags| note.tags.iter().any(|t| tags.contains(t)))
                    .unwrap_or(true)
            })
            .filter(|note| {
                search
                    .as_ref()
                    .map(|s| {
                        note.title.to_lowercase().contains(s)
                            || note.content.to_lowercase().contains(s)
                            || note.tags.iter().any(|t| t.to_lowercase() == *s)
                    })
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        output.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then(a.position.cmp(&b.position))
                .then(b.updated_at.cmp(&a.updated_at))
        });

        Ok(output)
    }

    fn create(
        &self,
        user_id: &str,
        note_create: NoteCreate,
        embedding: Vec<f32>,
    ) -> anyhow::Result<Note> {
        let mut notes = self.list.write().map_err(Self::lock_err)?;

        let id = notes.iter().map(|n| n.id + 1).max().unwrap_or(0);
        let position = notes
            .iter()
            .filter(|n| n.user_id == user_id)
            .map(|n| n.position)
            .max()
            .unwrap_or(0)
            + 1;
        let now = Utc::now();

        let note = Note {
            id,
            user_id: user_id.to_string(),
            title: note_create.title,
            content: note_create.content,
            tags: dedup_tags(note_create.tags),
            color: note_create
                .color
                .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            is_pinned: false,
            position,
            folder_id: note_create.folder_id,
            embedding,
            created_at: now,
            updated_at: now,
        };

        notes.push(note.clone());
        if let Err(err) = self.save(&notes) {
            notes.pop();
            return Err(err);
        }

        Ok(note)
    }

    fn update(&self, user_id: &str, id: u64, update: NoteUpdate) -> anyhow::Result<Option<Note>> {
        let mut notes = self.list.write().map_err(Self::lock_err)?;

        let Some(idx) = notes
            .iter()
            .position(|n| n.id == id && n.user_id == user_id)
        else {
            return Ok(None);
        };

        let previous = notes[idx].clone();
        let note = &mut notes[idx];
        if let Some(title) = update.title {
            note.title = title;
        }
        if let Some(content) = update.content {
            note.content = content;
        }
        if let Some(tags) = update.tags {
            note.tags = dedup_tags(tags);
        }
        if let Some(color) = update.color {
            note.color = color;
        }
        if let Some(is_pinned) = update.is_pinned {
            note.is_pinned = is_pinned;
        }
        if let Some(folder_id) = update.folder_id {
            note.folder_id = Some(folder_id).filter(|f| !f.is_empty());
        }
        if let Some(embedding) = update.embedding {
            note.embedding = embedding;
        }
        note.updated_at = Utc::now();

        let result = note.clone();

        if let Err(err) = self.save(&notes) {
            notes[idx] = previous;
            return Err(err);
        }

        Ok(Some(result))
    }

    fn delete(&self, user_id: &str, id: u64) -> anyhow::Result<bool> {
        let mut notes = self.list.write().map_err(Self::lock_err)?;

        let Some(idx) = notes
            .iter()
            .position(|n| n.id == id && n.user_id == user_id)
        else {
            return Ok(false);
        };

        let removed = notes.remove(idx);
        if let Err(err) = self.save(&notes) {
            notes.insert(idx, removed);
            return Err(err);
        }

        Ok(true)
    }

    fn clear_folder(&self, user_id: &str, folder_id: &str) -> anyhow::Result<usize> {
        let mut notes = self.list.write().map_err(Self::lock_err)?;

        let moved: Vec<usize> = notes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.user_id == user_id && n.folder_id.as_deref() == Some(folder_id))
            .map(|(idx, _)| idx)
            .collect();
        if moved.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut previous = Vec::with_capacity(moved.len());
        for &idx in &moved {
            previous.push(notes[idx].clone());
            notes[idx].folder_id = None;
            notes[idx].updated_at = now;
        }

        if let Err(err) = self.save(&notes) {
            for (idx, note) in moved.into_iter().zip(previous) {
                notes[idx] = note;
            }
            return Err(err);
        }

        Ok(moved.len())
    }
}
