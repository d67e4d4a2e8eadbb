use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    sync::{Arc, RwLock},
};

pub const DEFAULT_FOLDER_COLOR: &str = "#4F46E5";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartialEq for Folder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FolderCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FolderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

pub trait FolderManager: Send + Sync {
    fn get(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Folder>>;
    /// Newest first
    fn list(&self, user_id: &str) -> anyhow::Result<Vec<Folder>>;
    fn create(&self, user_id: &str, folder: FolderCreate) -> anyhow::Result<Folder>;
    fn update(&self, user_id: &str, id: &str, update: FolderUpdate)
        -> anyhow::Result<Option<Folder>>;
    fn delete(&self, user_id: &str, id: &str) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Default)]
pub struct BackendCsv {
    list: Arc<RwLock<Vec<Folder>>>,
    path: String,
}

const CSV_HEADERS: [&str; 6] = ["id", "user_id", "name", "color", "created_at", "updated_at"];

impl BackendCsv {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if let Err(err) = std::fs::metadata(path) {
            match err.kind() {
                ErrorKind::NotFound => {
                    log::info!("Creating new folder list at {path}");
                    let mut csv_wrt = csv::Writer::from_path(path)?;
                    csv_wrt.write_record(CSV_HEADERS)?;
                    csv_wrt.flush()?;
                }
                _ => Err(err)?,
            }
        }

        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut folders = vec![];
        for record in csv_reader.records() {
            let record = record?;
            let field = |idx: usize| {
                record
                    .get(idx)
                    .ok_or_else(|| anyhow!("couldnt get record {}", CSV_HEADERS[idx]))
            };

            folders.push(Folder {
                id: field(0)?.to_string(),
                user_id: field(1)?.to_string(),
                name: field(2)?.to_string(),
                color: field(3)?.to_string(),
                created_at: DateTime::parse_from_rfc3339(field(4)?)?.with_timezone(&Utc),
                updated_at: DateTime::parse_from_rfc3339(field(5)?)?.with_timezone(&Utc),
            });
        }

        Ok(BackendCsv {
            list: Arc::new(RwLock::new(folders)),
            path: path.to_string(),
        })
    }

    fn save(&self, folders: &[Folder]) -> anyhow::Result<()> {
        let temp_path = format!("{}-tmp", &self.path);
        let mut csv_wrt = csv::Writer::from_path(&temp_path)?;
        csv_wrt.write_record(CSV_HEADERS)?;
        for folder in folders {
            csv_wrt.write_record([
                folder.id.clone(),
                folder.user_id.clone(),
                folder.name.clone(),
                folder.color.clone(),
                folder.created_at.to_rfc3339(),
                folder.updated_at.to_rfc3339(),
            ])?;
        }
        csv_wrt.flush()?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn lock_err<T>(err: std::sync::PoisonError<T>) -> anyhow::Error {
        anyhow!("folder list lock poisoned: {err}")
    }
}

impl FolderManager for BackendCsv {
    fn get(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Folder>> {
        let folders = self.list.read().map_err(Self::lock_err)?;
        Ok(folders
            .iter()
            .find(|f| f.id == id && f.user_id == user_id)
            .cloned())
    }

    fn list(&self, user_id: &str) -> anyhow::Result<Vec<Folder>> {
        let folders = self.list.read().map_err(Self::lock_err)?;

        let mut output: Vec<Folder> = folders
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        output.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(output)
    }

    fn create(&self, user_id: &str, folder_create: FolderCreate) -> anyhow::Result<Folder> {
        let mut folders = self.list.write().map_err(Self::lock_err)?;
        let now = Utc::now();

        let folder = Folder {
            id: rusty_ulid::generate_ulid_string(),
            user_id: user_id.to_string(),
            name: folder_create.name,
            color: folder_create
                .color
                .unwrap_or_else(|| DEFAULT_FOLDER_COLOR.to_string()),
            created_at: now,
            updated_at: now,
        };

        folders.push(folder.clone());
        if let Err(err) = self.save(&folders) {
            folders.pop();
            return Err(err);
        }

        Ok(folder)
    }

    fn update(
        &self,
        user_id: &str,
        id: &str,
        update: FolderUpdate,
    ) -> anyhow::Result<Option<Folder>> {
        let mut folders = self.list.write().map_err(Self::lock_err)?;

        let Some(idx) = folders
            .iter()
            .position(|f| f.id == id && f.user_id == user_id)
        else {
            return Ok(None);
        };

        let previous = folders[idx].clone();
        let folder = &mut folders[idx];
        if let Some(name) = update.name {
            folder.name = name;
        }
        if let Some(color) = update.color {
            folder.color = color;
        }
        folder.updated_at = Utc::now();
        let result = folder.clone();

        if let Err(err) = self.save(&folders) {
            folders[idx] = previous;
            return Err(err);
        }

        Ok(Some(result))
    }

    fn delete(&self, user_id: &str, id: &str) -> anyhow::Result<bool> {
        let mut folders = self.list.write().map_err(Self::lock_err)?;

        let Some(idx) = folders
            .iter()
            .position(|f| f.id == id && f.user_id == user_id)
        else {
            return Ok(false);
        };

        let removed = folders.remove(idx);
        if let Err(err) = self.save(&folders) {
            folders.insert(idx, removed);
            return Err(err);
        }

        Ok(true)
    }
}
