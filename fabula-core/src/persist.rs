//! Story persistence for save/load functionality.
//!
//! Saves are versioned JSON files carrying the full story state plus a
//! quick-access metadata header, so save pickers can list stories without
//! deserializing everything.

use crate::story::StoryWorld;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// A saved story with all state needed to resume play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedStory {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created.
    pub saved_at: String,

    /// The complete story state.
    pub world: StoryWorld,

    /// Summary of the conversation for context restoration.
    pub conversation_summary: Option<String>,

    /// Metadata about the save.
    pub metadata: SaveMetadata,
}

/// Metadata about a save file, peekable without a full load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMetadata {
    /// Story name.
    pub story_name: String,

    /// Genre, when one was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,

    /// Episode the story has reached.
    pub current_episode: u32,

    /// Number of known characters.
    pub character_count: usize,

    /// Last journaled location, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// When the save was created (duplicated from parent for peek access).
    #[serde(default)]
    pub saved_at: String,
}

impl SavedStory {
    /// Create a new saved story from story state.
    pub fn new(world: StoryWorld, conversation_summary: Option<String>) -> Self {
        let saved_at = unix_timestamp();
        let metadata = SaveMetadata {
            story_name: world.story_name.clone(),
            genre: world.settings.genre.clone(),
            current_episode: world.current_episode,
            character_count: world.characters.len(),
            location: world.current_location().map(str::to_string),
            saved_at: saved_at.clone(),
        };

        Self {
            version: SAVE_VERSION,
            saved_at,
            world,
            conversation_summary,
            metadata,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }

    /// Get a save's metadata without loading the full story state.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(partial.metadata)
    }
}

/// Information about a save file.
#[derive(Debug, Clone)]
pub struct SaveInfo {
    /// Path to the save file.
    pub path: String,

    /// Save metadata.
    pub metadata: SaveMetadata,
}

/// List all story save files in a directory.
///
/// The directory is created when missing. Files that are not readable saves
/// are skipped.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();

    let dir_path = dir.as_ref();
    if !dir_path.exists() {
        fs::create_dir_all(dir_path).await?;
        return Ok(saves);
    }

    let mut entries = fs::read_dir(dir_path).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            match SavedStory::peek_metadata(&path).await {
                Ok(metadata) => saves.push(SaveInfo {
                    path: path.to_string_lossy().to_string(),
                    metadata,
                }),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable save");
                }
            }
        }
    }

    saves.sort_by(|a, b| a.metadata.story_name.cmp(&b.metadata.story_name));
    Ok(saves)
}

/// Create an auto-save file name for a story.
pub fn auto_save_path(base_dir: impl AsRef<Path>, story_name: &str) -> std::path::PathBuf {
    let sanitized = sanitize(story_name);
    base_dir.as_ref().join(format!("{sanitized}_autosave.json"))
}

/// Create a manual save file name with timestamp.
pub fn manual_save_path(base_dir: impl AsRef<Path>, story_name: &str) -> std::path::PathBuf {
    let sanitized = sanitize(story_name);
    let timestamp = unix_timestamp();
    base_dir
        .as_ref()
        .join(format!("{sanitized}_{timestamp}.json"))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Current time as a unix-seconds string.
fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{create_sample_settings, StoryWorld};

    #[test]
    fn test_saved_story_creation() {
        let world = StoryWorld::new(create_sample_settings("Тени Сольмара"));
        let saved = SavedStory::new(world, None);

        assert_eq!(saved.version, SAVE_VERSION);
        assert_eq!(saved.metadata.story_name, "Тени Сольмара");
        assert_eq!(saved.metadata.genre.as_deref(), Some("фэнтези"));
        assert_eq!(saved.metadata.current_episode, 1);
        assert_eq!(saved.metadata.character_count, 2);
        assert!(saved.metadata.location.is_none());
    }

    #[test]
    fn test_auto_save_path_sanitized() {
        let path = auto_save_path("/saves", "Моя история!");
        let s = path.to_string_lossy();
        assert!(s.contains("Моя_история__autosave"));
        assert!(s.ends_with(".json"));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let save_path = temp_dir.path().join("story.json");

        let world = StoryWorld::new(create_sample_settings("Круговорот"));
        let saved = SavedStory::new(world, Some("Краткое содержание.".to_string()));
        saved
            .save_json(&save_path)
            .await
            .expect("Save should succeed");

        let loaded = SavedStory::load_json(&save_path)
            .await
            .expect("Load should succeed");

        assert_eq!(loaded.metadata.story_name, "Круговорот");
        assert_eq!(loaded.world.characters.len(), 2);
        assert_eq!(
            loaded.conversation_summary.as_deref(),
            Some("Краткое содержание.")
        );
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let save_path = temp_dir.path().join("old.json");

        let world = StoryWorld::new(create_sample_settings("Старая"));
        let mut saved = SavedStory::new(world, None);
        saved.version = 99;
        let content = serde_json::to_string_pretty(&saved).unwrap();
        tokio::fs::write(&save_path, content).await.unwrap();

        let result = SavedStory::load_json(&save_path).await;
        assert!(matches!(
            result,
            Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: 99
            })
        ));
    }

    #[tokio::test]
    async fn test_peek_metadata() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let save_path = temp_dir.path().join("peek.json");

        let world = StoryWorld::new(create_sample_settings("Подглядывание"));
        let saved = SavedStory::new(world, None);
        saved.save_json(&save_path).await.unwrap();

        let metadata = SavedStory::peek_metadata(&save_path)
            .await
            .expect("Peek should succeed");
        assert_eq!(metadata.story_name, "Подглядывание");
        assert_eq!(metadata.character_count, 2);
    }

    #[tokio::test]
    async fn test_list_saves_sorted_and_skips_garbage() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("saves");
        tokio::fs::create_dir_all(&dir).await.unwrap();

        for name in ["Бета", "Альфа"] {
            let world = StoryWorld::new(create_sample_settings(name));
            let saved = SavedStory::new(world, None);
            saved
                .save_json(dir.join(format!("{name}.json")))
                .await
                .unwrap();
        }
        tokio::fs::write(dir.join("мусор.json"), "{not json")
            .await
            .unwrap();

        let saves = list_saves(&dir).await.expect("List should succeed");
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].metadata.story_name, "Альфа");
        assert_eq!(saves[1].metadata.story_name, "Бета");
    }

    #[tokio::test]
    async fn test_list_saves_creates_missing_dir() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("missing");

        let saves = list_saves(&dir).await.expect("List should succeed");
        assert!(saves.is_empty());
        assert!(dir.exists());
    }
}
