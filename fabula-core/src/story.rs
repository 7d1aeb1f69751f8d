//! Story world state.
//!
//! Holds everything a running story accumulates: the game settings chosen at
//! creation, the character roster, cumulative inventory and resource totals,
//! the episode journal, and the narrative history. The merge rules that fold
//! each episode's extracted metadata into the running totals live here.

use crate::meta::EpisodeMeta;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A story character, player-created or introduced by the narrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub role: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

impl Character {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            role: role.into(),
            description: String::new(),
            avatar: None,
            level: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Who the player is within the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    /// The player steers the story from outside, like a co-author.
    Author,
    /// The player acts as the protagonist.
    Hero,
}

/// Narrative perspective the narrator should write in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NarrativeMode {
    First,
    Third,
    LoveInterest,
}

/// Settings chosen when the story was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    /// Story name.
    pub name: String,

    /// Free-form world/setting description.
    pub setting: String,

    pub role: PlayerRole,
    pub narrative_mode: NarrativeMode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,

    /// Prose elaborateness, 1 (plain) to 5 (literary).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eloquence_level: Option<u8>,

    /// Extra instructions appended to the system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_instructions: Option<String>,

    /// Characters present from the start.
    #[serde(default)]
    pub initial_characters: Vec<Character>,
}

impl GameSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setting: String::new(),
            role: PlayerRole::Hero,
            narrative_mode: NarrativeMode::Third,
            genre: None,
            rating: None,
            eloquence_level: None,
            ai_instructions: None,
            initial_characters: Vec::new(),
        }
    }

    pub fn with_setting(mut self, setting: impl Into<String>) -> Self {
        self.setting = setting.into();
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_rating(mut self, rating: impl Into<String>) -> Self {
        self.rating = Some(rating.into());
        self
    }

    pub fn with_role(mut self, role: PlayerRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_narrative_mode(mut self, mode: NarrativeMode) -> Self {
        self.narrative_mode = mode;
        self
    }

    pub fn with_eloquence_level(mut self, level: u8) -> Self {
        self.eloquence_level = Some(level);
        self
    }

    pub fn with_ai_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.ai_instructions = Some(instructions.into());
        self
    }

    pub fn with_character(mut self, character: Character) -> Self {
        self.initial_characters.push(character);
        self
    }
}

/// A cumulative inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub name: String,
    pub quantity: u32,
}

/// A cumulative resource total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTotal {
    pub name: String,
    pub value: i64,
    /// The change reported in the most recent episode, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_change: Option<i64>,
}

/// What kind of narrative entry this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    PlayerAction,
    Narration,
}

/// One entry in the narrative history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeEntry {
    pub kind: EntryKind,
    pub content: String,
    pub episode: u32,
}

/// The complete state of one running story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryWorld {
    pub story_name: String,
    pub settings: GameSettings,
    pub characters: Vec<Character>,
    pub inventory: Vec<InventorySlot>,
    pub resources: Vec<ResourceTotal>,
    pub journal: Vec<EpisodeMeta>,
    pub narrative_history: Vec<NarrativeEntry>,
    pub current_episode: u32,
}

impl StoryWorld {
    /// Create a fresh world from game settings.
    pub fn new(settings: GameSettings) -> Self {
        Self {
            story_name: settings.name.clone(),
            characters: settings.initial_characters.clone(),
            settings,
            inventory: Vec::new(),
            resources: Vec::new(),
            journal: Vec::new(),
            narrative_history: Vec::new(),
            current_episode: 1,
        }
    }

    /// Append an entry to the narrative history.
    pub fn add_narrative(&mut self, content: String, kind: EntryKind) {
        self.narrative_history.push(NarrativeEntry {
            kind,
            content,
            episode: self.current_episode,
        });
    }

    /// Add a character unless one with the same name already exists.
    pub fn add_character(&mut self, character: Character) -> bool {
        if self.characters.iter().any(|c| c.name == character.name) {
            return false;
        }
        self.characters.push(character);
        true
    }

    /// Fold one episode's extracted metadata into the running state.
    ///
    /// Resource totals adopt each reported absolute value; inventory
    /// additions accumulate, with a quantity-less entry counting as 1. The
    /// episode is appended to the journal.
    pub fn apply_meta(&mut self, meta: &EpisodeMeta) {
        for item in &meta.inventory {
            let added = item.quantity.unwrap_or(1);
            match self.inventory.iter_mut().find(|s| s.name == item.name) {
                Some(slot) => slot.quantity += added,
                None => self.inventory.push(InventorySlot {
                    name: item.name.clone(),
                    quantity: added,
                }),
            }
        }

        for resource in &meta.resources {
            match self.resources.iter_mut().find(|r| r.name == resource.name) {
                Some(total) => {
                    total.value = resource.value;
                    total.last_change = resource.change;
                }
                None => self.resources.push(ResourceTotal {
                    name: resource.name.clone(),
                    value: resource.value,
                    last_change: resource.change,
                }),
            }
        }

        self.journal.push(meta.clone());
    }

    /// Look up a cumulative resource total by name.
    pub fn resource(&self, name: &str) -> Option<&ResourceTotal> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Quantity of a named inventory item (0 when absent).
    pub fn item_count(&self, name: &str) -> u32 {
        self.inventory
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.quantity)
            .unwrap_or(0)
    }

    /// The most recently journaled location, if any episode reported one.
    pub fn current_location(&self) -> Option<&str> {
        self.journal
            .iter()
            .rev()
            .find_map(|e| e.location.as_deref())
    }
}

/// Create sample settings for tests and demos: a small fantasy setup with
/// two starting characters.
pub fn create_sample_settings(name: impl Into<String>) -> GameSettings {
    GameSettings::new(name)
        .with_setting("Портовый город Сольмар на краю империи")
        .with_genre("фэнтези")
        .with_rating("16+")
        .with_eloquence_level(3)
        .with_character(
            Character::new("Ирен", "спутница").with_description("наёмница с тёмным прошлым"),
        )
        .with_character(Character::new("Торвик", "торговец").with_description("знает все слухи"))
}
