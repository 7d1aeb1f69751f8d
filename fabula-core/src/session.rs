//! StorySession - the primary public API for interactive fiction.
//!
//! A session owns the AI narrator and the story world, and drives the main
//! loop: send a player action, get generated narrative back, extract the
//! episode metadata, and fold it into the running state.

use crate::meta::{parse_episode_meta, EpisodeMeta};
use crate::narrator::{Narrator, NarratorConfig, NarratorError};
use crate::persist::{PersistError, SavedStory};
use crate::story::{EntryKind, GameSettings, StoryWorld};
use rand::seq::SliceRandom;
use std::path::Path;
use thiserror::Error;

/// Errors from StorySession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Narrator error: {0}")]
    Narrator(#[from] NarratorError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("No API key configured - set DEEPSEEK_API_KEY environment variable")]
    NoApiKey,
}

/// Configuration for creating a new story session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Settings for the story being told.
    pub settings: GameSettings,

    /// Model to use for the narrator.
    pub model: Option<String>,

    /// Maximum tokens for narrator responses.
    pub max_tokens: usize,

    /// Temperature for narration.
    pub temperature: Option<f32>,

    /// Whether periodic agent hints are injected.
    pub agents_enabled: bool,
}

impl SessionConfig {
    /// Create a session config from game settings.
    pub fn new(settings: GameSettings) -> Self {
        Self {
            settings,
            model: None,
            max_tokens: 800,
            temperature: Some(0.75),
            agents_enabled: true,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_agents_enabled(mut self, enabled: bool) -> Self {
        self.agents_enabled = enabled;
        self
    }

    fn narrator_config(&self) -> NarratorConfig {
        NarratorConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            agents_enabled: self.agents_enabled,
        }
    }
}

/// Response from one story turn.
#[derive(Debug, Clone)]
pub struct StoryResponse {
    /// Displayable narrative text. When a metadata block was extracted this
    /// is the cleaned story; otherwise it is the raw generated text.
    pub narrative: String,

    /// Structured episode state, when the response carried a metadata block.
    pub meta: Option<EpisodeMeta>,

    /// Episode number of this turn.
    pub episode: u32,
}

/// Prompts offered when the player asks for a random action.
const SUGGESTED_ACTIONS: [&str; 6] = [
    "Осмотреться вокруг",
    "Поговорить с ближайшим персонажем",
    "Исследовать интересный объект",
    "Попытаться что-то неожиданное",
    "Вспомнить что-то важное",
    "Предложить план действий",
];

/// An interactive-fiction session.
///
/// This is the main entry point. It manages:
/// - The story world (settings, characters, totals, journal)
/// - The AI narrator
/// - Session persistence
pub struct StorySession {
    narrator: Narrator,
    world: StoryWorld,
}

impl StorySession {
    /// Create a new story session with the given configuration.
    ///
    /// Requires `DEEPSEEK_API_KEY` environment variable to be set.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let narrator = Narrator::from_env()
            .map_err(|_| SessionError::NoApiKey)?
            .with_config(config.narrator_config());

        let world = StoryWorld::new(config.settings);

        Ok(Self { narrator, world })
    }

    /// Create a session from a pre-configured narrator and world.
    pub fn with_world(narrator: Narrator, world: StoryWorld) -> Self {
        Self { narrator, world }
    }

    /// Load a saved session from a file.
    ///
    /// Requires `DEEPSEEK_API_KEY` environment variable to be set.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let saved = SavedStory::load_json(path).await?;

        let narrator = Narrator::from_env().map_err(|_| SessionError::NoApiKey)?;
        let mut session = Self {
            narrator,
            world: saved.world,
        };

        if let Some(summary) = saved.conversation_summary {
            session.narrator.memory_mut().set_summary(summary);
        }

        Ok(session)
    }

    /// Save the current session to a file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let saved = SavedStory::new(
            self.world.clone(),
            Some(self.narrator.memory().generate_summary()),
        );
        saved.save_json(path).await?;
        Ok(())
    }

    /// Open the story: generate the first scene.
    pub async fn start(&mut self) -> Result<StoryResponse, SessionError> {
        let opening = if self.world.settings.setting.is_empty() {
            "Начни захватывающую историю".to_string()
        } else {
            format!("Начни историю в сеттинге: {}", self.world.settings.setting)
        };
        self.process(&opening).await
    }

    /// Process a player action and get the narrator's response.
    ///
    /// This is the main gameplay loop entry point.
    pub async fn player_action(&mut self, input: &str) -> Result<StoryResponse, SessionError> {
        self.process(input).await
    }

    async fn process(&mut self, input: &str) -> Result<StoryResponse, SessionError> {
        if !input.trim().is_empty() {
            self.world
                .add_narrative(input.trim().to_string(), EntryKind::PlayerAction);
        }

        let raw = self.narrator.narrate(input, &self.world).await?;
        let episode = self.world.current_episode;

        let response = match parse_episode_meta(&raw, episode) {
            Some(meta) => {
                tracing::debug!(
                    episode,
                    inventory = meta.inventory.len(),
                    resources = meta.resources.len(),
                    "episode metadata extracted"
                );
                self.world.apply_meta(&meta);
                StoryResponse {
                    narrative: meta.clean_story.clone(),
                    meta: Some(meta),
                    episode,
                }
            }
            None => {
                // No block: the whole response is plain narrative
                tracing::debug!(episode, "no metadata block in response");
                StoryResponse {
                    narrative: raw,
                    meta: None,
                    episode,
                }
            }
        };

        self.world
            .add_narrative(response.narrative.clone(), EntryKind::Narration);
        self.world.current_episode += 1;

        Ok(response)
    }

    /// Pick a random suggested action for an undecided player.
    pub fn suggest_action(&self) -> &'static str {
        SUGGESTED_ACTIONS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(SUGGESTED_ACTIONS[0])
    }

    /// Get a reference to the story world.
    pub fn world(&self) -> &StoryWorld {
        &self.world
    }

    /// Get a mutable reference to the story world.
    ///
    /// Use with caution - direct modifications bypass the merge rules.
    pub fn world_mut(&mut self) -> &mut StoryWorld {
        &mut self.world
    }

    /// Get a reference to the narrator.
    pub fn narrator(&self) -> &Narrator {
        &self.narrator
    }

    /// Get a mutable reference to the narrator.
    pub fn narrator_mut(&mut self) -> &mut Narrator {
        &mut self.narrator
    }

    /// The story name.
    pub fn story_name(&self) -> &str {
        &self.world.story_name
    }

    /// The episode the next turn will produce.
    pub fn current_episode(&self) -> u32 {
        self.world.current_episode
    }

    /// The most recently journaled location, if any.
    pub fn current_location(&self) -> Option<&str> {
        self.world.current_location()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::create_sample_settings;

    #[test]
    fn test_session_config_builders() {
        let config = SessionConfig::new(create_sample_settings("Тест"))
            .with_model("deepseek-reasoner")
            .with_max_tokens(1200)
            .with_temperature(0.9)
            .with_agents_enabled(false);

        assert_eq!(config.model.as_deref(), Some("deepseek-reasoner"));
        assert_eq!(config.max_tokens, 1200);
        assert_eq!(config.temperature, Some(0.9));
        assert!(!config.agents_enabled);

        let narrator_config = config.narrator_config();
        assert_eq!(narrator_config.max_tokens, 1200);
        assert!(!narrator_config.agents_enabled);
    }

    #[test]
    fn test_suggest_action_draws_from_pool() {
        let narrator = Narrator::new("test-key");
        let world = StoryWorld::new(create_sample_settings("Тест"));
        let session = StorySession::with_world(narrator, world);

        for _ in 0..20 {
            assert!(SUGGESTED_ACTIONS.contains(&session.suggest_action()));
        }
    }
}
