//! AI narrator agent.
//!
//! The `Narrator` wraps the DeepSeek client with everything a story turn
//! needs: the system prompt assembled from the game settings, the sliding
//! conversation window, and the periodic agent hints that keep long stories
//! from stalling.

use crate::memory::NarratorMemory;
use crate::story::{GameSettings, StoryWorld};
use deepseek::{DeepSeek, Message, Request};
use thiserror::Error;

/// Errors from the narrator agent.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("DeepSeek API error: {0}")]
    Api(#[from] deepseek::Error),

    #[error("No API key configured")]
    NoApiKey,
}

/// Configuration for the narrator.
#[derive(Debug, Clone)]
pub struct NarratorConfig {
    /// The model to use (defaults to deepseek-chat).
    pub model: Option<String>,

    /// Maximum tokens per response.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// Whether agent hints are appended to player actions.
    pub agents_enabled: bool,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 800,
            temperature: Some(0.75),
            agents_enabled: true,
        }
    }
}

/// The AI narrator.
pub struct Narrator {
    client: DeepSeek,
    config: NarratorConfig,
    memory: NarratorMemory,
}

impl Narrator {
    /// Create a new narrator with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: DeepSeek::new(api_key),
            config: NarratorConfig::default(),
            memory: NarratorMemory::new(),
        }
    }

    /// Create a narrator from the DEEPSEEK_API_KEY environment variable.
    pub fn from_env() -> Result<Self, NarratorError> {
        let client = DeepSeek::from_env().map_err(|_| NarratorError::NoApiKey)?;
        Ok(Self {
            client,
            config: NarratorConfig::default(),
            memory: NarratorMemory::new(),
        })
    }

    /// Configure the narrator.
    pub fn with_config(mut self, config: NarratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the current memory.
    pub fn memory(&self) -> &NarratorMemory {
        &self.memory
    }

    /// Get mutable access to memory.
    pub fn memory_mut(&mut self) -> &mut NarratorMemory {
        &mut self.memory
    }

    /// Generate the next narrative beat for a player action.
    ///
    /// An empty action asks the narrator to open the story. Returns the raw
    /// generated text; metadata extraction is the caller's concern.
    pub async fn narrate(
        &mut self,
        player_action: &str,
        world: &StoryWorld,
    ) -> Result<String, NarratorError> {
        self.memory.advance_turn();

        let mut action = player_action.trim().to_string();
        if self.config.agents_enabled {
            if let Some(hint) = self.memory.agent_hint(&world.characters) {
                action.push_str(&hint);
            }
        }

        let user_content = if action.is_empty() {
            "Начни игру. Опиши стартовую сцену.".to_string()
        } else {
            format!("Действие игрока: {action}")
        };

        let mut messages = vec![Message::system(self.build_system_prompt(&world.settings))];
        messages.extend(self.memory.get_messages());
        messages.push(Message::user(&user_content));

        let mut request = Request::new(messages).with_max_tokens(self.config.max_tokens);
        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.client.complete(request).await?;
        tracing::debug!(
            turn = self.memory.turn(),
            completion_tokens = response.usage.completion_tokens,
            "narrator reply received"
        );

        self.memory.add_player_message(&user_content);
        self.memory.add_narrator_message(&response.content);

        Ok(response.content)
    }

    /// Assemble the system prompt from the game settings.
    fn build_system_prompt(&self, settings: &GameSettings) -> String {
        let genre = settings.genre.as_deref().unwrap_or("фэнтези");
        let rating = settings.rating.as_deref().unwrap_or("18+");

        let tone = match settings.eloquence_level.unwrap_or(3) {
            0..=2 => "простые фразы",
            3..=4 => "умеренный стиль",
            _ => "литературный стиль",
        };

        let characters = if settings.initial_characters.is_empty() {
            "нет".to_string()
        } else {
            settings
                .initial_characters
                .iter()
                .take(3)
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let setting = if settings.setting.is_empty() {
            genre
        } else {
            &settings.setting
        };

        let mut prompt = format!(
            "МАСТЕР ИГРЫ. Жанр: {genre}, рейтинг: {rating}.\n\
             Сеттинг: {setting}\n\
             Персонажи: {characters}\n\
             Стиль: {tone}.\n\n"
        );

        prompt.push_str(include_str!("prompts/narrator_base.txt"));
        prompt.push('\n');
        prompt.push_str(include_str!("prompts/meta_format.txt"));

        if let Some(ref instructions) = settings.ai_instructions {
            prompt.push_str("\nДополнительные инструкции:\n");
            prompt.push_str(instructions);
        }

        prompt
    }
}
