//! Narrator memory for context management.
//!
//! Keeps a sliding window of the recent conversation (the model only ever
//! sees the last few exchanges), a summary of what fell out of the window,
//! and the turn counter that drives periodic agent hints.

use crate::story::Character;
use deepseek::Message;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Maximum number of exchanges (player + narrator message pairs) replayed
/// to the model.
const MAX_RECENT_EXCHANGES: usize = 10;

/// Narrator memory: conversation window, summary, and turn counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarratorMemory {
    /// Recent conversation history (sliding window).
    recent_messages: Vec<StoredMessage>,

    /// Summary of older conversation, restored from saves.
    pub conversation_summary: Option<String>,

    /// Turns taken so far.
    turn: u32,
}

impl NarratorMemory {
    pub fn new() -> Self {
        Self {
            recent_messages: Vec::new(),
            conversation_summary: None,
            turn: 0,
        }
    }

    /// Advance the turn counter. Call once per player action.
    pub fn advance_turn(&mut self) {
        self.turn += 1;
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Add a player message to history.
    pub fn add_player_message(&mut self, content: &str) {
        self.recent_messages.push(StoredMessage {
            role: MessageRole::User,
            content: content.to_string(),
        });
        self.trim_history();
    }

    /// Add a narrator response to history.
    pub fn add_narrator_message(&mut self, content: &str) {
        self.recent_messages.push(StoredMessage {
            role: MessageRole::Assistant,
            content: content.to_string(),
        });
        self.trim_history();
    }

    /// Get windowed messages for an API call.
    pub fn get_messages(&self) -> Vec<Message> {
        self.recent_messages
            .iter()
            .map(|m| match m.role {
                MessageRole::User => Message::user(&m.content),
                MessageRole::Assistant => Message::assistant(&m.content),
            })
            .collect()
    }

    /// Periodic hint appended to the player action to keep the narrator on
    /// track: plot reminders every 3rd turn, atmosphere every 5th, and a
    /// nudge about a random known character every 7th.
    pub fn agent_hint(&self, characters: &[Character]) -> Option<String> {
        if self.turn == 0 {
            return None;
        }

        if self.turn % 3 == 0 {
            return Some(
                "\n\n[АГЕНТ-НАБЛЮДАТЕЛЬ: Не забывай про сюжетные линии и персонажей. \
                 Время идёт, что-то должно происходить!]"
                    .to_string(),
            );
        }

        if self.turn % 5 == 0 {
            return Some(
                "\n\n[АГЕНТ-ВРЕМЕНИ: Напомни про время суток, погоду, атмосферу. \
                 Мир должен жить!]"
                    .to_string(),
            );
        }

        if self.turn % 7 == 0 {
            if let Some(character) = characters.choose(&mut rand::thread_rng()) {
                return Some(format!(
                    "\n\n[АГЕНТ-ПЕРСОНАЖЕЙ: А что делает {}? Покажи их действия и эмоции!]",
                    character.name
                ));
            }
        }

        None
    }

    /// Set conversation summary (from a loaded save).
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.conversation_summary = Some(summary.into());
    }

    /// Generate a summary of the current conversation for persistence.
    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();

        let message_count = self.recent_messages.len();
        summary.push_str(&format!("Сессия из {} обменов.\n", message_count / 2));

        let player_actions: Vec<_> = self
            .recent_messages
            .iter()
            .filter(|m| matches!(m.role, MessageRole::User))
            .map(|m| &m.content)
            .rev()
            .take(5)
            .collect();

        if !player_actions.is_empty() {
            summary.push_str("Последние действия игрока:\n");
            for action in player_actions.iter().rev() {
                // Unicode-safe truncation of long actions
                let truncated = if action.chars().count() > 100 {
                    let head: String = action.chars().take(100).collect();
                    format!("{head}...")
                } else {
                    action.to_string()
                };
                summary.push_str(&format!("- {truncated}\n"));
            }
        }

        summary
    }

    /// Clear conversation history; the summary and turn counter survive.
    pub fn clear_conversation(&mut self) {
        self.recent_messages.clear();
    }

    /// Number of stored messages.
    pub fn message_count(&self) -> usize {
        self.recent_messages.len()
    }

    fn trim_history(&mut self) {
        while self.recent_messages.len() > MAX_RECENT_EXCHANGES * 2 {
            self.recent_messages.remove(0);
        }
    }
}

impl Default for NarratorMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// A stored message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMessage {
    role: MessageRole,
    content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum MessageRole {
    User,
    Assistant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_creation() {
        let memory = NarratorMemory::new();
        assert_eq!(memory.message_count(), 0);
        assert_eq!(memory.turn(), 0);
    }

    #[test]
    fn test_add_messages() {
        let mut memory = NarratorMemory::new();
        memory.add_player_message("Осматриваюсь");
        memory.add_narrator_message("Вокруг темно.");

        assert_eq!(memory.message_count(), 2);
    }

    #[test]
    fn test_trim_history_window() {
        let mut memory = NarratorMemory::new();

        for i in 0..30 {
            memory.add_player_message(&format!("Действие {i}"));
            memory.add_narrator_message(&format!("Ответ {i}"));
        }

        assert_eq!(memory.message_count(), MAX_RECENT_EXCHANGES * 2);
        // Oldest messages dropped, newest kept
        let messages = memory.get_messages();
        assert_eq!(messages.last().unwrap().content, "Ответ 29");
    }

    #[test]
    fn test_agent_hints_by_turn() {
        let mut memory = NarratorMemory::new();
        let characters = vec![Character::new("Ирен", "спутница")];

        // Turn 0: no hint before the first action
        assert!(memory.agent_hint(&characters).is_none());

        let mut hints_by_turn = Vec::new();
        for _ in 0..7 {
            memory.advance_turn();
            hints_by_turn.push((memory.turn(), memory.agent_hint(&characters)));
        }

        for (turn, hint) in hints_by_turn {
            match turn {
                3 | 6 => assert!(hint.unwrap().contains("АГЕНТ-НАБЛЮДАТЕЛЬ")),
                5 => assert!(hint.unwrap().contains("АГЕНТ-ВРЕМЕНИ")),
                7 => {
                    let hint = hint.unwrap();
                    assert!(hint.contains("АГЕНТ-ПЕРСОНАЖЕЙ"));
                    assert!(hint.contains("Ирен"));
                }
                _ => assert!(hint.is_none()),
            }
        }
    }

    #[test]
    fn test_character_hint_requires_characters() {
        let mut memory = NarratorMemory::new();
        for _ in 0..7 {
            memory.advance_turn();
        }
        assert_eq!(memory.turn(), 7);
        assert!(memory.agent_hint(&[]).is_none());
    }

    #[test]
    fn test_summary_truncates_long_actions() {
        let mut memory = NarratorMemory::new();
        let long_action = "я ".repeat(120);
        memory.add_player_message(&long_action);

        let summary = memory.generate_summary();
        assert!(summary.contains("..."));
        assert!(summary.contains("Последние действия игрока"));
    }

    #[test]
    fn test_clear_keeps_summary() {
        let mut memory = NarratorMemory::new();
        memory.add_player_message("Иду");
        memory.set_summary("Герой вошёл в город.");
        memory.clear_conversation();

        assert_eq!(memory.message_count(), 0);
        assert_eq!(
            memory.conversation_summary.as_deref(),
            Some("Герой вошёл в город.")
        );
    }
}
