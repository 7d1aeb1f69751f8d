//! Testing utilities for the story engine.
//!
//! This module provides tools for integration testing:
//! - `MockNarrator` for deterministic testing without API calls
//! - `TestHarness` for scripted story scenarios
//! - Assertion helpers for verifying story state

use crate::meta::parse_episode_meta;
use crate::session::StoryResponse;
use crate::story::{create_sample_settings, EntryKind, GameSettings, StoryWorld};

/// A mock narrator that returns scripted raw responses.
///
/// Scripted texts may carry `**[МЕТА]** … ---` blocks; the harness runs
/// them through the real extractor, so tests exercise the same path as a
/// live session.
pub struct MockNarrator {
    /// Scripted responses to return in order.
    responses: Vec<String>,
    /// Index of next response to return.
    response_index: usize,
}

impl MockNarrator {
    /// Create a new mock narrator with scripted responses.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            response_index: 0,
        }
    }

    /// Return the next scripted response.
    pub fn next_response(&mut self) -> String {
        if self.response_index < self.responses.len() {
            let response = self.responses[self.response_index].clone();
            self.response_index += 1;
            response
        } else {
            "Рассказчику больше нечего сказать.".to_string()
        }
    }

    /// Add a response to the queue.
    pub fn queue_response(&mut self, response: impl Into<String>) {
        self.responses.push(response.into());
    }

    /// Reset the response index to replay from the beginning.
    pub fn reset(&mut self) {
        self.response_index = 0;
    }
}

/// Test harness for running story scenarios without API calls.
///
/// Mirrors the session's turn processing: scripted text goes through
/// metadata extraction and state merging exactly as a live response would.
pub struct TestHarness {
    /// The mock narrator.
    pub narrator: MockNarrator,
    /// The story world.
    pub world: StoryWorld,
}

impl TestHarness {
    /// Create a new test harness with sample settings.
    pub fn new() -> Self {
        Self::with_settings(create_sample_settings("Тестовая история"))
    }

    /// Create a test harness with custom settings.
    pub fn with_settings(settings: GameSettings) -> Self {
        Self {
            narrator: MockNarrator::new(Vec::new()),
            world: StoryWorld::new(settings),
        }
    }

    /// Queue a scripted narrator response.
    pub fn expect_response(&mut self, text: impl Into<String>) -> &mut Self {
        self.narrator.queue_response(text);
        self
    }

    /// Send player input and get the processed response.
    pub fn input(&mut self, text: &str) -> StoryResponse {
        if !text.trim().is_empty() {
            self.world
                .add_narrative(text.trim().to_string(), EntryKind::PlayerAction);
        }

        let raw = self.narrator.next_response();
        let episode = self.world.current_episode;

        let response = match parse_episode_meta(&raw, episode) {
            Some(meta) => {
                self.world.apply_meta(&meta);
                StoryResponse {
                    narrative: meta.clean_story.clone(),
                    meta: Some(meta),
                    episode,
                }
            }
            None => StoryResponse {
                narrative: raw,
                meta: None,
                episode,
            },
        };

        self.world
            .add_narrative(response.narrative.clone(), EntryKind::Narration);
        self.world.current_episode += 1;

        response
    }

    /// Number of journaled episodes.
    pub fn journal_len(&self) -> usize {
        self.world.journal.len()
    }

    /// Quantity of a named inventory item.
    pub fn item_count(&self, name: &str) -> u32 {
        self.world.item_count(name)
    }

    /// Cumulative value of a named resource, if known.
    pub fn resource_value(&self, name: &str) -> Option<i64> {
        self.world.resource(name).map(|r| r.value)
    }

    /// The last narrative entry.
    pub fn last_narrative(&self) -> Option<&str> {
        self.world
            .narrative_history
            .last()
            .map(|e| e.content.as_str())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the harness holds the expected quantity of an item.
#[track_caller]
pub fn assert_item(harness: &TestHarness, name: &str, quantity: u32) {
    let actual = harness.item_count(name);
    assert_eq!(
        actual, quantity,
        "Expected {quantity} of '{name}', got {actual}"
    );
}

/// Assert a resource total.
#[track_caller]
pub fn assert_resource(harness: &TestHarness, name: &str, value: i64) {
    let actual = harness.resource_value(name);
    assert_eq!(
        actual,
        Some(value),
        "Expected resource '{name}' = {value}, got {actual:?}"
    );
}

/// Assert the episode the next turn will produce.
#[track_caller]
pub fn assert_episode(harness: &TestHarness, episode: u32) {
    assert_eq!(
        harness.world.current_episode, episode,
        "Expected current episode {episode}, got {}",
        harness.world.current_episode
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_narrator_basic() {
        let mut harness = TestHarness::new();
        harness.expect_response("Ты стоишь посреди пыльной таверны.");

        let response = harness.input("Осматриваюсь");

        assert_eq!(response.narrative, "Ты стоишь посреди пыльной таверны.");
        assert!(response.meta.is_none());
        assert_eq!(response.episode, 1);
    }

    #[test]
    fn test_scripted_meta_flows_through_extractor() {
        let mut harness = TestHarness::new();
        harness.expect_response(
            "**[МЕТА]**\n🎒 Инвентарь: Меч (1)\n💰 Ресурсы: Золото: 100 (+100)\n---\nТы находишь меч и кошель.",
        );

        let response = harness.input("Обыскиваю сундук");

        assert_eq!(response.narrative, "Ты находишь меч и кошель.");
        assert!(response.meta.is_some());
        assert_item(&harness, "Меч", 1);
        assert_resource(&harness, "Золото", 100);
        assert_eq!(harness.journal_len(), 1);
    }

    #[test]
    fn test_responses_exhausted() {
        let mut harness = TestHarness::new();
        harness.expect_response("Первый ответ");

        assert_eq!(harness.input("раз").narrative, "Первый ответ");
        assert!(harness.input("два").narrative.contains("нечего сказать"));
    }

    #[test]
    fn test_episode_advances_per_turn() {
        let mut harness = TestHarness::new();
        harness.expect_response("Один").expect_response("Два");

        assert_episode(&harness, 1);
        harness.input("а");
        assert_episode(&harness, 2);
        harness.input("б");
        assert_episode(&harness, 3);
    }
}
