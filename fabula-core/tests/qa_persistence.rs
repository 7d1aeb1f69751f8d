//! QA tests for story persistence.
//!
//! Plays scripted turns through the harness, saves the resulting world, and
//! verifies everything needed to resume comes back intact.

use fabula_core::persist::{auto_save_path, list_saves, SavedStory};
use fabula_core::testing::TestHarness;
use tempfile::TempDir;

const SCRIPTED_TURN: &str = "**[МЕТА]**\n\
⏰ Время/место: Вечер, маяк на скале\n\
🎬 События: Найден дневник смотрителя\n\
🔍 Улики: Страницы вырваны\n\
🎒 Инвентарь: Дневник (1), Фонарь\n\
💰 Ресурсы: Масло: 3 (-1)\n\
---\n\
Ты поднимаешься на маяк и находишь дневник смотрителя.";

fn played_harness() -> TestHarness {
    let mut harness = TestHarness::new();
    harness.expect_response(SCRIPTED_TURN);
    harness.input("Поднимаюсь на маяк");
    harness
}

#[tokio::test]
async fn test_played_world_survives_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("лестница.json");

    let harness = played_harness();
    let saved = SavedStory::new(harness.world.clone(), Some("Герой нашёл дневник.".into()));
    saved.save_json(&path).await.expect("Save should succeed");

    let loaded = SavedStory::load_json(&path).await.expect("Load should succeed");

    assert_eq!(loaded.world.current_episode, 2);
    assert_eq!(loaded.world.journal.len(), 1);
    assert_eq!(loaded.world.item_count("Дневник"), 1);
    assert_eq!(loaded.world.item_count("Фонарь"), 1);
    assert_eq!(loaded.world.resource("Масло").map(|r| r.value), Some(3));
    assert_eq!(loaded.world.current_location(), Some("маяк на скале"));
    assert_eq!(
        loaded.conversation_summary.as_deref(),
        Some("Герой нашёл дневник.")
    );

    let journal = &loaded.world.journal[0];
    assert_eq!(journal.events, vec!["Найден дневник смотрителя"]);
    assert_eq!(journal.clues, vec!["Страницы вырваны"]);
}

#[tokio::test]
async fn test_resumed_world_keeps_merging() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("resume.json");

    let harness = played_harness();
    SavedStory::new(harness.world.clone(), None)
        .save_json(&path)
        .await
        .expect("Save should succeed");

    let loaded = SavedStory::load_json(&path).await.expect("Load should succeed");
    let mut resumed = TestHarness::with_settings(loaded.world.settings.clone());
    resumed.world = loaded.world;

    resumed.expect_response(
        "**[МЕТА]**\n🎒 Инвентарь: Фонарь (1)\n💰 Ресурсы: Масло: 2 (-1)\n---\nФонарь чадит, масла всё меньше.",
    );
    let response = resumed.input("Зажигаю фонарь");

    // Episode numbering continues from the save
    assert_eq!(response.episode, 2);
    assert_eq!(resumed.world.item_count("Фонарь"), 2);
    assert_eq!(resumed.world.resource("Масло").map(|r| r.value), Some(2));
    assert_eq!(resumed.world.journal.len(), 2);
}

#[tokio::test]
async fn test_listing_shows_peeked_metadata() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dir = temp_dir.path().join("saves");
    tokio::fs::create_dir_all(&dir).await.unwrap();

    let harness = played_harness();
    let path = auto_save_path(&dir, harness.world.story_name.as_str());
    SavedStory::new(harness.world.clone(), None)
        .save_json(&path)
        .await
        .expect("Save should succeed");

    let saves = list_saves(&dir).await.expect("List should succeed");
    assert_eq!(saves.len(), 1);

    let meta = &saves[0].metadata;
    assert_eq!(meta.story_name, "Тестовая история");
    assert_eq!(meta.current_episode, 2);
    assert_eq!(meta.location.as_deref(), Some("маяк на скале"));
    assert_eq!(meta.character_count, 2);
}
