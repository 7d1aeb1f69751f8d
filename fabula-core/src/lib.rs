//! AI-driven interactive fiction engine.
//!
//! This crate provides:
//! - Episode metadata extraction from generated narrative text
//! - An AI narrator backed by the DeepSeek chat API
//! - Story state with cumulative inventory/resource tracking and a journal
//! - Story persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use fabula_core::{GameSettings, SessionConfig, StorySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = GameSettings::new("Тени Сольмара")
//!         .with_setting("Портовый город на краю империи")
//!         .with_genre("фэнтези");
//!
//!     let mut session = StorySession::new(SessionConfig::new(settings))?;
//!
//!     let opening = session.start().await?;
//!     println!("{}", opening.narrative);
//!
//!     let response = session.player_action("Захожу в таверну").await?;
//!     println!("{}", response.narrative);
//!
//!     session.save("story.json").await?;
//!     Ok(())
//! }
//! ```

pub mod memory;
pub mod meta;
pub mod narrator;
pub mod persist;
pub mod session;
pub mod story;
pub mod testing;

// Primary public API
pub use meta::{parse_episode_meta, parse_meta_command, EpisodeMeta, InventoryItem, ResourceDelta};
pub use narrator::{Narrator, NarratorConfig, NarratorError};
pub use session::{SessionConfig, SessionError, StoryResponse, StorySession};
pub use story::{Character, GameSettings, NarrativeMode, PlayerRole, StoryWorld};
pub use testing::{MockNarrator, TestHarness};
