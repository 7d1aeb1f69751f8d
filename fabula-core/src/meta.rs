//! Episode metadata extraction from generated narrative text.
//!
//! The narrator model is instructed to embed one tagged metadata block per
//! response, delimited by a literal `**[МЕТА]**` marker and a trailing `---`
//! line. Inside the block, each field lives on its own emoji-prefixed,
//! colon-delimited line. This module locates the block, extracts the fields
//! it can, and returns the narrative with the block stripped out.
//!
//! Extraction never fails: a missing or malformed field simply comes back
//! empty, and the only binary outcome is whether the block marker was found
//! at all (`None` means the whole text is plain narrative).

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The tagged fields a metadata block may carry, in protocol order.
///
/// `Relations` is matched for completeness but not surfaced in
/// [`EpisodeMeta`]; the `npcs` field it would feed is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Time,
    Events,
    Relations,
    Emotions,
    Clues,
    Questions,
    Plans,
    Inventory,
    Resources,
}

/// Emoji tag for each field, as emitted by the narrator prompt.
const FIELD_TAGS: [(Field, &str); 9] = [
    (Field::Time, "⏰"),
    (Field::Events, "🎬"),
    (Field::Relations, "💕"),
    (Field::Emotions, "🧠"),
    (Field::Clues, "🔍"),
    (Field::Questions, "❓"),
    (Field::Plans, "🎯"),
    (Field::Inventory, "🎒"),
    (Field::Resources, "💰"),
];

lazy_static! {
    /// Smallest span from the block marker to the first `---` line.
    static ref META_BLOCK_RE: Regex =
        Regex::new(r"(?s)\*\*\[МЕТА\]\*\*(.*?)---").expect("valid meta block regex");

    /// Same span plus trailing whitespace, for stripping.
    static ref META_STRIP_RE: Regex =
        Regex::new(r"(?s)\*\*\[МЕТА\]\*\*.*?---\s*").expect("valid meta strip regex");

    /// One compiled matcher per tagged field, applied independently.
    static ref FIELD_RES: Vec<(Field, Regex)> = FIELD_TAGS
        .iter()
        .map(|(field, tag)| {
            let re = Regex::new(&format!(r"{tag}[^:\n]*:\s*(.+)"))
                .expect("valid field regex");
            (*field, re)
        })
        .collect();

    /// Trailing parenthesized count on an inventory entry.
    static ref ITEM_COUNT_RE: Regex =
        Regex::new(r"^(.*?)\s*\((\d+)\)$").expect("valid item count regex");

    /// `Name: value` with an optional parenthesized signed delta.
    static ref RESOURCE_RE: Regex =
        Regex::new(r"^(.+?):\s*([+-]?\d+)\s*(?:\(([+-]?\d+)\))?$")
            .expect("valid resource regex");

    /// Leading meta-command prefix on a player message.
    static ref META_COMMAND_RE: Regex =
        Regex::new(r"^@\[МЕТА-КОМАНДА\]:\s*(.+?)\n\n").expect("valid meta command regex");
}

/// Structured episode state extracted from one narrator response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeMeta {
    /// Episode number, supplied by the caller.
    pub episode: u32,

    /// Display title derived from the episode number.
    pub title: String,

    /// Free-form time/place descriptor, verbatim from the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    /// Last comma-separated segment of `time`, trimmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    pub events: Vec<String>,

    /// Reserved: no pattern populates this yet.
    pub npcs: Vec<String>,

    pub emotions: Vec<String>,
    pub clues: Vec<String>,
    pub questions: Vec<String>,
    pub plans: Vec<String>,

    pub inventory: Vec<InventoryItem>,
    pub resources: Vec<ResourceDelta>,

    /// The input text with the metadata block removed.
    pub clean_story: String,
}

/// One inventory entry reported for the episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,

    /// Absent when the entry carried no parenthesized count; consumers may
    /// treat that as an implicit 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

/// One resource entry reported for the episode: an absolute value and an
/// optional signed change relative to the previous episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDelta {
    pub name: String,
    pub value: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<i64>,
}

/// Extract episode metadata from a raw narrative blob.
///
/// Returns `None` when no metadata block delimiter is present; the caller
/// must then treat the entire input as plain narrative text. Otherwise every
/// field is extracted independently — one field's absence never affects the
/// others.
pub fn parse_episode_meta(story: &str, episode: u32) -> Option<EpisodeMeta> {
    let block = META_BLOCK_RE.captures(story)?;
    let meta_text = block.get(1).map_or("", |m| m.as_str());

    let mut fields: [Option<String>; 9] = Default::default();
    for (i, (_, re)) in FIELD_RES.iter().enumerate() {
        if let Some(captures) = re.captures(meta_text) {
            fields[i] = Some(captures[1].trim().to_string());
        }
    }

    let [time_raw, events, _relations, emotions, clues, questions, plans, inventory, resources] =
        fields;

    let location = time_raw.as_deref().map(|t| {
        t.rsplit(',')
            .next()
            .unwrap_or(t)
            .trim()
            .to_string()
    });

    let clean_story = META_STRIP_RE.replace(story, "").into_owned();

    Some(EpisodeMeta {
        episode,
        title: format!("Эпизод {episode}"),
        time: time_raw,
        location,
        events: events.into_iter().collect(),
        npcs: Vec::new(),
        emotions: emotions.into_iter().collect(),
        clues: clues.into_iter().collect(),
        questions: questions.into_iter().collect(),
        plans: plans.into_iter().collect(),
        inventory: inventory.as_deref().map_or_else(Vec::new, parse_inventory),
        resources: resources.as_deref().map_or_else(Vec::new, parse_resources),
        clean_story,
    })
}

/// Parse a comma-separated inventory field.
///
/// A trailing `(n)` becomes the quantity; everything else is the item name.
/// Empty pieces are skipped.
fn parse_inventory(field: &str) -> Vec<InventoryItem> {
    field
        .split(',')
        .filter_map(|piece| {
            let piece = piece.trim();
            if piece.is_empty() {
                return None;
            }

            if let Some(captures) = ITEM_COUNT_RE.captures(piece) {
                if let Ok(quantity) = captures[2].parse::<u32>() {
                    return Some(InventoryItem {
                        name: captures[1].trim().to_string(),
                        quantity: Some(quantity),
                    });
                }
            }

            Some(InventoryItem {
                name: piece.to_string(),
                quantity: None,
            })
        })
        .collect()
}

/// Parse a comma-separated resources field.
///
/// Each piece must match `Name: value` with an optional `(±delta)`; pieces
/// that do not are dropped from the result.
fn parse_resources(field: &str) -> Vec<ResourceDelta> {
    field
        .split(',')
        .filter_map(|piece| {
            let captures = RESOURCE_RE.captures(piece.trim())?;
            let value = captures[2].parse::<i64>().ok()?;
            let change = captures
                .get(3)
                .and_then(|m| m.as_str().parse::<i64>().ok());

            Some(ResourceDelta {
                name: captures[1].trim().to_string(),
                value,
                change,
            })
        })
        .collect()
}

/// Split a leading `@[МЕТА-КОМАНДА]: …` prefix off a player message.
///
/// Returns the command text and the remainder of the message, or `None`
/// when the message carries no such prefix.
pub fn parse_meta_command(text: &str) -> Option<(String, &str)> {
    let captures = META_COMMAND_RE.captures(text)?;
    let matched = captures.get(0)?;
    Some((captures[1].trim().to_string(), &text[matched.end()..]))
}
