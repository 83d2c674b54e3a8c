//! Book and chapter blueprint types.
//!
//! A [`BookBlueprint`] is the approved, pre-generation plan for a book. It is
//! borrowed immutably for the whole of a generation session.

use crate::GenerationConfig;
use folio_error::{FolioResult, ValidationError, ValidationErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The complete plan for a book.
///
/// # Examples
///
/// ```
/// use folio_core::{BookBlueprint, ChapterBlueprint};
///
/// let mut blueprint = BookBlueprint::new("bp-1", "The Lantern Road");
/// blueprint.chapters.push(ChapterBlueprint::new(2, "Crossing"));
/// blueprint.chapters.push(ChapterBlueprint::new(1, "Departure"));
///
/// let numbers: Vec<u32> = blueprint.chapters_in_order().iter().map(|c| c.number).collect();
/// assert_eq!(numbers, vec![1, 2]);
/// assert!(blueprint.chapter(2).is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookBlueprint {
    /// Stable blueprint identifier
    pub id: String,
    /// Working title of the book
    pub title: String,
    /// Edit version; bumped whenever an approved blueprint is changed
    #[serde(default = "default_version")]
    pub version: u32,
    /// Act structure
    #[serde(default)]
    pub acts: Vec<ActOutline>,
    /// Per-chapter plans
    #[serde(default)]
    pub chapters: Vec<ChapterBlueprint>,
    /// Character bible, in blueprint order
    #[serde(default)]
    pub characters: Vec<CharacterProfile>,
    /// World bible
    #[serde(default)]
    pub world: WorldBible,
    /// Plot architecture
    #[serde(default)]
    pub plot: PlotArchitecture,
    /// Style guide
    #[serde(default)]
    pub style: StyleGuide,
    /// Generation settings used for every chapter of this book
    #[serde(default)]
    pub generation: GenerationConfig,
}

fn default_version() -> u32 {
    1
}

impl BookBlueprint {
    /// Create an empty blueprint with default generation settings.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            version: 1,
            acts: Vec::new(),
            chapters: Vec::new(),
            characters: Vec::new(),
            world: WorldBible::default(),
            plot: PlotArchitecture::default(),
            style: StyleGuide::default(),
            generation: GenerationConfig::default(),
        }
    }

    /// Look up the chapter blueprint for a chapter number.
    pub fn chapter(&self, number: u32) -> Option<&ChapterBlueprint> {
        self.chapters.iter().find(|c| c.number == number)
    }

    /// Chapter blueprints sorted by ascending chapter number.
    pub fn chapters_in_order(&self) -> Vec<&ChapterBlueprint> {
        let mut chapters: Vec<&ChapterBlueprint> = self.chapters.iter().collect();
        chapters.sort_by_key(|c| c.number);
        chapters
    }

    /// Look up a character by id.
    pub fn character(&self, id: &str) -> Option<&CharacterProfile> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// Look up a location by id.
    pub fn location(&self, id: &str) -> Option<&Location> {
        self.world.locations.iter().find(|l| l.id == id)
    }

    /// The act whose chapter range contains `chapter_number`.
    pub fn act_for_chapter(&self, chapter_number: u32) -> Option<&ActOutline> {
        self.acts
            .iter()
            .find(|a| (a.first_chapter..=a.last_chapter).contains(&chapter_number))
    }

    /// Check structural invariants: chapter numbers must be unique.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first duplicated chapter number.
    pub fn validate(&self) -> FolioResult<()> {
        let mut seen = BTreeSet::new();
        for chapter in &self.chapters {
            if !seen.insert(chapter.number) {
                return Err(ValidationError::new(
                    ValidationErrorKind::DuplicateChapterNumber(chapter.number),
                )
                .into());
            }
        }
        Ok(())
    }
}

/// One act of the book's structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActOutline {
    /// Act number, starting at 1
    pub number: u32,
    /// Act title
    pub title: String,
    /// First chapter belonging to this act
    pub first_chapter: u32,
    /// Last chapter belonging to this act (inclusive)
    pub last_chapter: u32,
    /// What happens in the act
    #[serde(default)]
    pub summary: String,
}

/// How intense the chapter's pacing should feel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum PacingIntensity {
    /// Quiet, reflective chapter
    Slow,
    /// Balanced pacing
    #[default]
    Moderate,
    /// Rising tension
    Fast,
    /// Climactic, breathless
    Intense,
}

/// Per-chapter plan.
///
/// # Examples
///
/// ```
/// use folio_core::ChapterBlueprint;
///
/// let mut chapter = ChapterBlueprint::new(1, "Departure");
/// chapter.target_word_count = 3000;
/// assert_eq!(chapter.word_count_band(), (2700, 3300));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterBlueprint {
    /// Chapter number, unique within the blueprint
    pub number: u32,
    /// Chapter title
    pub title: String,
    /// Planned length in words
    #[serde(default = "default_target_word_count")]
    pub target_word_count: u32,
    /// Planned scenes in reading order
    #[serde(default)]
    pub scenes: Vec<SceneBlueprint>,
    /// Elements the chapter must contain
    #[serde(default)]
    pub must_include: Vec<String>,
    /// Elements the chapter must not contain
    #[serde(default)]
    pub must_avoid: Vec<String>,
    /// How the chapter should open
    #[serde(default)]
    pub opening_hook: String,
    /// How the chapter should close
    #[serde(default)]
    pub closing_hook: String,
    /// Emotional movement across the chapter
    #[serde(default)]
    pub emotional_arc: String,
    /// Pacing intensity
    #[serde(default)]
    pub pacing: PacingIntensity,
    /// Characters appearing in this chapter
    #[serde(default)]
    pub character_ids: Vec<String>,
    /// Locations used in this chapter
    #[serde(default)]
    pub location_ids: Vec<String>,
    /// Planned summary of the chapter
    #[serde(default)]
    pub summary: String,
}

fn default_target_word_count() -> u32 {
    3000
}

impl ChapterBlueprint {
    /// Create a chapter plan with default length and no scenes.
    pub fn new(number: u32, title: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            target_word_count: default_target_word_count(),
            scenes: Vec::new(),
            must_include: Vec::new(),
            must_avoid: Vec::new(),
            opening_hook: String::new(),
            closing_hook: String::new(),
            emotional_arc: String::new(),
            pacing: PacingIntensity::default(),
            character_ids: Vec::new(),
            location_ids: Vec::new(),
            summary: String::new(),
        }
    }

    /// Acceptable word count range, ±10% of the target.
    pub fn word_count_band(&self) -> (u32, u32) {
        let tolerance = self.target_word_count / 10;
        (
            self.target_word_count - tolerance,
            self.target_word_count + tolerance,
        )
    }

    /// Character ids referenced by the chapter or any of its scenes, first
    /// occurrence order, without duplicates.
    pub fn referenced_character_ids(&self) -> Vec<&str> {
        let scene_ids = self.scenes.iter().flat_map(|s| {
            s.pov_character_id
                .iter()
                .chain(s.character_ids.iter())
                .map(String::as_str)
        });
        dedup_in_order(self.character_ids.iter().map(String::as_str).chain(scene_ids))
    }

    /// Location ids referenced by the chapter or any of its scenes, first
    /// occurrence order, without duplicates.
    pub fn referenced_location_ids(&self) -> Vec<&str> {
        let scene_ids = self.scenes.iter().filter_map(|s| s.location_id.as_deref());
        dedup_in_order(self.location_ids.iter().map(String::as_str).chain(scene_ids))
    }
}

fn dedup_in_order<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

/// One planned scene inside a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneBlueprint {
    /// Scene title
    pub title: String,
    /// What happens in the scene
    pub description: String,
    /// Point-of-view character
    #[serde(default)]
    pub pov_character_id: Option<String>,
    /// Where the scene takes place
    #[serde(default)]
    pub location_id: Option<String>,
    /// Other characters present
    #[serde(default)]
    pub character_ids: Vec<String>,
    /// Planned length in words
    #[serde(default)]
    pub target_word_count: Option<u32>,
    /// What the scene must accomplish
    #[serde(default)]
    pub goal: String,
}

impl SceneBlueprint {
    /// Create a scene with a title and description.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            pov_character_id: None,
            location_id: None,
            character_ids: Vec::new(),
            target_word_count: None,
            goal: String::new(),
        }
    }
}

/// A character bible entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Stable character id
    pub id: String,
    /// Display name
    pub name: String,
    /// Narrative role (protagonist, mentor, ...)
    #[serde(default)]
    pub role: String,
    /// Physical and background description
    #[serde(default)]
    pub description: String,
    /// Personality traits
    #[serde(default)]
    pub personality: String,
    /// What drives the character
    #[serde(default)]
    pub motivation: String,
    /// Planned arc over the book
    #[serde(default)]
    pub arc: String,
    /// How the character speaks
    #[serde(default)]
    pub voice: String,
    /// Relationships to other characters
    #[serde(default)]
    pub relationships: Vec<String>,
}

impl CharacterProfile {
    /// Create a character with an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A named place in the world.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    /// Stable location id
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Why the place matters to the story
    #[serde(default)]
    pub significance: String,
}

impl Location {
    /// Create a location with an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A fixed point in the world's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// When it happened, in the world's own terms
    pub when: String,
    /// What happened
    pub event: String,
}

/// The world bible.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldBible {
    /// Overview of the setting
    #[serde(default)]
    pub setting_overview: String,
    /// Rules of the world (magic, technology, society)
    #[serde(default)]
    pub rules: Vec<String>,
    /// Known locations, in blueprint order
    #[serde(default)]
    pub locations: Vec<Location>,
    /// Historical timeline
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

/// A plot thread running across chapters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlotThread {
    /// Stable thread id
    pub id: String,
    /// Thread name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Chapters this thread is active in
    #[serde(default)]
    pub chapters: Vec<u32>,
}

/// The plot architecture.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlotArchitecture {
    /// One-line premise
    #[serde(default)]
    pub premise: String,
    /// Central conflict
    #[serde(default)]
    pub central_conflict: String,
    /// Themes
    #[serde(default)]
    pub themes: Vec<String>,
    /// Plot threads, in blueprint order
    #[serde(default)]
    pub threads: Vec<PlotThread>,
}

/// The style guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleGuide {
    /// Narrative voice
    #[serde(default)]
    pub voice: String,
    /// Overall tone
    #[serde(default)]
    pub tone: String,
    /// Point of view (e.g. "third person limited")
    #[serde(default = "default_point_of_view")]
    pub point_of_view: String,
    /// Tense (e.g. "past")
    #[serde(default = "default_tense")]
    pub tense: String,
    /// Prose style notes
    #[serde(default)]
    pub prose_style: String,
    /// Dialogue style notes
    #[serde(default)]
    pub dialogue_style: String,
    /// Target vocabulary level
    #[serde(default)]
    pub vocabulary_level: String,
    /// Example passages in the desired style
    #[serde(default)]
    pub sample_passages: Vec<String>,
    /// Words that must not appear
    #[serde(default)]
    pub forbidden_words: Vec<String>,
}

fn default_point_of_view() -> String {
    "third person limited".to_string()
}

fn default_tense() -> String {
    "past".to_string()
}

impl Default for StyleGuide {
    fn default() -> Self {
        Self {
            voice: String::new(),
            tone: String::new(),
            point_of_view: default_point_of_view(),
            tense: default_tense(),
            prose_style: String::new(),
            dialogue_style: String::new(),
            vocabulary_level: String::new(),
            sample_passages: Vec::new(),
            forbidden_words: Vec::new(),
        }
    }
}
