//! Cross-chapter continuity verification and post-chapter extraction.

use crate::context::preceding_chapters;
use crate::extraction::parse_response;
use crate::prompts;
use folio_core::{
    BookBlueprint, ChapterBlueprint, CharacterProfile, CharacterStateSnapshot, ContinuityCategory,
    ContinuityIssue, ContinuityReport, ContinuitySeverity, GeneratedChapter, GenerationConfig,
    GenerationOptions,
};
use folio_error::{BackendError, FolioResult};
use folio_interface::GenerationBackend;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Upper bound on key events kept per chapter.
pub const MAX_KEY_EVENTS: usize = 10;

const JSON_RESPONSE_TOKENS: u32 = 1_500;
const SUMMARY_TOKENS: u32 = 600;

/// Facts established before the chapter under check.
#[derive(Debug, Clone, Default, PartialEq, derive_getters::Getters)]
pub struct ContinuityState {
    /// Known characters as `(id, name)`
    roster: Vec<(String, String)>,
    /// Latest snapshot per character
    snapshots: Vec<CharacterStateSnapshot>,
    /// Plot events, tagged with their chapter
    plot_events: Vec<String>,
    /// Timeline entries in story order
    timeline: Vec<String>,
    /// Known locations, one line each
    locations: Vec<String>,
}

impl ContinuityState {
    /// Seed state from the blueprint's bibles.
    pub fn from_blueprint(blueprint: &BookBlueprint) -> Self {
        Self {
            roster: blueprint
                .characters
                .iter()
                .map(|c| (c.id.clone(), c.name.clone()))
                .collect(),
            snapshots: Vec::new(),
            plot_events: Vec::new(),
            timeline: blueprint
                .world
                .timeline
                .iter()
                .map(|t| format!("{}: {}", t.when, t.event))
                .collect(),
            locations: blueprint
                .world
                .locations
                .iter()
                .map(|l| {
                    if l.description.is_empty() {
                        l.name.clone()
                    } else {
                        format!("{}: {}", l.name, l.description)
                    }
                })
                .collect(),
        }
    }

    /// State as of the start of `chapter_number`, replaying every successful
    /// earlier chapter.
    pub fn before_chapter(
        blueprint: &BookBlueprint,
        chapter_number: u32,
        prior_chapters: &[GeneratedChapter],
    ) -> Self {
        let mut state = Self::from_blueprint(blueprint);
        for chapter in preceding_chapters(chapter_number, prior_chapters) {
            state.record_chapter(chapter);
        }
        state
    }

    /// Fold a finished chapter's events and snapshots into the state.
    pub fn record_chapter(&mut self, chapter: &GeneratedChapter) {
        let number = *chapter.chapter_number();
        for event in chapter.key_events() {
            let tagged = format!("Chapter {}: {}", number, event);
            self.plot_events.push(tagged.clone());
            self.timeline.push(tagged);
        }
        for snapshot in chapter.character_snapshots() {
            self.snapshots
                .retain(|s| s.character_id != snapshot.character_id);
            self.snapshots.push(snapshot.clone());
        }
    }

    /// Rendered facts relevant to one category.
    pub fn facts_for(&self, category: ContinuityCategory) -> String {
        match category {
            ContinuityCategory::Character => {
                let mut lines: Vec<String> = self
                    .roster
                    .iter()
                    .map(|(id, name)| format!("- {} ({})", name, id))
                    .collect();
                lines.extend(self.snapshots.iter().map(|s| {
                    format!(
                        "- After chapter {}, {} felt {} and was at {}",
                        s.chapter_number, s.character_name, s.emotional_state, s.location
                    )
                }));
                lines.join("\n")
            }
            ContinuityCategory::Plot => bulleted(&self.plot_events),
            ContinuityCategory::Timeline => bulleted(&self.timeline),
            ContinuityCategory::Setting => bulleted(&self.locations),
            ContinuityCategory::Object => String::new(),
        }
    }
}

fn bulleted(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(default)]
    severity: String,
    #[serde(alias = "issue")]
    description: String,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IssuePayload {
    Wrapped { issues: Vec<RawIssue> },
    Bare(Vec<RawIssue>),
}

/// Parse a category's issue list; malformed input yields an empty list.
pub(crate) fn parse_issues(category: ContinuityCategory, response: &str) -> Vec<ContinuityIssue> {
    let raw = match parse_response::<IssuePayload>(response) {
        Ok(IssuePayload::Wrapped { issues }) | Ok(IssuePayload::Bare(issues)) => issues,
        Err(e) => {
            warn!(%category, error = %e, "Unparseable continuity response");
            return Vec::new();
        }
    };
    raw.into_iter()
        .map(|r| ContinuityIssue {
            category,
            severity: ContinuitySeverity::from_label(&r.severity),
            description: r.description,
            excerpt: r.excerpt,
            suggestion: r.suggestion,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawCharacterState {
    #[serde(default, alias = "character_id")]
    id: Option<String>,
    #[serde(default, alias = "character_name")]
    name: Option<String>,
    #[serde(default)]
    emotional_state: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    arc_progress: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CharacterStatePayload {
    Wrapped { characters: Vec<RawCharacterState> },
    Bare(Vec<RawCharacterState>),
}

/// Arc progress given as a number or a string such as `"45%"`, clamped to 0..=100.
///
/// # Examples
///
/// ```
/// use folio_generation::parse_arc_progress;
/// use serde_json::json;
///
/// assert_eq!(parse_arc_progress(&json!(45)), 45);
/// assert_eq!(parse_arc_progress(&json!("62%")), 62);
/// assert_eq!(parse_arc_progress(&json!(130.0)), 100);
/// assert_eq!(parse_arc_progress(&json!("unknown")), 0);
/// ```
pub fn parse_arc_progress(value: &Value) -> u8 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|n| n.is_finite())
        .map(|n| n.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0)
}

/// Parse end-of-chapter states, keeping only characters on the roster.
pub(crate) fn parse_character_states(
    response: &str,
    roster: &[&CharacterProfile],
    chapter_number: u32,
) -> Vec<CharacterStateSnapshot> {
    let raw = match parse_response::<CharacterStatePayload>(response) {
        Ok(CharacterStatePayload::Wrapped { characters })
        | Ok(CharacterStatePayload::Bare(characters)) => characters,
        Err(e) => {
            warn!(error = %e, "Unparseable character state response");
            return Vec::new();
        }
    };
    raw.into_iter()
        .filter_map(|r| {
            let profile = roster.iter().find(|p| {
                r.id.as_deref() == Some(p.id.as_str())
                    || r
                        .name
                        .as_deref()
                        .is_some_and(|n| n.trim().eq_ignore_ascii_case(&p.name))
            })?;
            Some(CharacterStateSnapshot {
                character_id: profile.id.clone(),
                character_name: profile.name.clone(),
                emotional_state: r.emotional_state,
                location: r.location,
                arc_progress: parse_arc_progress(&r.arc_progress),
                chapter_number,
            })
        })
        .collect()
}

/// Bullet lines from a key-event response, capped at [`MAX_KEY_EVENTS`].
///
/// Falls back to every non-empty line when no bullets are present.
pub fn parse_key_events(response: &str) -> Vec<String> {
    let lines: Vec<&str> = response
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let bullets: Vec<String> = lines
        .iter()
        .filter_map(|l| strip_bullet(l))
        .map(str::to_string)
        .collect();
    let events = if bullets.is_empty() {
        lines.into_iter().map(str::to_string).collect()
    } else {
        bullets
    };
    events.into_iter().take(MAX_KEY_EVENTS).collect()
}

fn strip_bullet(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim()).filter(|r| !r.is_empty());
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim()).filter(|r| !r.is_empty());
        }
    }
    None
}

/// Checks chapters against established facts and extracts the facts later
/// chapters depend on.
pub struct ContinuityVerifier<B: GenerationBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: GenerationBackend + ?Sized> Clone for ContinuityVerifier<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: GenerationBackend + ?Sized> ContinuityVerifier<B> {
    /// Create a verifier over `backend`.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Check `content` category by category.
    ///
    /// Unparseable responses count as no issues for that category.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    #[instrument(skip_all, fields(chapter = chapter_number))]
    pub async fn verify(
        &self,
        content: &str,
        chapter_number: u32,
        state: &ContinuityState,
        config: &GenerationConfig,
    ) -> FolioResult<ContinuityReport> {
        let character = self
            .check_category(ContinuityCategory::Character, content, chapter_number, state, config)
            .await?;
        let plot = self
            .check_category(ContinuityCategory::Plot, content, chapter_number, state, config)
            .await?;
        let timeline = self
            .check_category(ContinuityCategory::Timeline, content, chapter_number, state, config)
            .await?;
        let setting = self
            .check_category(ContinuityCategory::Setting, content, chapter_number, state, config)
            .await?;
        let objects = self.check_objects();

        let report = ContinuityReport::from_issues(character, plot, timeline, setting, objects);
        info!(
            score = report.score(),
            passes = report.passes(),
            issues = report.total_count(),
            "Continuity check complete"
        );
        Ok(report)
    }

    async fn check_category(
        &self,
        category: ContinuityCategory,
        content: &str,
        chapter_number: u32,
        state: &ContinuityState,
        config: &GenerationConfig,
    ) -> FolioResult<Vec<ContinuityIssue>> {
        let prompt = prompts::continuity_prompt(
            category,
            chapter_number,
            content,
            &state.facts_for(category),
        );
        let options =
            GenerationOptions::json(*config.evaluation_temperature(), JSON_RESPONSE_TOKENS);
        let response = self.backend.generate(&prompt, &options).await?;
        let issues = parse_issues(category, &response);
        debug!(%category, issues = issues.len(), "Category checked");
        Ok(issues)
    }

    // Object tracking is not modelled yet.
    fn check_objects(&self) -> Vec<ContinuityIssue> {
        Vec::new()
    }

    /// End-of-chapter state for each of `characters` who appears.
    ///
    /// # Errors
    ///
    /// Propagates backend failures; parse failures yield an empty list.
    #[instrument(skip_all, fields(chapter = chapter_number, characters = characters.len()))]
    pub async fn extract_character_states(
        &self,
        content: &str,
        chapter_number: u32,
        characters: &[&CharacterProfile],
        config: &GenerationConfig,
    ) -> FolioResult<Vec<CharacterStateSnapshot>> {
        if characters.is_empty() {
            return Ok(Vec::new());
        }
        let roster: Vec<(String, String)> = characters
            .iter()
            .map(|c| (c.id.clone(), c.name.clone()))
            .collect();
        let prompt = prompts::character_state_prompt(content, &roster);
        let options =
            GenerationOptions::json(*config.evaluation_temperature(), JSON_RESPONSE_TOKENS);
        let response = self.backend.generate(&prompt, &options).await?;
        Ok(parse_character_states(&response, characters, chapter_number))
    }

    /// Five to ten key plot events of the chapter.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    #[instrument(skip_all)]
    pub async fn extract_key_events(
        &self,
        content: &str,
        config: &GenerationConfig,
    ) -> FolioResult<Vec<String>> {
        let prompt = prompts::key_events_prompt(content);
        let options =
            GenerationOptions::text(*config.evaluation_temperature(), JSON_RESPONSE_TOKENS);
        let response = self.backend.generate(&prompt, &options).await?;
        let events = parse_key_events(&response);
        if events.len() < 5 {
            debug!(events = events.len(), "Fewer key events than requested");
        }
        Ok(events)
    }

    /// One-paragraph plain-text summary used as later chapters' narrative context.
    ///
    /// # Errors
    ///
    /// Propagates backend failures; an empty summary is a backend error.
    #[instrument(skip_all, fields(chapter = chapter.number))]
    pub async fn summarize_chapter(
        &self,
        content: &str,
        chapter: &ChapterBlueprint,
        config: &GenerationConfig,
    ) -> FolioResult<String> {
        let prompt = prompts::summary_prompt(chapter, content);
        let options = GenerationOptions::text(*config.evaluation_temperature(), SUMMARY_TOKENS);
        let summary = self.backend.generate(&prompt, &options).await?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(BackendError::new("Backend returned an empty summary").into());
        }
        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{Location, TimelineEntry};

    #[test]
    fn issues_parse_wrapped_and_bare() {
        let wrapped = r#"{"issues": [{"severity": "Critical", "description": "Mara is alive again"}]}"#;
        let issues = parse_issues(ContinuityCategory::Character, wrapped);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ContinuitySeverity::Critical);

        let bare = r#"[{"severity": "minor", "issue": "wrong weekday"}]"#;
        let issues = parse_issues(ContinuityCategory::Timeline, bare);
        assert_eq!(issues[0].description, "wrong weekday");
        assert_eq!(issues[0].category, ContinuityCategory::Timeline);
    }

    #[test]
    fn malformed_issue_response_is_empty() {
        assert!(parse_issues(ContinuityCategory::Plot, "All good!").is_empty());
        assert!(parse_issues(ContinuityCategory::Plot, r#"{"issues": "none"}"#).is_empty());
    }

    #[test]
    fn character_states_match_roster_by_id_or_name() {
        let mara = CharacterProfile::new("mara", "Mara Voss");
        let tobin = CharacterProfile::new("tobin", "Tobin");
        let roster = vec![&mara, &tobin];
        let response = r#"{"characters": [
            {"id": "mara", "emotional_state": "resolute", "location": "the docks", "arc_progress": "40%"},
            {"name": "tobin", "emotional_state": "wary", "location": "inn", "arc_progress": 25},
            {"name": "Stranger", "emotional_state": "?", "location": "?", "arc_progress": 5}
        ]}"#;

        let states = parse_character_states(response, &roster, 3);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].arc_progress, 40);
        assert_eq!(states[1].character_id, "tobin");
        assert_eq!(states[1].character_name, "Tobin");
        assert!(states.iter().all(|s| s.chapter_number == 3));
    }

    #[test]
    fn key_events_strip_bullets_and_cap() {
        let response = (1..=12)
            .map(|i| format!("{}. Event {}", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let events = parse_key_events(&format!("Here are the events:\n{}", response));
        assert_eq!(events.len(), MAX_KEY_EVENTS);
        assert_eq!(events[0], "Event 1");

        let events = parse_key_events("- Ship sinks\n* Mara swims ashore\n");
        assert_eq!(events, vec!["Ship sinks", "Mara swims ashore"]);
    }

    #[test]
    fn state_accumulates_events_and_latest_snapshots() {
        let mut blueprint = BookBlueprint::new("bp", "Book");
        blueprint.world.timeline.push(TimelineEntry {
            when: "Year 0".to_string(),
            event: "The flood".to_string(),
        });
        blueprint.world.locations.push(Location::new("harbor", "Harbor"));

        let snapshot = |chapter: u32, feeling: &str| CharacterStateSnapshot {
            character_id: "mara".to_string(),
            character_name: "Mara".to_string(),
            emotional_state: feeling.to_string(),
            location: "harbor".to_string(),
            arc_progress: 10,
            chapter_number: chapter,
        };
        let one = GeneratedChapter::builder()
            .chapter_number(1u32)
            .key_events(vec!["Storm hits".to_string()])
            .character_snapshots(vec![snapshot(1, "afraid")])
            .build();
        let two = GeneratedChapter::builder()
            .chapter_number(2u32)
            .character_snapshots(vec![snapshot(2, "angry")])
            .build();

        let state = ContinuityState::before_chapter(&blueprint, 3, &[two, one]);
        assert_eq!(state.plot_events(), &vec!["Chapter 1: Storm hits".to_string()]);
        assert_eq!(state.timeline().len(), 2);
        assert_eq!(state.snapshots().len(), 1);
        assert_eq!(state.snapshots()[0].emotional_state, "angry");
        assert!(state.facts_for(ContinuityCategory::Setting).contains("Harbor"));
        assert!(state.facts_for(ContinuityCategory::Object).is_empty());
    }
}
