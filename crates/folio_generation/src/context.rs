//! Token-budgeted context assembly.

use crate::prompts;
use folio_core::{
    BookBlueprint, ChapterBlueprint, ChapterGenerationContext, CharacterProfile,
    CharacterStateSnapshot, GeneratedChapter, GenerationConfig, GenerationOptions, Location,
    TokenBudget,
};
use folio_error::{BuilderError, FolioResult, ValidationError, ValidationErrorKind};
use folio_interface::GenerationBackend;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Prior chapters summarized in the narrative fragment.
pub const NARRATIVE_WINDOW: usize = 5;

/// Trailing paragraphs of the latest chapter quoted verbatim.
pub const TRAILING_PARAGRAPHS: usize = 2;

/// Marker inserted where middle truncation removed text.
pub const TRUNCATION_MARKER: &str = "\n\n[...]\n\n";

/// Quality standards listed in every system prompt.
const QUALITY_STANDARDS: &[&str] = &[
    "Show emotion through action, dialogue and physical detail rather than stating it.",
    "Keep every character consistent with the character bible and their state so far.",
    "Ground each scene in concrete sensory detail of its setting.",
    "Give every scene a purpose that moves plot or character forward.",
    "Vary sentence rhythm; avoid repetition and cliché.",
];

/// Builds the prompt context for one chapter.
///
/// Everything except the optional compression call is a pure function of the
/// inputs: identical inputs give byte-identical fragments.
pub struct ContextBuilder<B: GenerationBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: GenerationBackend + ?Sized> Clone for ContextBuilder<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: GenerationBackend + ?Sized> ContextBuilder<B> {
    /// Create a builder using `backend` for narrative compression.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Build the context for `chapter_number`.
    ///
    /// When the narrative fragment exceeds its bucket, one backend call asks
    /// for a compressed version; if that call fails the fragment is
    /// middle-truncated instead.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrorKind::NoBlueprintForChapter`] when the
    /// blueprint has no such chapter.
    #[instrument(
        skip(self, blueprint, prior_chapters, config),
        fields(chapter = chapter_number, prior = prior_chapters.len())
    )]
    pub async fn build(
        &self,
        chapter_number: u32,
        blueprint: &BookBlueprint,
        prior_chapters: &[GeneratedChapter],
        config: &GenerationConfig,
    ) -> FolioResult<ChapterGenerationContext> {
        let mut fragments = Fragments::assemble(chapter_number, blueprint, prior_chapters, config)?;
        let bucket = *fragments.budget.narrative();
        let estimated = self.backend.estimate_tokens(&fragments.narrative);
        debug!(estimated, bucket, "Narrative context size");

        if estimated > bucket {
            fragments.narrative = self.compress(&fragments.narrative, bucket, config).await;
            fragments.compressed = true;
        }
        fragments.into_context(chapter_number)
    }

    /// Build the context without ever calling the backend; oversized
    /// narrative is middle-truncated.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrorKind::NoBlueprintForChapter`] when the
    /// blueprint has no such chapter.
    pub fn build_offline(
        &self,
        chapter_number: u32,
        blueprint: &BookBlueprint,
        prior_chapters: &[GeneratedChapter],
        config: &GenerationConfig,
    ) -> FolioResult<ChapterGenerationContext> {
        let mut fragments = Fragments::assemble(chapter_number, blueprint, prior_chapters, config)?;
        let bucket = *fragments.budget.narrative();
        if self.backend.estimate_tokens(&fragments.narrative) > bucket {
            fragments.narrative = truncate_middle(&fragments.narrative, bucket * 3);
            fragments.compressed = true;
        }
        fragments.into_context(chapter_number)
    }

    async fn compress(&self, narrative: &str, bucket: usize, config: &GenerationConfig) -> String {
        let prompt = prompts::compression_prompt(narrative, bucket);
        let options = GenerationOptions::text(
            *config.evaluation_temperature(),
            u32::try_from(bucket).unwrap_or(u32::MAX),
        );
        match self.backend.generate(&prompt, &options).await {
            Ok(compressed) if !compressed.trim().is_empty() => {
                debug!(
                    before = narrative.len(),
                    after = compressed.len(),
                    "Compressed narrative context"
                );
                compressed.trim().to_string()
            }
            Ok(_) => {
                warn!("Compression returned nothing; truncating narrative context");
                truncate_middle(narrative, bucket * 3)
            }
            Err(e) => {
                warn!(error = %e, "Compression failed; truncating narrative context");
                truncate_middle(narrative, bucket * 3)
            }
        }
    }
}

/// Keep the first and last `keep` characters of `text`, joined by
/// [`TRUNCATION_MARKER`]. Text of at most `2 * keep` characters is returned
/// unchanged.
///
/// # Examples
///
/// ```
/// use folio_generation::truncate_middle;
///
/// assert_eq!(truncate_middle("abcdefghij", 2), "ab\n\n[...]\n\nij");
/// assert_eq!(truncate_middle("abcd", 2), "abcd");
/// ```
pub fn truncate_middle(text: &str, keep: usize) -> String {
    let total = text.chars().count();
    if total <= keep.saturating_mul(2) {
        return text.to_string();
    }
    let head: String = text.chars().take(keep).collect();
    let tail: String = text.chars().skip(total - keep).collect();
    format!("{}{}{}", head, TRUNCATION_MARKER, tail)
}

/// Characters relevant to `chapter`: those it or its scenes reference, in
/// reference order, or else the first `max_default_characters` of the bible.
pub fn relevant_characters<'a>(
    blueprint: &'a BookBlueprint,
    chapter: &ChapterBlueprint,
    config: &GenerationConfig,
) -> Vec<&'a CharacterProfile> {
    let referenced: Vec<&CharacterProfile> = chapter
        .referenced_character_ids()
        .into_iter()
        .filter_map(|id| blueprint.character(id))
        .collect();
    if referenced.is_empty() {
        blueprint
            .characters
            .iter()
            .take(*config.max_default_characters())
            .collect()
    } else {
        referenced
    }
}

/// Locations relevant to `chapter`, with the same fallback as characters.
pub fn relevant_locations<'a>(
    blueprint: &'a BookBlueprint,
    chapter: &ChapterBlueprint,
    config: &GenerationConfig,
) -> Vec<&'a Location> {
    let referenced: Vec<&Location> = chapter
        .referenced_location_ids()
        .into_iter()
        .filter_map(|id| blueprint.location(id))
        .collect();
    if referenced.is_empty() {
        blueprint
            .world
            .locations
            .iter()
            .take(*config.max_default_locations())
            .collect()
    } else {
        referenced
    }
}

/// Successful chapters numbered below `chapter_number`, ascending.
pub(crate) fn preceding_chapters(
    chapter_number: u32,
    prior_chapters: &[GeneratedChapter],
) -> Vec<&GeneratedChapter> {
    let mut preceding: Vec<&GeneratedChapter> = prior_chapters
        .iter()
        .filter(|c| *c.chapter_number() < chapter_number && !c.is_failed())
        .collect();
    preceding.sort_by_key(|c| *c.chapter_number());
    preceding
}

/// Latest snapshot for `character_id` among `chapters`.
pub(crate) fn latest_snapshot<'a>(
    character_id: &str,
    chapters: &[&'a GeneratedChapter],
) -> Option<&'a CharacterStateSnapshot> {
    chapters
        .iter()
        .rev()
        .copied()
        .flat_map(|c| c.character_snapshots().iter())
        .find(|s| s.character_id == character_id)
}

struct Fragments {
    system: String,
    narrative: String,
    character: String,
    world: String,
    plot: String,
    style: String,
    instructions: String,
    budget: TokenBudget,
    compressed: bool,
}

impl Fragments {
    fn assemble(
        chapter_number: u32,
        blueprint: &BookBlueprint,
        prior_chapters: &[GeneratedChapter],
        config: &GenerationConfig,
    ) -> FolioResult<Self> {
        let chapter = blueprint.chapter(chapter_number).ok_or_else(|| {
            ValidationError::new(ValidationErrorKind::NoBlueprintForChapter(chapter_number))
        })?;
        let preceding = preceding_chapters(chapter_number, prior_chapters);

        Ok(Self {
            system: system_fragment(blueprint, config),
            narrative: narrative_fragment(&preceding),
            character: character_fragment(blueprint, chapter, &preceding, config),
            world: world_fragment(blueprint, chapter, config),
            plot: plot_fragment(blueprint, chapter, &preceding),
            style: style_fragment(blueprint),
            instructions: instructions_fragment(chapter),
            budget: TokenBudget::from_window(*config.context_window_size()),
            compressed: false,
        })
    }

    fn into_context(self, chapter_number: u32) -> FolioResult<ChapterGenerationContext> {
        ChapterGenerationContext::builder()
            .chapter_number(chapter_number)
            .system_prompt(self.system)
            .narrative_context(self.narrative)
            .character_context(self.character)
            .world_context(self.world)
            .plot_context(self.plot)
            .style_context(self.style)
            .chapter_instructions(self.instructions)
            .budget(self.budget)
            .narrative_compressed(self.compressed)
            .build()
            .map_err(|e| BuilderError::new("ChapterGenerationContext", e.to_string()).into())
    }
}

fn system_fragment(blueprint: &BookBlueprint, config: &GenerationConfig) -> String {
    let style = &blueprint.style;
    let mut out = format!(
        "You are an accomplished novelist writing the book \"{}\".\n",
        blueprint.title
    );
    if !style.voice.is_empty() {
        out.push_str(&format!("Voice: {}.\n", style.voice));
    }
    out.push_str(&format!(
        "Write in {} point of view, {} tense.\n",
        style.point_of_view, style.tense
    ));
    out.push_str("\nQuality standards:\n");
    for standard in QUALITY_STANDARDS {
        out.push_str(&format!("- {}\n", standard));
    }
    out.push_str(&format!("\nContent rating: {}\n", config.content_rating()));
    for constraint in config.content_rating().constraints() {
        out.push_str(&format!("- {}\n", constraint));
    }
    out
}

fn narrative_fragment(preceding: &[&GeneratedChapter]) -> String {
    if preceding.is_empty() {
        return "This is the first chapter to be written; there is no prior story.".to_string();
    }
    let start = preceding.len().saturating_sub(NARRATIVE_WINDOW);
    let window = &preceding[start..];

    let mut out = String::from("Previous chapters:\n");
    for chapter in window {
        let summary = chapter
            .summary()
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| opening_words(chapter.content(), 80));
        out.push_str(&format!(
            "\nChapter {}: {}\n{}\n",
            chapter.chapter_number(),
            chapter.title(),
            summary.trim()
        ));
    }

    if let Some(latest) = window.last() {
        let tail = latest.last_paragraphs(TRAILING_PARAGRAPHS);
        if !tail.is_empty() {
            out.push_str(&format!(
                "\nThe previous chapter ended:\n{}\n",
                tail.join("\n\n")
            ));
        }
    }
    out
}

fn opening_words(text: &str, count: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().take(count + 1).collect();
    if words.len() > count {
        format!("{} ...", words[..count].join(" "))
    } else {
        words.join(" ")
    }
}

fn character_fragment(
    blueprint: &BookBlueprint,
    chapter: &ChapterBlueprint,
    preceding: &[&GeneratedChapter],
    config: &GenerationConfig,
) -> String {
    let mut out = String::new();
    for character in relevant_characters(blueprint, chapter, config) {
        out.push_str(&format!("### {}", character.name));
        if !character.role.is_empty() {
            out.push_str(&format!(" ({})", character.role));
        }
        out.push('\n');
        let fields = [
            ("Description", &character.description),
            ("Personality", &character.personality),
            ("Motivation", &character.motivation),
            ("Arc", &character.arc),
            ("Voice", &character.voice),
        ];
        for (label, value) in fields {
            if !value.is_empty() {
                out.push_str(&format!("{}: {}\n", label, value));
            }
        }
        if !character.relationships.is_empty() {
            out.push_str(&format!(
                "Relationships: {}\n",
                character.relationships.join("; ")
            ));
        }
        if let Some(state) = latest_snapshot(&character.id, preceding) {
            out.push_str(&format!(
                "As of chapter {}: feeling {}, at {}, arc {}% complete\n",
                state.chapter_number, state.emotional_state, state.location, state.arc_progress
            ));
        }
        out.push('\n');
    }
    out
}

fn world_fragment(
    blueprint: &BookBlueprint,
    chapter: &ChapterBlueprint,
    config: &GenerationConfig,
) -> String {
    let world = &blueprint.world;
    let mut out = String::new();
    if !world.setting_overview.is_empty() {
        out.push_str(&format!("Setting: {}\n", world.setting_overview));
    }
    if !world.rules.is_empty() {
        out.push_str("World rules:\n");
        for rule in &world.rules {
            out.push_str(&format!("- {}\n", rule));
        }
    }
    let locations = relevant_locations(blueprint, chapter, config);
    if !locations.is_empty() {
        out.push_str("Locations:\n");
        for location in locations {
            out.push_str(&format!("- {}", location.name));
            if !location.description.is_empty() {
                out.push_str(&format!(": {}", location.description));
            }
            if !location.significance.is_empty() {
                out.push_str(&format!(" ({})", location.significance));
            }
            out.push('\n');
        }
    }
    out
}

fn plot_fragment(
    blueprint: &BookBlueprint,
    chapter: &ChapterBlueprint,
    preceding: &[&GeneratedChapter],
) -> String {
    let plot = &blueprint.plot;
    let mut out = String::new();
    if !plot.premise.is_empty() {
        out.push_str(&format!("Premise: {}\n", plot.premise));
    }
    if !plot.central_conflict.is_empty() {
        out.push_str(&format!("Central conflict: {}\n", plot.central_conflict));
    }
    if !plot.themes.is_empty() {
        out.push_str(&format!("Themes: {}\n", plot.themes.join(", ")));
    }
    if let Some(act) = blueprint.act_for_chapter(chapter.number) {
        out.push_str(&format!("Act {}: {}", act.number, act.title));
        if !act.summary.is_empty() {
            out.push_str(&format!(". {}", act.summary));
        }
        out.push('\n');
    }

    let threads: Vec<_> = plot
        .threads
        .iter()
        .filter(|t| t.chapters.contains(&chapter.number))
        .collect();
    let threads = if threads.is_empty() {
        plot.threads.iter().collect()
    } else {
        threads
    };
    if !threads.is_empty() {
        out.push_str("Active threads:\n");
        for thread in threads {
            out.push_str(&format!("- {}: {}\n", thread.name, thread.description));
        }
    }

    let events: Vec<String> = preceding
        .iter()
        .flat_map(|c| {
            c.key_events()
                .iter()
                .map(move |e| format!("- Chapter {}: {}", c.chapter_number(), e))
        })
        .collect();
    if !events.is_empty() {
        out.push_str("Key events so far:\n");
        out.push_str(&events.join("\n"));
        out.push('\n');
    }
    out
}

fn style_fragment(blueprint: &BookBlueprint) -> String {
    let style = &blueprint.style;
    let mut out = String::new();
    let fields = [
        ("Voice", &style.voice),
        ("Tone", &style.tone),
        ("Point of view", &style.point_of_view),
        ("Tense", &style.tense),
        ("Prose", &style.prose_style),
        ("Dialogue", &style.dialogue_style),
        ("Vocabulary", &style.vocabulary_level),
    ];
    for (label, value) in fields {
        if !value.is_empty() {
            out.push_str(&format!("{}: {}\n", label, value));
        }
    }
    if !style.forbidden_words.is_empty() {
        out.push_str(&format!(
            "Never use: {}\n",
            style.forbidden_words.join(", ")
        ));
    }
    for sample in style.sample_passages.iter().take(2) {
        out.push_str(&format!("Sample passage:\n{}\n", sample));
    }
    out
}

fn instructions_fragment(chapter: &ChapterBlueprint) -> String {
    let (low, high) = chapter.word_count_band();
    let mut out = format!(
        "Chapter {}: {}\nTarget length: {} words ({} to {}).\nPacing: {}.\n",
        chapter.number, chapter.title, chapter.target_word_count, low, high, chapter.pacing
    );
    if !chapter.summary.is_empty() {
        out.push_str(&format!("Summary: {}\n", chapter.summary));
    }
    if !chapter.emotional_arc.is_empty() {
        out.push_str(&format!("Emotional arc: {}\n", chapter.emotional_arc));
    }
    if !chapter.opening_hook.is_empty() {
        out.push_str(&format!("Open with: {}\n", chapter.opening_hook));
    }
    if !chapter.scenes.is_empty() {
        out.push_str("Scenes:\n");
        for (index, scene) in chapter.scenes.iter().enumerate() {
            out.push_str(&format!(
                "{}. {}: {}\n",
                index + 1,
                scene.title,
                scene.description
            ));
        }
    }
    if !chapter.must_include.is_empty() {
        out.push_str("Must include:\n");
        for item in &chapter.must_include {
            out.push_str(&format!("- {}\n", item));
        }
    }
    if !chapter.must_avoid.is_empty() {
        out.push_str("Must avoid:\n");
        for item in &chapter.must_avoid {
            out.push_str(&format!("- {}\n", item));
        }
    }
    if !chapter.closing_hook.is_empty() {
        out.push_str(&format!("Close with: {}\n", chapter.closing_hook));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{ChapterStatus, CharacterProfile};

    fn chapter(number: u32, content: &str, summary: Option<&str>) -> GeneratedChapter {
        GeneratedChapter::builder()
            .chapter_number(number)
            .title(format!("Chapter {}", number))
            .content(content)
            .summary(summary.map(str::to_string))
            .status(ChapterStatus::Approved)
            .build()
    }

    #[test]
    fn truncation_keeps_both_ends() {
        let text = "a".repeat(10) + &"b".repeat(10) + &"c".repeat(10);
        let truncated = truncate_middle(&text, 10);
        assert_eq!(truncated, format!("{}{}{}", "a".repeat(10), TRUNCATION_MARKER, "c".repeat(10)));
    }

    #[test]
    fn narrative_window_is_last_five_ascending() {
        let prior: Vec<GeneratedChapter> = (1..=7)
            .rev()
            .map(|n| chapter(n, "text", Some(&format!("summary {}", n))))
            .collect();
        let preceding = preceding_chapters(8, &prior);
        let fragment = narrative_fragment(&preceding);

        assert!(!fragment.contains("summary 2"));
        let positions: Vec<usize> = (3..=7)
            .map(|n| fragment.find(&format!("summary {}", n)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn narrative_quotes_last_two_paragraphs() {
        let prior = vec![chapter(1, "First.\n\nSecond.\n\nThird.", Some("s"))];
        let fragment = narrative_fragment(&preceding_chapters(2, &prior));
        assert!(fragment.contains("Second.\n\nThird."));
        assert!(!fragment.contains("First."));
    }

    #[test]
    fn failed_and_later_chapters_are_excluded() {
        let failed = GeneratedChapter::failed(1, "One", "boom", std::time::Duration::ZERO);
        let later = chapter(5, "later", Some("later summary"));
        let chapters = [failed, later];
        let preceding = preceding_chapters(3, &chapters);
        assert!(preceding.is_empty());
    }

    #[test]
    fn characters_fall_back_to_bible_order() {
        let mut blueprint = BookBlueprint::new("bp", "Book");
        for i in 0..8 {
            blueprint
                .characters
                .push(CharacterProfile::new(format!("c{}", i), format!("Name{}", i)));
        }
        let config = GenerationConfig::default();
        let chapter_bp = ChapterBlueprint::new(1, "One");
        let chosen = relevant_characters(&blueprint, &chapter_bp, &config);
        assert_eq!(chosen.len(), 5);
        assert_eq!(chosen[0].id, "c0");

        let mut referencing = ChapterBlueprint::new(2, "Two");
        referencing.character_ids = vec!["c6".to_string(), "missing".to_string()];
        let chosen = relevant_characters(&blueprint, &referencing, &config);
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].id, "c6");
    }
}
