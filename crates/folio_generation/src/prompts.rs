//! Prompt construction.
//!
//! Every prompt opens with a `TASK:` heading naming its [`PromptTask`], so
//! backends and logs can tell calls apart. The wording after the heading is
//! not part of any contract.

use folio_core::{
    BookBlueprint, ChapterBlueprint, ChapterGenerationContext, ContinuityCategory, Issue,
    QualityDimension, SceneBlueprint,
};

/// The kind of work a prompt asks the backend to do.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    derive_more::Display,
    strum::EnumIter,
)]
pub enum PromptTask {
    /// Compress prior-chapter narrative to fit its budget
    #[display("COMPRESS NARRATIVE")]
    CompressNarrative,
    /// Scene-by-scene outline
    #[display("CHAPTER OUTLINE")]
    Outline,
    /// One scene of a chapter
    #[display("WRITE SCENE")]
    Scene,
    /// A whole chapter in one call
    #[display("WRITE CHAPTER")]
    Chapter,
    /// Rewrite a chapter against revision points
    #[display("REVISE CHAPTER")]
    Revision,
    /// Score one quality dimension
    #[display("EVALUATE QUALITY")]
    QualityDimension,
    /// Rewrite one flagged passage
    #[display("FIX PASSAGE")]
    FixPassage,
    /// Check one continuity category
    #[display("CHECK CONTINUITY")]
    Continuity,
    /// End-of-chapter character states
    #[display("EXTRACT CHARACTER STATES")]
    CharacterStates,
    /// Key plot events
    #[display("EXTRACT KEY EVENTS")]
    KeyEvents,
    /// Plain-text chapter summary
    #[display("SUMMARIZE CHAPTER")]
    Summary,
}

impl PromptTask {
    /// First line of every prompt for this task.
    pub fn heading(&self) -> String {
        format!("TASK: {}", self)
    }

    /// Identify the task a prompt was built for.
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_generation::PromptTask;
    ///
    /// let prompt = format!("{}\nWrite it.", PromptTask::Outline.heading());
    /// assert_eq!(PromptTask::of(&prompt), Some(PromptTask::Outline));
    /// assert_eq!(PromptTask::of("hello"), None);
    /// ```
    pub fn of(prompt: &str) -> Option<Self> {
        use strum::IntoEnumIterator;
        let first_line = prompt.lines().next()?;
        Self::iter().find(|task| first_line == task.heading())
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Characters kept from the start of a chapter for evaluation prompts.
pub const EVALUATION_EXCERPT_CHARS: usize = 8_000;

/// At most the first `limit` characters of `text`.
pub(crate) fn leading_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

pub(crate) fn compression_prompt(narrative: &str, target_tokens: usize) -> String {
    format!(
        "{}\n\
         Condense the story-so-far below to roughly {} tokens.\n\
         Preserve every character name, every plot event, each character's emotional state, \
         and any detail later chapters may depend on. Drop only phrasing.\n\n\
         {}",
        PromptTask::CompressNarrative.heading(),
        target_tokens,
        narrative
    )
}

pub(crate) fn outline_prompt(context: &ChapterGenerationContext, chapter: &ChapterBlueprint) -> String {
    format!(
        "{}\n{}\n\n\
         Produce a scene-by-scene outline for chapter {} \"{}\". \
         For each scene give the point of view, the location, and what changes by its end.",
        PromptTask::Outline.heading(),
        context.full_prompt(),
        chapter.number,
        chapter.title
    )
}

pub(crate) fn scene_prompt(
    context: &ChapterGenerationContext,
    chapter: &ChapterBlueprint,
    scene: &SceneBlueprint,
    scene_index: usize,
    previous_scenes: &[String],
    target_words: u32,
) -> String {
    let mut prompt = format!(
        "{}\n{}\n\n## SCENE {} OF {}: {}\n{}\n",
        PromptTask::Scene.heading(),
        context.full_prompt(),
        scene_index + 1,
        chapter.scenes.len(),
        scene.title,
        scene.description
    );
    if !scene.goal.is_empty() {
        prompt.push_str(&format!("Scene goal: {}\n", scene.goal));
    }
    if let Some(pov) = &scene.pov_character_id {
        prompt.push_str(&format!("Point of view character: {}\n", pov));
    }
    if let Some(location) = &scene.location_id {
        prompt.push_str(&format!("Location: {}\n", location));
    }
    if !previous_scenes.is_empty() {
        prompt.push_str("\n## PRECEDING SCENES\n");
        prompt.push_str(&previous_scenes.join("\n\n"));
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\nWrite this scene in about {} words. Output only the prose.",
        target_words
    ));
    prompt
}

pub(crate) fn chapter_prompt(context: &ChapterGenerationContext, chapter: &ChapterBlueprint) -> String {
    format!(
        "{}\n{}\n\n\
         Write chapter {} \"{}\" in full, about {} words. Output only the prose.",
        PromptTask::Chapter.heading(),
        context.full_prompt(),
        chapter.number,
        chapter.title,
        chapter.target_word_count
    )
}

pub(crate) fn revision_prompt(
    context: &ChapterGenerationContext,
    content: &str,
    revision_points: &[String],
) -> String {
    format!(
        "{}\n{}\n\n\
         ## REVISION POINTS\n{}\n\n\
         ## CURRENT DRAFT\n{}\n\n\
         Rewrite the whole chapter, addressing every revision point while keeping \
         plot events and continuity intact. Output only the revised prose.",
        PromptTask::Revision.heading(),
        context.system_prompt(),
        bullet_list(revision_points),
        content
    )
}

fn dimension_rubric(dimension: QualityDimension) -> &'static str {
    match dimension {
        QualityDimension::Narrative => {
            "narrative flow: coherence, transitions between scenes, clarity of what happens"
        }
        QualityDimension::Character => {
            "characterization: consistent voices, believable motivation, visible inner life"
        }
        QualityDimension::Plot => {
            "plot: the chapter advances the story, events follow logically, stakes are clear"
        }
        QualityDimension::Style => {
            "style: prose quality and adherence to the style guide's voice, tense and point of view"
        }
        QualityDimension::Pacing => {
            "pacing: scene lengths and tension match the planned intensity, no dragging or rushing"
        }
        QualityDimension::Dialogue => {
            "dialogue: natural speech, distinct speakers, every exchange does work"
        }
    }
}

pub(crate) fn quality_prompt(
    dimension: QualityDimension,
    excerpt: &str,
    chapter: &ChapterBlueprint,
    blueprint: &BookBlueprint,
) -> String {
    format!(
        "{}\n\
         Dimension: {}\n\
         Judge the chapter excerpt below on {}.\n\
         Book: \"{}\". Chapter {}: \"{}\". Planned pacing: {}. Point of view: {}, {} tense.\n\n\
         Respond with JSON only:\n\
         {{\"score\": <0-100>, \"strengths\": [\"...\"], \
         \"weaknesses\": [{{\"issue\": \"...\", \"excerpt\": \"<verbatim passage>\", \"suggestion\": \"...\"}}], \
         \"explanation\": \"...\"}}\n\n\
         ## EXCERPT\n{}",
        PromptTask::QualityDimension.heading(),
        dimension,
        dimension_rubric(dimension),
        blueprint.title,
        chapter.number,
        chapter.title,
        chapter.pacing,
        blueprint.style.point_of_view,
        blueprint.style.tense,
        excerpt
    )
}

pub(crate) fn fix_prompt(issue: &Issue, excerpt: &str) -> String {
    let suggestion = issue
        .suggestion
        .as_deref()
        .unwrap_or("Fix the problem with minimal changes.");
    format!(
        "{}\n\
         Problem: {}\n\
         Suggestion: {}\n\n\
         Rewrite only this passage. Output only the replacement text.\n\n\
         {}",
        PromptTask::FixPassage.heading(),
        issue.description,
        suggestion,
        excerpt
    )
}

fn continuity_rubric(category: ContinuityCategory) -> &'static str {
    match category {
        ContinuityCategory::Character => {
            "character continuity: personality, knowledge, relationships, injuries and whereabouts"
        }
        ContinuityCategory::Plot => {
            "plot continuity: contradictions with earlier events, forgotten consequences, dropped threads"
        }
        ContinuityCategory::Timeline => {
            "timeline continuity: order of events, elapsed time, day and season"
        }
        ContinuityCategory::Setting => {
            "setting continuity: geography, descriptions of known places, world rules"
        }
        ContinuityCategory::Object => "object continuity: who holds what, and where things are",
    }
}

pub(crate) fn continuity_prompt(
    category: ContinuityCategory,
    chapter_number: u32,
    content: &str,
    known_facts: &str,
) -> String {
    format!(
        "{}\n\
         Category: {}\n\
         Check chapter {} for {}.\n\n\
         ## ESTABLISHED FACTS\n{}\n\n\
         ## CHAPTER\n{}\n\n\
         Respond with JSON only:\n\
         {{\"issues\": [{{\"severity\": \"critical|major|minor\", \"description\": \"...\", \
         \"excerpt\": \"...\", \"suggestion\": \"...\"}}]}}\n\
         Return an empty list when nothing contradicts the established facts.",
        PromptTask::Continuity.heading(),
        category,
        chapter_number,
        continuity_rubric(category),
        if known_facts.trim().is_empty() {
            "(none recorded yet)"
        } else {
            known_facts
        },
        content
    )
}

pub(crate) fn character_state_prompt(content: &str, roster: &[(String, String)]) -> String {
    let names = roster
        .iter()
        .map(|(id, name)| format!("- {} (id: {})", name, id))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{}\n\
         For each character below who appears in the chapter, report their state at the \
         chapter's end.\n{}\n\n\
         Respond with JSON only:\n\
         {{\"characters\": [{{\"id\": \"...\", \"name\": \"...\", \"emotional_state\": \"...\", \
         \"location\": \"...\", \"arc_progress\": <0-100>}}]}}\n\n\
         ## CHAPTER\n{}",
        PromptTask::CharacterStates.heading(),
        names,
        content
    )
}

pub(crate) fn key_events_prompt(content: &str) -> String {
    format!(
        "{}\n\
         List the 5 to 10 most important plot events of this chapter, one per line, \
         each starting with \"- \".\n\n\
         ## CHAPTER\n{}",
        PromptTask::KeyEvents.heading(),
        content
    )
}

pub(crate) fn summary_prompt(chapter: &ChapterBlueprint, content: &str) -> String {
    format!(
        "{}\n\
         Summarize chapter {} \"{}\" in one paragraph of plain prose. \
         Name the characters involved, what happened, and how things stand at the end.\n\n\
         ## CHAPTER\n{}",
        PromptTask::Summary.heading(),
        chapter.number,
        chapter.title,
        content
    )
}
