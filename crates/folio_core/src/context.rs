//! Token-budgeted prompt context for one chapter.

use serde::{Deserialize, Serialize};

/// Allocation of a context window across the prompt fragments.
///
/// Each bucket is the floor of its fixed share of the window; the rounding
/// remainder is folded into `reserved`, so the buckets always sum to the
/// window exactly.
///
/// # Examples
///
/// ```
/// use folio_core::TokenBudget;
///
/// let budget = TokenBudget::from_window(128_000);
/// assert_eq!(*budget.narrative(), 32_000);
/// assert_eq!(*budget.style(), 6_400);
/// assert_eq!(budget.total(), 128_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct TokenBudget {
    /// Window the budget was split from
    window: usize,
    /// System prompt, 10%
    system: usize,
    /// Prior-chapter narrative, 25%
    narrative: usize,
    /// Character bible slice, 15%
    character: usize,
    /// World bible slice, 10%
    world: usize,
    /// Plot slice, 10%
    plot: usize,
    /// Style guide, 5%
    style: usize,
    /// Chapter instructions, 15%
    instructions: usize,
    /// Headroom against estimation error, 10% plus rounding remainder
    reserved: usize,
}

impl TokenBudget {
    /// Split `window` tokens across the fragments.
    pub fn from_window(window: usize) -> Self {
        let share = |percent: usize| window * percent / 100;
        let system = share(10);
        let narrative = share(25);
        let character = share(15);
        let world = share(10);
        let plot = share(10);
        let style = share(5);
        let instructions = share(15);
        let allocated = system + narrative + character + world + plot + style + instructions;
        Self {
            window,
            system,
            narrative,
            character,
            world,
            plot,
            style,
            instructions,
            reserved: window - allocated,
        }
    }

    /// Sum of every bucket.
    pub fn total(&self) -> usize {
        self.system
            + self.narrative
            + self.character
            + self.world
            + self.plot
            + self.style
            + self.instructions
            + self.reserved
    }
}

/// Prompt fragments and budget for generating one chapter.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct ChapterGenerationContext {
    /// Chapter this context was built for
    chapter_number: u32,
    /// Role, voice, quality bar and content constraints
    system_prompt: String,
    /// Summaries of prior chapters and the tail of the latest one
    narrative_context: String,
    /// Relevant characters and their latest known state
    character_context: String,
    /// Relevant locations and world rules
    world_context: String,
    /// Premise, act, threads and prior key events
    plot_context: String,
    /// Style guide rendering
    style_context: String,
    /// Length, pacing, scenes, hooks, inclusions and exclusions
    chapter_instructions: String,
    /// Token allocation the fragments were sized against
    budget: TokenBudget,
    /// Whether the narrative fragment was compressed to fit its bucket
    #[builder(default)]
    narrative_compressed: bool,
}

impl ChapterGenerationContext {
    /// Creates a new context builder.
    pub fn builder() -> ChapterGenerationContextBuilder {
        ChapterGenerationContextBuilder::default()
    }

    /// Join the non-system fragments under section headings.
    ///
    /// The system prompt is kept apart so it can lead every generation call.
    pub fn render_prompt(&self) -> String {
        let sections = [
            ("STORY SO FAR", &self.narrative_context),
            ("CHARACTERS", &self.character_context),
            ("WORLD", &self.world_context),
            ("PLOT", &self.plot_context),
            ("STYLE", &self.style_context),
            ("CHAPTER INSTRUCTIONS", &self.chapter_instructions),
        ];
        let mut out = String::new();
        for (heading, body) in sections {
            if body.trim().is_empty() {
                continue;
            }
            out.push_str("## ");
            out.push_str(heading);
            out.push('\n');
            out.push_str(body.trim_end());
            out.push_str("\n\n");
        }
        out.trim_end().to_string()
    }

    /// System prompt followed by the rendered sections.
    pub fn full_prompt(&self) -> String {
        format!("{}\n\n{}", self.system_prompt.trim_end(), self.render_prompt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_sum_to_window_for_awkward_sizes() {
        for window in [0, 1, 7, 99, 101, 4_096, 8_191, 128_000, 1_000_003] {
            let budget = TokenBudget::from_window(window);
            assert_eq!(budget.total(), window, "window {window}");
        }
    }

    #[test]
    fn remainder_goes_to_reserved() {
        let budget = TokenBudget::from_window(99);
        assert_eq!(*budget.system(), 9);
        assert_eq!(*budget.narrative(), 24);
        assert_eq!(*budget.style(), 4);
        assert_eq!(*budget.reserved(), 99 - (9 + 24 + 14 + 9 + 9 + 4 + 14));
    }

    #[test]
    fn render_skips_empty_sections() {
        let context = ChapterGenerationContext::builder()
            .chapter_number(1u32)
            .system_prompt("system")
            .narrative_context("")
            .character_context("Ada")
            .world_context("  ")
            .plot_context("plot")
            .style_context("style")
            .chapter_instructions("write")
            .budget(TokenBudget::from_window(1_000))
            .build()
            .unwrap();

        let prompt = context.render_prompt();
        assert!(!prompt.contains("STORY SO FAR"));
        assert!(!prompt.contains("## WORLD"));
        assert!(prompt.starts_with("## CHARACTERS\nAda"));
        assert!(prompt.ends_with("## CHAPTER INSTRUCTIONS\nwrite"));
        assert!(context.full_prompt().starts_with("system\n\n## CHARACTERS"));
    }
}
