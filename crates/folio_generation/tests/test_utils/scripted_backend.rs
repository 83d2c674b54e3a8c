//! Scripted generation backend for tests.

#![allow(dead_code)]

use async_trait::async_trait;
use folio_core::{
    BookBlueprint, ChapterBlueprint, CharacterProfile, GenerationOptions, Location,
    SceneBlueprint,
};
use folio_error::{BackendError, FolioResult};
use folio_generation::{PromptTask, SessionControl};
use folio_interface::GenerationBackend;
use std::collections::HashSet;
use std::sync::Mutex;

/// Prose returned for every scene.
pub const SCENE_TEXT: &str = "Mara walked the length of the pier while the lamps hissed. \
     The fog carried the smell of tar and salt.";

/// Prose returned for a whole chapter.
pub const CHAPTER_TEXT: &str = "Mara climbed the lighthouse stairs.\n\n\
     At the top the lamp was cold, and someone had taken the key.";

/// Prose returned for a revision.
pub const REVISED_TEXT: &str = "Mara climbed the lighthouse stairs two at a time.\n\n\
     At the top the lamp was cold. The key was gone, and so was Tomas.";

/// Deterministic backend that answers by prompt task.
///
/// Quality scores follow `scores`, indexed by the number of revisions
/// requested so far; the last score repeats.
pub struct ScriptedBackend {
    scores: Vec<f64>,
    failing_tasks: Mutex<HashSet<PromptTask>>,
    fail_outline_call: Mutex<Option<usize>>,
    cancel_on: Mutex<Option<(PromptTask, SessionControl)>>,
    continuity_response: String,
    calls: Mutex<Vec<(PromptTask, String)>>,
}

impl ScriptedBackend {
    /// Backend whose every evaluation scores `score`.
    pub fn scoring(score: f64) -> Self {
        Self::with_scores(vec![score])
    }

    /// Backend whose evaluations follow `scores` across revisions.
    pub fn with_scores(scores: Vec<f64>) -> Self {
        Self {
            scores,
            failing_tasks: Mutex::new(HashSet::new()),
            fail_outline_call: Mutex::new(None),
            cancel_on: Mutex::new(None),
            continuity_response: r#"{"issues": []}"#.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call for `task`.
    pub fn failing(self, task: PromptTask) -> Self {
        self.failing_tasks.lock().unwrap().insert(task);
        self
    }

    /// Fail the `n`th outline request (1-based).
    pub fn failing_outline_call(self, n: usize) -> Self {
        *self.fail_outline_call.lock().unwrap() = Some(n);
        self
    }

    /// Cancel `control` when the first `task` call arrives.
    pub fn cancelling_on(self, task: PromptTask, control: SessionControl) -> Self {
        *self.cancel_on.lock().unwrap() = Some((task, control));
        self
    }

    /// Answer continuity checks with `response`.
    pub fn with_continuity_response(mut self, response: impl Into<String>) -> Self {
        self.continuity_response = response.into();
        self
    }

    /// Stop every scripted failure and cancellation.
    pub fn heal(&self) {
        *self.fail_outline_call.lock().unwrap() = None;
        self.failing_tasks.lock().unwrap().clear();
        *self.cancel_on.lock().unwrap() = None;
    }

    /// Number of calls made for `task`.
    pub fn count(&self, task: PromptTask) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == task)
            .count()
    }

    /// Prompts sent for `task`, in order.
    pub fn prompts(&self, task: PromptTask) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == task)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Total number of calls.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn quality_response(&self) -> String {
        let revisions = self.count(PromptTask::Revision);
        let score = self.scores[revisions.min(self.scores.len() - 1)];
        format!(
            r#"Here is my assessment:
```json
{{"score": {score}, "strengths": ["vivid setting"],
  "weaknesses": [{{"issue": "the opening drags", "excerpt": "Mara climbed", "suggestion": "start in motion"}}],
  "explanation": "solid"}}
```"#
        )
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> FolioResult<String> {
        let task = PromptTask::of(prompt)
            .ok_or_else(|| BackendError::new("Prompt has no task heading"))?;
        self.calls
            .lock()
            .unwrap()
            .push((task, prompt.to_string()));

        if let Some((cancel_task, control)) = self.cancel_on.lock().unwrap().as_ref() {
            if *cancel_task == task {
                control.cancel();
            }
        }
        if self.failing_tasks.lock().unwrap().contains(&task) {
            return Err(BackendError::new(format!("Scripted failure for {}", task)).into());
        }
        if task == PromptTask::Outline {
            let fail_at = *self.fail_outline_call.lock().unwrap();
            if fail_at == Some(self.count(PromptTask::Outline)) {
                return Err(BackendError::new("Scripted outline failure").into());
            }
        }

        let response = match task {
            PromptTask::CompressNarrative => "Mara reached the harbor and found the lamp dark.".to_string(),
            PromptTask::Outline => "1. Mara arrives\n2. The lamp is cold".to_string(),
            PromptTask::Scene => SCENE_TEXT.to_string(),
            PromptTask::Chapter => CHAPTER_TEXT.to_string(),
            PromptTask::Revision => REVISED_TEXT.to_string(),
            PromptTask::QualityDimension => self.quality_response(),
            PromptTask::FixPassage => "Mara ran up the stairs".to_string(),
            PromptTask::Continuity => self.continuity_response.clone(),
            PromptTask::CharacterStates => r#"{"characters": [
                {"id": "mara", "name": "Mara", "emotional_state": "uneasy", "location": "lighthouse", "arc_progress": "30%"}
            ]}"#
            .to_string(),
            PromptTask::KeyEvents => "- Mara arrives at the harbor\n- The lighthouse key is missing".to_string(),
            PromptTask::Summary => "Mara returns to the harbor and finds the lighthouse dark.".to_string(),
        };
        Ok(response)
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

/// Three-chapter blueprint; chapter 2 is planned scene by scene.
pub fn harbor_blueprint() -> BookBlueprint {
    let mut blueprint = BookBlueprint::new("harbor-lights", "Harbor Lights");
    blueprint.style.point_of_view = "third person limited".to_string();
    blueprint.style.tense = "past".to_string();
    blueprint.characters = vec![
        CharacterProfile::new("mara", "Mara"),
        CharacterProfile::new("tomas", "Tomas"),
    ];
    blueprint.world.locations = vec![Location::new("lighthouse", "The Lighthouse")];

    let mut opening = ChapterBlueprint::new(1, "Arrival");
    opening.character_ids = vec!["mara".to_string()];
    opening.target_word_count = 1_200;

    let mut middle = ChapterBlueprint::new(2, "The Cold Lamp");
    middle.target_word_count = 1_500;
    middle.scenes = vec![
        SceneBlueprint::new("Pier", "Mara walks the pier at dusk"),
        SceneBlueprint::new("Stairs", "She climbs the lighthouse"),
        SceneBlueprint::new("Lamp room", "The key is missing"),
    ];

    let closing = ChapterBlueprint::new(3, "Tomas");
    blueprint.chapters = vec![opening, middle, closing];
    blueprint
}
