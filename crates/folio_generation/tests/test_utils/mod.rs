//! Test utilities for folio_generation tests.

pub mod scripted_backend;

#[allow(unused_imports)]
pub use scripted_backend::{
    CHAPTER_TEXT, REVISED_TEXT, SCENE_TEXT, ScriptedBackend, harbor_blueprint,
};
