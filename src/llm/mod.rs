//! Generative-language collaborators for StoryWeaver.
//!
//! This module provides:
//! * [`LanguageModel`]: async trait implemented by all backends.
//! * [`GeminiClient`] / [`OpenAiCompatibleClient`]: REST backends.
//! * [`DisabledModel`]: injected when the service is switched off.
//! * [`ErrorDetector`]: transcript → [`ErrorRecord`]s.
//! * [`StoryWriter`]: subject + errors → pipe-delimited practice story.
//! * [`PromptBuilder`]: the fixed prompt templates.
//! * [`LlmError`]: error variants for model calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use storyweaver::config::AppConfig;
//! use storyweaver::llm::{build_model, split_sections, ErrorDetector, StoryWriter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let model = build_model(&config.llm);
//!
//!     let transcript = "the doggy is run in the park";
//!     // A failed call degrades to "no errors".
//!     let errors = ErrorDetector::new(model.clone())
//!         .detect(transcript)
//!         .await
//!         .unwrap_or_default();
//!
//!     let story = StoryWriter::new(model)
//!         .write("dog", &errors, transcript)
//!         .await
//!         .unwrap_or_default();
//!     for section in split_sections(&story) {
//!         println!("{section}");
//!     }
//! }
//! ```

pub mod client;
pub mod detector;
pub mod prompt;
pub mod response;
pub mod story;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{
    build_model, DisabledModel, GeminiClient, LanguageModel, LlmError, OpenAiCompatibleClient,
};
pub use detector::{deserialize_lenient, parse_errors, ErrorDetector, ErrorKind, ErrorRecord};
pub use prompt::PromptBuilder;
pub use response::strip_code_fence;
pub use story::{split_sections, StoryWriter};
