//! Practice-story generation.
//!
//! [`StoryWriter`] asks the language model for a short story about the
//! picture subject that drills the detected corrections.  The model answers
//! with sections separated by `|`; [`split_sections`] turns that into the
//! ordered list the child practises.

use std::sync::Arc;

use crate::llm::client::{LanguageModel, LlmError};
use crate::llm::detector::ErrorRecord;
use crate::llm::prompt::PromptBuilder;
use crate::llm::response::strip_code_fence;

/// Split pipe-delimited story text into trimmed, non-empty sections.
///
/// ```
/// use storyweaver::llm::split_sections;
///
/// let sections = split_sections("A happy dog. | It runs fast. || ");
/// assert_eq!(sections, vec!["A happy dog.", "It runs fast."]);
/// ```
pub fn split_sections(story: &str) -> Vec<String> {
    story
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct StoryWriter {
    model: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
}

impl StoryWriter {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            prompts: PromptBuilder::new(),
        }
    }

    /// Generate the pipe-delimited story text (code fences removed).
    pub async fn write(
        &self,
        subject: &str,
        errors: &[ErrorRecord],
        transcript: &str,
    ) -> Result<String, LlmError> {
        let prompt = self.prompts.story(subject, errors, transcript);
        let response = self.model.generate(&prompt).await?;
        Ok(strip_code_fence(&response))
    }
}
