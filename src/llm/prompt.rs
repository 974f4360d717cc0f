//! Prompt templates for error detection and story writing.
//!
//! [`PromptBuilder`] renders two fixed templates:
//!
//! * [`error_detection`](PromptBuilder::error_detection): asks for a JSON
//!   array of `{type, incorrect, correction, explanation}` objects.
//! * [`story`](PromptBuilder::story): asks for a three-sentence story about
//!   the picture subject, sections separated by `|`, that reuses the
//!   corrected words.

use crate::llm::detector::ErrorRecord;

const ERROR_DETECTION_TEMPLATE: &str = "\
You are a speech therapist helping a child aged {age} years.
Analyze the following child's sentence for errors:

\"{transcript}\"

Identify:
1. Grammar errors and corrections
2. Vocabulary errors and corrections
3. Simple articulation errors that can be inferred from the text

Return a JSON array. Each element must include:
- type: \"grammar\" or \"vocabulary\" or \"articulation\"
- incorrect: the incorrect phrase
- correction: the corrected phrase
- explanation: short child-friendly explanation (max 15 words)

Return ONLY the JSON array (empty if no errors).
";

const STORY_TEMPLATE: &str = "\
You are a creative children's story writer and speech therapist.

Create a SHORT story (3 sentences) for a {age} year old child about: {subject}

IMPORTANT REQUIREMENTS:
1. The story MUST naturally incorporate and repeatedly use the words/sounds the child struggled with
2. Make the story engaging, fun, and age-appropriate, and mostly with simple words adapted for young children.
3. {errors}
4. Use simple vocabulary but strategically include the correction words from the errors
5. Break the story into very short sections (1-2 sentences each) separated by a pipe symbol |

The child said: \"{transcript}\"

Generate the story with sections separated by | (pipe symbol).
Example format: \"Once upon a time, there was a happy dog. | The dog loved to play. | One day, the dog found a ball.\"

Return ONLY the story text with | separators, no other commentary.
";

const NO_ERRORS: &str = "No specific errors were detected, so create a simple engaging story.";

/// Renders the error-detection and story prompts.
///
/// ```
/// use storyweaver::llm::PromptBuilder;
///
/// let prompt = PromptBuilder::new().story("dog", &[], "the dog is run");
/// assert!(prompt.contains("about: dog"));
/// assert!(prompt.contains("No specific errors were detected"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    age_range: String,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            age_range: "4-6".into(),
        }
    }

    pub fn error_detection(&self, transcript: &str) -> String {
        ERROR_DETECTION_TEMPLATE
            .replace("{age}", &self.age_range)
            .replace("{transcript}", transcript)
    }

    pub fn story(&self, subject: &str, errors: &[ErrorRecord], transcript: &str) -> String {
        STORY_TEMPLATE
            .replace("{age}", &self.age_range)
            .replace("{subject}", subject)
            .replace("{errors}", &describe_errors(errors))
            .replace("{transcript}", transcript)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_errors(errors: &[ErrorRecord]) -> String {
    if errors.is_empty() {
        return NO_ERRORS.to_string();
    }
    let lines: Vec<String> = errors
        .iter()
        .map(|e| {
            format!(
                "- {}: '{}' should be '{}'",
                e.kind.as_str(),
                e.incorrect,
                e.correction
            )
        })
        .collect();
    format!("The child made these errors:\n{}", lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
