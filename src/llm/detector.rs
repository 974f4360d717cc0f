//! Grammar / vocabulary / articulation error detection.
//!
//! [`ErrorDetector`] sends the child's transcript to the language model and
//! parses the JSON array it returns into [`ErrorRecord`]s.  Malformed JSON
//! surfaces as [`LlmError::Parse`]; callers degrade any error to an empty
//! list.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::llm::client::{LanguageModel, LlmError};
use crate::llm::prompt::PromptBuilder;
use crate::llm::response::strip_code_fence;

// ---------------------------------------------------------------------------
// ErrorKind / ErrorRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Grammar,
    Vocabulary,
    Articulation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Grammar => "grammar",
            ErrorKind::Vocabulary => "vocabulary",
            ErrorKind::Articulation => "articulation",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "grammar" => Some(ErrorKind::Grammar),
            "vocabulary" => Some(ErrorKind::Vocabulary),
            "articulation" => Some(ErrorKind::Articulation),
            _ => None,
        }
    }
}

/// One correction suggested for the child's description.
///
/// Serialised with the field names used in the progress file
/// (`type`, `incorrect`, `correction`, `explanation`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(default)]
    pub incorrect: String,
    #[serde(default)]
    pub correction: String,
    #[serde(default)]
    pub explanation: String,
}

/// Lenient wire shape: the model sometimes omits fields or invents kinds.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    incorrect: String,
    #[serde(default)]
    correction: String,
    #[serde(default)]
    explanation: String,
}

impl RawRecord {
    fn into_record(self) -> Option<ErrorRecord> {
        let Some(kind) = ErrorKind::parse(&self.kind) else {
            log::debug!("detector: skipping record with unknown type {:?}", self.kind);
            return None;
        };
        Some(ErrorRecord {
            kind,
            incorrect: self.incorrect,
            correction: self.correction,
            explanation: self.explanation,
        })
    }
}

/// Parse a model response into error records.
///
/// The response must be a JSON array, optionally inside a code fence with a
/// `json` tag.  Elements with an unknown `type` are skipped.
pub fn parse_errors(response: &str) -> Result<Vec<ErrorRecord>, LlmError> {
    let body = strip_code_fence(response);
    let body = body.strip_prefix("json").unwrap_or(&body).trim();
    let raw: Vec<RawRecord> =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;

    Ok(raw.into_iter().filter_map(RawRecord::into_record).collect())
}

/// `deserialize_with` helper for stored record lists.
///
/// Applies the same leniency as [`parse_errors`]: kinds match
/// case-insensitively, records with a missing or unknown kind are dropped,
/// and elements that are not objects are ignored.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Vec<ErrorRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|value| serde_json::from_value::<RawRecord>(value).ok())
        .filter_map(RawRecord::into_record)
        .collect())
}

// ---------------------------------------------------------------------------
// ErrorDetector
// ---------------------------------------------------------------------------

pub struct ErrorDetector {
    model: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
}

impl ErrorDetector {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            prompts: PromptBuilder::new(),
        }
    }

    /// Ask the model for corrections to `transcript`.
    pub async fn detect(&self, transcript: &str) -> Result<Vec<ErrorRecord>, LlmError> {
        let prompt = self.prompts.error_detection(transcript);
        let response = self.model.generate(&prompt).await?;
        parse_errors(&response)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
