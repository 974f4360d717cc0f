//! Records stored in the progress file.
//!
//! The JSON layout is shared with earlier versions of the tool, so field
//! names are fixed:
//!
//! ```json
//! {
//!   "sessions": [
//!     {
//!       "date": "2025-03-01 10:15:00",
//!       "subject": "dog",
//!       "initial_errors": 1,
//!       "errors_detail": [ { "type": "grammar", "incorrect": "…", "correction": "…", "explanation": "…" } ],
//!       "sections_completed": 3,
//!       "total_attempts": 4,
//!       "average_accuracy": 87.5,
//!       "section_attempts": {
//!         "section_0": [ { "transcript": "…", "accuracy": 91.2, "timestamp": "2025-03-01T10:16:03.120" } ]
//!       }
//!     }
//!   ]
//! }
//! ```

use std::fmt;

use chrono::NaiveDateTime;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::llm::{deserialize_lenient, ErrorRecord};

// ---------------------------------------------------------------------------
// Attempt
// ---------------------------------------------------------------------------

/// One scored reading of a story section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub transcript: String,
    /// Similarity to the reference text, in `[0, 100]`.
    pub accuracy: f64,
    pub timestamp: NaiveDateTime,
}

// ---------------------------------------------------------------------------
// SectionAttempts
// ---------------------------------------------------------------------------

/// Attempts grouped by zero-based section index, in section order.
///
/// Serialised as a JSON object keyed `section_<index>`.  A `Vec` keeps the
/// order stable where a map would sort `section_10` before `section_2`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionAttempts(pub Vec<(usize, Vec<Attempt>)>);

impl SectionAttempts {
    pub fn iter(&self) -> impl Iterator<Item = &(usize, Vec<Attempt>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SectionAttempts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (index, attempts) in &self.0 {
            map.serialize_entry(&format!("section_{index}"), attempts)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SectionAttempts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SectionVisitor;

        impl<'de> Visitor<'de> for SectionVisitor {
            type Value = SectionAttempts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object keyed section_<index>")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut sections = Vec::new();
                while let Some((key, attempts)) = access.next_entry::<String, Vec<Attempt>>()? {
                    let index = key
                        .strip_prefix("section_")
                        .and_then(|n| n.parse::<usize>().ok())
                        .ok_or_else(|| {
                            serde::de::Error::custom(format!("unexpected section key {key:?}"))
                        })?;
                    sections.push((index, attempts));
                }
                sections.sort_by_key(|(index, _)| *index);
                Ok(SectionAttempts(sections))
            }
        }

        deserializer.deserialize_map(SectionVisitor)
    }
}

// ---------------------------------------------------------------------------
// ProgressEntry / ProgressLog
// ---------------------------------------------------------------------------

/// Flattened summary of one completed session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressEntry {
    /// Session start, `%Y-%m-%d %H:%M:%S` local time.
    pub date: String,
    pub subject: String,
    pub initial_errors: usize,
    #[serde(deserialize_with = "deserialize_lenient")]
    pub errors_detail: Vec<ErrorRecord>,
    pub sections_completed: usize,
    pub total_attempts: usize,
    pub average_accuracy: f64,
    pub section_attempts: SectionAttempts,
}

/// Whole contents of the progress file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressLog {
    #[serde(default)]
    pub sessions: Vec<ProgressEntry>,
}

/// Figures for the progress side panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressOverview {
    pub total_sessions: usize,
    /// Mean of the stored per-session averages.
    pub average_accuracy: f64,
    /// Most recent sessions, newest first.
    pub recent: Vec<ProgressEntry>,
}

impl ProgressLog {
    /// Summarise the log, keeping the last `recent` sessions.
    pub fn overview(&self, recent: usize) -> ProgressOverview {
        let total_sessions = self.sessions.len();
        let average_accuracy = if total_sessions == 0 {
            0.0
        } else {
            self.sessions.iter().map(|s| s.average_accuracy).sum::<f64>() / total_sessions as f64
        };

        ProgressOverview {
            total_sessions,
            average_accuracy,
            recent: self.sessions.iter().rev().take(recent).cloned().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
