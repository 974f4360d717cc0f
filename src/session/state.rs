//! Session state machine.
//!
//! One [`Session`] covers a single picture from description to finished
//! story.  Every user action maps to one method; an action that is not legal
//! in the current stage returns a [`SessionError`] and leaves the session
//! untouched.
//!
//! ```text
//! Description ──begin_practice(story)──▶ StoryGenerated (cursor 0)
//!                                          │  record_attempt: cursor stays
//!                                          │  advance:        cursor += 1
//!                                          ▼
//!                                 complete (cursor == sections)
//! any stage ──reset(picture)──▶ Description
//! ```

use chrono::{Local, NaiveDateTime};
use thiserror::Error;

use crate::llm::{split_sections, ErrorRecord};
use crate::progress::{Attempt, ProgressEntry, SectionAttempts};
use crate::session::pictures::Picture;

// ---------------------------------------------------------------------------
// Stage / SessionError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Waiting for the child to describe the picture.
    #[default]
    Description,
    /// The story exists and sections are being read.
    StoryGenerated,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Description => "description",
            Stage::StoryGenerated => "story_generated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("not allowed during the {} stage", .0.label())]
    WrongStage(Stage),

    #[error("every section has already been read")]
    SessionComplete,

    #[error("the story has no sections")]
    EmptyStory,
}

// ---------------------------------------------------------------------------
// Summary types
// ---------------------------------------------------------------------------

/// Per-section line of the completion breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionStats {
    /// 1-based section number.
    pub number: usize,
    pub attempts: usize,
    pub best_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub sections: usize,
    pub total_attempts: usize,
    /// Mean over every individual attempt; 0 with no attempts.
    pub average_accuracy: f64,
    pub initial_errors: usize,
    /// Only sections that were attempted.
    pub per_section: Vec<SectionStats>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    started_at: NaiveDateTime,
    picture: Option<Picture>,
    stage: Stage,
    transcript: String,
    errors: Vec<ErrorRecord>,
    story: String,
    sections: Vec<String>,
    attempts: Vec<Vec<Attempt>>,
    cursor: usize,
}

impl Session {
    /// Fresh session in the description stage, started now.
    pub fn new(picture: Option<Picture>) -> Self {
        Self::started_at(picture, Local::now().naive_local())
    }

    pub fn started_at(picture: Option<Picture>, at: NaiveDateTime) -> Self {
        Self {
            started_at: at,
            picture,
            stage: Stage::Description,
            transcript: String::new(),
            errors: Vec::new(),
            story: String::new(),
            sections: Vec::new(),
            attempts: Vec::new(),
            cursor: 0,
        }
    }

    // ---- accessors ----

    pub fn start_time(&self) -> NaiveDateTime {
        self.started_at
    }

    pub fn picture(&self) -> Option<&Picture> {
        self.picture.as_ref()
    }

    /// Picture subject, empty when the folder had no pictures.
    pub fn subject(&self) -> &str {
        self.picture.as_ref().map_or("", |p| p.subject.as_str())
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn story(&self) -> &str {
        &self.story
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Attempts recorded for section `index` (empty if out of range).
    pub fn attempts(&self, index: usize) -> &[Attempt] {
        self.attempts.get(index).map_or(&[], Vec::as_slice)
    }

    /// Reference text of the section being practised.
    pub fn current_text(&self) -> Option<&str> {
        if self.stage != Stage::StoryGenerated {
            return None;
        }
        self.sections.get(self.cursor).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::StoryGenerated && self.cursor == self.sections.len()
    }

    // ---- transitions ----

    /// Store the child's description and the errors found in it.  May be
    /// repeated until a story is generated.
    pub fn record_description(
        &mut self,
        transcript: impl Into<String>,
        errors: Vec<ErrorRecord>,
    ) -> Result<(), SessionError> {
        self.require_stage(Stage::Description)?;
        self.transcript = transcript.into();
        self.errors = errors;
        Ok(())
    }

    /// Split `story` into sections and start practising the first one.
    pub fn begin_practice(&mut self, story: &str) -> Result<(), SessionError> {
        self.require_stage(Stage::Description)?;
        let sections = split_sections(story);
        if sections.is_empty() {
            return Err(SessionError::EmptyStory);
        }

        self.story = story.trim().to_string();
        self.attempts = vec![Vec::new(); sections.len()];
        self.sections = sections;
        self.cursor = 0;
        self.stage = Stage::StoryGenerated;
        Ok(())
    }

    /// Append a scored reading to the current section.  The cursor does not
    /// move.
    pub fn record_attempt(
        &mut self,
        transcript: impl Into<String>,
        accuracy: f64,
        at: NaiveDateTime,
    ) -> Result<&Attempt, SessionError> {
        self.require_practising()?;
        let list = &mut self.attempts[self.cursor];
        list.push(Attempt {
            transcript: transcript.into(),
            accuracy: accuracy.clamp(0.0, 100.0),
            timestamp: at,
        });
        Ok(&list[list.len() - 1])
    }

    /// Move to the next section.  Scores are not checked here.
    pub fn advance(&mut self) -> Result<(), SessionError> {
        self.require_practising()?;
        self.cursor += 1;
        Ok(())
    }

    /// Discard everything and start over with `picture`.
    pub fn reset(&mut self, picture: Option<Picture>) {
        *self = Session::new(picture);
    }

    // ---- derived views ----

    /// Corrections that appear in the current section, lower-cased,
    /// without duplicates, in error order.
    pub fn focus_words(&self) -> Vec<String> {
        let Some(text) = self.current_text() else {
            return Vec::new();
        };
        let haystack = text.to_lowercase();

        let mut words: Vec<String> = Vec::new();
        for error in &self.errors {
            let correction = error.correction.trim().to_lowercase();
            if !correction.is_empty()
                && haystack.contains(&correction)
                && !words.contains(&correction)
            {
                words.push(correction);
            }
        }
        words
    }

    /// Completion statistics; `None` until every section has been passed.
    pub fn summary(&self) -> Option<SessionSummary> {
        if !self.is_complete() {
            return None;
        }

        let scores: Vec<f64> = self.attempts.iter().flatten().map(|a| a.accuracy).collect();
        let average_accuracy = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        let per_section = self
            .attempts
            .iter()
            .enumerate()
            .filter(|(_, list)| !list.is_empty())
            .map(|(index, list)| SectionStats {
                number: index + 1,
                attempts: list.len(),
                best_accuracy: list.iter().map(|a| a.accuracy).fold(0.0, f64::max),
            })
            .collect();

        Some(SessionSummary {
            sections: self.sections.len(),
            total_attempts: scores.len(),
            average_accuracy,
            initial_errors: self.errors.len(),
            per_section,
        })
    }

    /// Flattened record for the progress file; `None` until complete.
    pub fn progress_entry(&self) -> Option<ProgressEntry> {
        let summary = self.summary()?;
        let section_attempts = SectionAttempts(
            self.attempts
                .iter()
                .enumerate()
                .filter(|(_, list)| !list.is_empty())
                .map(|(index, list)| (index, list.clone()))
                .collect(),
        );

        Some(ProgressEntry {
            date: self.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            subject: self.subject().to_string(),
            initial_errors: summary.initial_errors,
            errors_detail: self.errors.clone(),
            sections_completed: summary.sections,
            total_attempts: summary.total_attempts,
            average_accuracy: summary.average_accuracy,
            section_attempts,
        })
    }

    // ---- guards ----

    fn require_stage(&self, stage: Stage) -> Result<(), SessionError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(SessionError::WrongStage(self.stage))
        }
    }

    fn require_practising(&self) -> Result<(), SessionError> {
        self.require_stage(Stage::StoryGenerated)?;
        if self.is_complete() {
            return Err(SessionError::SessionComplete);
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ErrorKind;
    use chrono::NaiveDate;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
    }

    fn dog() -> Option<Picture> {
        Picture::from_path("pictures/dog.jpg")
    }

    fn error(correction: &str) -> ErrorRecord {
        ErrorRecord {
            kind: ErrorKind::Grammar,
            incorrect: "x".into(),
            correction: correction.into(),
            explanation: "because".into(),
        }
    }

    fn practising(story: &str) -> Session {
        let mut session = Session::started_at(dog(), at(0));
        session.record_description("the dog run", vec![error("runs")]).unwrap();
        session.begin_practice(story).unwrap();
        session
    }

    // ---- description stage ----

    #[test]
    fn new_session_starts_in_description() {
        let session = Session::started_at(dog(), at(0));
        assert_eq!(session.stage(), Stage::Description);
        assert_eq!(session.subject(), "dog");
        assert_eq!(session.cursor(), 0);
        assert!(!session.is_complete());
        assert!(session.current_text().is_none());
    }

    #[test]
    fn description_can_be_recorded_again() {
        let mut session = Session::started_at(dog(), at(0));
        session.record_description("first", vec![error("a")]).unwrap();
        session.record_description("second", Vec::new()).unwrap();
        assert_eq!(session.transcript(), "second");
        assert!(session.errors().is_empty());
    }

    #[test]
    fn attempts_are_rejected_before_the_story() {
        let mut session = Session::started_at(dog(), at(0));
        let before = session.clone();
        assert_eq!(
            session.record_attempt("hi", 50.0, at(1)).unwrap_err(),
            SessionError::WrongStage(Stage::Description)
        );
        assert_eq!(session.advance(), Err(SessionError::WrongStage(Stage::Description)));
        assert_eq!(session, before);
    }

    #[test]
    fn empty_story_leaves_session_in_description() {
        let mut session = Session::started_at(dog(), at(0));
        session.record_description("the dog run", vec![error("runs")]).unwrap();
        let before = session.clone();

        assert_eq!(session.begin_practice(" | |  "), Err(SessionError::EmptyStory));
        assert_eq!(session.begin_practice(""), Err(SessionError::EmptyStory));
        assert_eq!(session, before);
    }

    #[test]
    fn begin_practice_splits_sections() {
        let session = practising("The dog runs. | It runs fast. | Then it sleeps.");
        assert_eq!(session.stage(), Stage::StoryGenerated);
        assert_eq!(
            session.sections(),
            &["The dog runs.", "It runs fast.", "Then it sleeps."]
        );
        assert_eq!(session.current_text(), Some("The dog runs."));
    }

    #[test]
    fn story_cannot_be_replaced_once_generated() {
        let mut session = practising("A. | B.");
        assert_eq!(
            session.begin_practice("C. | D."),
            Err(SessionError::WrongStage(Stage::StoryGenerated))
        );
        assert_eq!(session.sections(), &["A.", "B."]);
    }

    // ---- practice stage ----

    #[test]
    fn attempts_accumulate_without_moving_the_cursor() {
        let mut session = practising("A. | B.");
        session.record_attempt("a", 40.0, at(1)).unwrap();
        session.record_attempt("a.", 95.0, at(2)).unwrap();

        assert_eq!(session.cursor(), 0);
        assert_eq!(session.attempts(0).len(), 2);
        assert!(session.attempts(1).is_empty());
    }

    #[test]
    fn accuracy_is_clamped() {
        let mut session = practising("A.");
        let attempt = session.record_attempt("a", 130.0, at(1)).unwrap();
        assert_eq!(attempt.accuracy, 100.0);
    }

    #[test]
    fn advance_ignores_scores_and_stops_at_the_end() {
        let mut session = practising("A. | B.");
        session.record_attempt("zzz", 5.0, at(1)).unwrap();
        session.advance().unwrap();
        session.advance().unwrap();

        assert!(session.is_complete());
        assert_eq!(session.cursor(), 2);
        assert!(session.current_text().is_none());
        assert_eq!(session.advance(), Err(SessionError::SessionComplete));
        assert_eq!(
            session.record_attempt("late", 90.0, at(3)).unwrap_err(),
            SessionError::SessionComplete
        );
        assert_eq!(session.cursor(), 2);
    }

    #[test]
    fn focus_words_are_corrections_found_in_the_section() {
        let mut session = Session::started_at(dog(), at(0));
        session
            .record_description(
                "he go and the dog run",
                vec![error("Runs"), error("goes"), error("runs"), error("")],
            )
            .unwrap();
        session.begin_practice("The dog RUNS and goes. | It naps.").unwrap();

        assert_eq!(session.focus_words(), vec!["runs", "goes"]);
        session.advance().unwrap();
        assert!(session.focus_words().is_empty());
    }

    // ---- completion ----

    #[test]
    fn summary_averages_every_attempt() {
        let mut session = practising("A. | B.");
        session.record_attempt("a", 90.0, at(1)).unwrap();
        session.advance().unwrap();
        session.record_attempt("b", 50.0, at(2)).unwrap();
        session.record_attempt("b", 70.0, at(3)).unwrap();
        assert!(session.summary().is_none());
        session.advance().unwrap();

        let summary = session.summary().unwrap();
        assert_eq!(summary.sections, 2);
        assert_eq!(summary.total_attempts, 3);
        assert!((summary.average_accuracy - 70.0).abs() < 1e-9);
        assert_eq!(summary.initial_errors, 1);
        assert_eq!(
            summary.per_section,
            vec![
                SectionStats { number: 1, attempts: 1, best_accuracy: 90.0 },
                SectionStats { number: 2, attempts: 2, best_accuracy: 70.0 },
            ]
        );
    }

    #[test]
    fn skipped_sections_are_left_out_of_the_breakdown() {
        let mut session = practising("A. | B. | C.");
        session.advance().unwrap();
        session.record_attempt("b", 80.0, at(1)).unwrap();
        session.advance().unwrap();
        session.advance().unwrap();

        let summary = session.summary().unwrap();
        assert_eq!(summary.per_section.len(), 1);
        assert_eq!(summary.per_section[0].number, 2);

        let entry = session.progress_entry().unwrap();
        let keys: Vec<usize> = entry.section_attempts.iter().map(|(i, _)| *i).collect();
        assert_eq!(keys, vec![1]);
    }

    #[test]
    fn completion_without_attempts_averages_zero() {
        let mut session = practising("A.");
        session.advance().unwrap();
        let summary = session.summary().unwrap();
        assert_eq!(summary.total_attempts, 0);
        assert_eq!(summary.average_accuracy, 0.0);
        assert!(summary.per_section.is_empty());
    }

    #[test]
    fn progress_entry_flattens_the_session() {
        let mut session = practising("A. | B.");
        session.record_attempt("a", 90.0, at(1)).unwrap();
        session.advance().unwrap();
        session.record_attempt("b", 60.0, at(2)).unwrap();
        assert!(session.progress_entry().is_none());
        session.advance().unwrap();

        let entry = session.progress_entry().unwrap();
        assert_eq!(entry.date, "2025-03-01 10:00:00");
        assert_eq!(entry.subject, "dog");
        assert_eq!(entry.initial_errors, 1);
        assert_eq!(entry.errors_detail, vec![error("runs")]);
        assert_eq!(entry.sections_completed, 2);
        assert_eq!(entry.total_attempts, 2);
        assert!((entry.average_accuracy - 75.0).abs() < 1e-9);
        assert_eq!(entry.section_attempts.0.len(), 2);
        assert_eq!(entry.section_attempts.0[1].1[0].transcript, "b");
    }

    #[test]
    fn reset_returns_every_field_to_initial_values() {
        let mut session = practising("A. | B.");
        session.record_attempt("a", 90.0, at(1)).unwrap();
        session.advance().unwrap();
        session.advance().unwrap();

        let cat = Picture::from_path("pictures/cat.png");
        session.reset(cat.clone());

        let fresh = Session::started_at(cat, session.start_time());
        assert_eq!(session, fresh);
        assert_eq!(session.subject(), "cat");
        assert_eq!(session.stage(), Stage::Description);
        assert!(session.story().is_empty());
        assert!(session.sections().is_empty());
    }

    #[test]
    fn session_without_picture_has_empty_subject() {
        let session = Session::new(None);
        assert_eq!(session.subject(), "");
        assert!(session.picture().is_none());
    }
}
