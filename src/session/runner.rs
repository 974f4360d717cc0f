//! Practice orchestrator: runs the collaborators for each user action and
//! feeds the results into the [`Session`] state machine.
//!
//! # Flow
//!
//! ```text
//! PracticeCommand::StopRecording
//!   ├─ Description    → spawn_blocking(stt) → detector → story writer → begin_practice
//!   └─ StoryGenerated → spawn_blocking(stt) → similarity → record_attempt
//! PracticeCommand::Advance  → session.advance(), persist once on completion
//! PracticeCommand::Listen   → tts → PracticeEvent::Speech
//! PracticeCommand::Reset    → session.reset(library.choose())
//! ```
//!
//! Commands are handled strictly one at a time.  A failed collaborator call
//! never aborts the session: it becomes a [`Notice`] on the next snapshot and
//! the flow continues with an empty result.

use std::sync::{Arc, Mutex};

use chrono::Local;
use tokio::sync::mpsc;

use crate::config::PracticeConfig;
use crate::llm::{ErrorDetector, LanguageModel, StoryWriter};
use crate::progress::{ProgressOverview, ProgressStore};
use crate::scoring::{similarity, Feedback};
use crate::session::pictures::PictureLibrary;
use crate::session::state::{Session, SessionError, Stage};
use crate::stt::SttEngine;
use crate::tts::SpeechSynth;

// ---------------------------------------------------------------------------
// SharedAudioBuffer
// ---------------------------------------------------------------------------

/// Samples captured while recording, plus the "is recording" flag.
///
/// The capture thread appends 16 kHz mono samples only while the flag is
/// set; the orchestrator clears it on start and drains it on stop.
pub type SharedAudioBuffer = Arc<Mutex<(Vec<f32>, bool)>>;

pub fn new_audio_buffer() -> SharedAudioBuffer {
    Arc::new(Mutex::new((Vec::new(), false)))
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Commands sent from the UI to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeCommand {
    StartRecording,
    /// Stop recording and process the clip for the current stage.
    StopRecording,
    /// Move to the next story section.
    Advance,
    /// Speak the current section.
    Listen,
    /// Start over with a new picture.
    Reset,
    /// Discard the recording in progress.
    Cancel,
}

/// Long-running step the orchestrator is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Transcribing,
    CheckingSpeech,
    WritingStory,
    Speaking,
}

impl Activity {
    pub fn label(self) -> &'static str {
        match self {
            Activity::Transcribing => "Understanding what you said...",
            Activity::CheckingSpeech => "Checking for improvements...",
            Activity::WritingStory => "Creating your practice story...",
            Activity::Speaking => "Getting the voice ready...",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible message about the last command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Outcome of the most recent reading of the current section.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub section: usize,
    pub transcript: String,
    pub accuracy: f64,
    pub feedback: Feedback,
}

/// Everything the UI renders, sent after each command.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session: Session,
    pub recording: bool,
    pub last_reading: Option<Reading>,
    pub overview: ProgressOverview,
    pub notices: Vec<Notice>,
}

/// Events sent from the orchestrator to the UI.
#[derive(Debug, Clone)]
pub enum PracticeEvent {
    /// A blocking step started; cleared by the next snapshot.
    Busy(Activity),
    Snapshot(Box<SessionView>),
    /// Encoded audio (MP3) for section `section`.
    Speech { section: usize, audio: Vec<u8> },
}

// ---------------------------------------------------------------------------
// PracticeOrchestrator
// ---------------------------------------------------------------------------

/// Collaborators injected at startup.
pub struct Collaborators {
    pub stt: Arc<dyn SttEngine>,
    pub model: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn SpeechSynth>,
}

pub struct PracticeOrchestrator {
    session: Session,
    audio_buf: SharedAudioBuffer,
    stt: Arc<dyn SttEngine>,
    detector: ErrorDetector,
    writer: StoryWriter,
    tts: Arc<dyn SpeechSynth>,
    store: ProgressStore,
    library: PictureLibrary,
    gates: PracticeConfig,
    recent_sessions: usize,
    overview: ProgressOverview,
    last_reading: Option<Reading>,
    notices: Vec<Notice>,
}

impl PracticeOrchestrator {
    /// Create an orchestrator with a fresh session on a random picture.
    pub fn new(
        collaborators: Collaborators,
        store: ProgressStore,
        library: PictureLibrary,
        gates: PracticeConfig,
        audio_buf: SharedAudioBuffer,
    ) -> Self {
        let mut orchestrator = Self {
            session: Session::new(library.choose()),
            audio_buf,
            stt: collaborators.stt,
            detector: ErrorDetector::new(Arc::clone(&collaborators.model)),
            writer: StoryWriter::new(collaborators.model),
            tts: collaborators.tts,
            store,
            library,
            gates,
            recent_sessions: 5,
            overview: ProgressOverview::default(),
            last_reading: None,
            notices: Vec::new(),
        };
        orchestrator.refresh_overview();
        orchestrator.note_missing_picture();
        orchestrator
    }

    /// Number of past sessions included in each snapshot's overview.
    pub fn with_recent_sessions(mut self, recent: usize) -> Self {
        self.recent_sessions = recent;
        self.notices.clear();
        self.refresh_overview();
        self.note_missing_picture();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Publish an initial snapshot, then handle commands until the channel
    /// closes.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<PracticeCommand>,
        events: mpsc::Sender<PracticeEvent>,
    ) {
        self.publish(&events).await;
        while let Some(command) = commands.recv().await {
            self.handle(command, &events).await;
        }
        log::info!("practice: command channel closed, orchestrator shutting down");
    }

    /// Handle one command and publish the resulting snapshot.
    pub async fn handle(&mut self, command: PracticeCommand, events: &mpsc::Sender<PracticeEvent>) {
        log::debug!("practice: {command:?} in stage {}", self.session.stage().label());
        self.notices.clear();

        match command {
            PracticeCommand::StartRecording => self.start_recording(),
            PracticeCommand::StopRecording => {
                let audio = self.stop_recording();
                match self.session.stage() {
                    Stage::Description => self.describe(audio, events).await,
                    Stage::StoryGenerated => self.attempt(audio, events).await,
                }
            }
            PracticeCommand::Advance => self.advance(),
            PracticeCommand::Listen => self.listen(events).await,
            PracticeCommand::Reset => self.reset(),
            PracticeCommand::Cancel => {
                self.stop_recording();
            }
        }

        self.publish(events).await;
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    fn start_recording(&mut self) {
        if let Ok(mut buf) = self.audio_buf.lock() {
            buf.0.clear();
            buf.1 = true;
        }
    }

    fn stop_recording(&mut self) -> Vec<f32> {
        match self.audio_buf.lock() {
            Ok(mut buf) => {
                buf.1 = false;
                std::mem::take(&mut buf.0)
            }
            Err(e) => {
                log::error!("practice: audio buffer lock poisoned: {e}");
                Vec::new()
            }
        }
    }

    fn is_recording(&self) -> bool {
        self.audio_buf.lock().map(|buf| buf.1).unwrap_or(false)
    }

    /// Run the speech model on the blocking pool.  `None` means the failure
    /// has already been reported as a notice.
    async fn transcribe(
        &mut self,
        audio: Vec<f32>,
        events: &mpsc::Sender<PracticeEvent>,
    ) -> Option<String> {
        let _ = events.send(PracticeEvent::Busy(Activity::Transcribing)).await;

        let stt = Arc::clone(&self.stt);
        match tokio::task::spawn_blocking(move || stt.transcribe(&audio)).await {
            Ok(Ok(text)) => {
                log::debug!("practice: transcript = {text:?}");
                Some(text.trim().to_string())
            }
            Ok(Err(e)) => {
                log::warn!("practice: transcription failed: {e}");
                self.notices.push(Notice::error(e.to_string()));
                None
            }
            Err(e) => {
                log::error!("practice: transcription task failed: {e}");
                self.notices.push(Notice::error(format!("Internal error: {e}")));
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Description stage
    // -----------------------------------------------------------------------

    async fn describe(&mut self, audio: Vec<f32>, events: &mpsc::Sender<PracticeEvent>) {
        if self.session.picture().is_none() {
            self.note_missing_picture();
            return;
        }

        let Some(transcript) = self.transcribe(audio, events).await else {
            return;
        };
        if transcript.is_empty() {
            self.notices
                .push(Notice::warning("I didn't hear anything. Let's try again!"));
            return;
        }

        let _ = events.send(PracticeEvent::Busy(Activity::CheckingSpeech)).await;
        let errors = match self.detector.detect(&transcript).await {
            Ok(errors) => {
                if errors.is_empty() {
                    self.notices.push(Notice::info("Perfect! Great speaking!"));
                }
                errors
            }
            Err(e) => {
                log::warn!("practice: error detection failed: {e}");
                self.notices
                    .push(Notice::warning(format!("Could not check the description: {e}")));
                Vec::new()
            }
        };

        if let Err(e) = self.session.record_description(transcript.clone(), errors) {
            log::warn!("practice: description rejected: {e}");
            return;
        }

        let _ = events.send(PracticeEvent::Busy(Activity::WritingStory)).await;
        let story = match self
            .writer
            .write(self.session.subject(), self.session.errors(), &transcript)
            .await
        {
            Ok(story) => story,
            Err(e) => {
                log::warn!("practice: story generation failed: {e}");
                self.notices
                    .push(Notice::warning(format!("Could not create a story: {e}")));
                String::new()
            }
        };

        match self.session.begin_practice(&story) {
            Ok(()) => log::debug!(
                "practice: story ready, {} section(s)",
                self.session.sections().len()
            ),
            Err(SessionError::EmptyStory) => {
                self.notices
                    .push(Notice::warning("The story came out empty. Let's try again!"));
            }
            Err(e) => log::warn!("practice: story rejected: {e}"),
        }
    }

    // -----------------------------------------------------------------------
    // Practice stage
    // -----------------------------------------------------------------------

    async fn attempt(&mut self, audio: Vec<f32>, events: &mpsc::Sender<PracticeEvent>) {
        let Some(reference) = self.session.current_text().map(str::to_string) else {
            self.notices
                .push(Notice::info("The story is finished. Start a new session!"));
            return;
        };

        let Some(transcript) = self.transcribe(audio, events).await else {
            return;
        };

        let accuracy = similarity(&reference, &transcript);
        let section = self.session.cursor();
        if let Err(e) =
            self.session
                .record_attempt(transcript.clone(), accuracy, Local::now().naive_local())
        {
            log::warn!("practice: attempt rejected: {e}");
            return;
        }

        let feedback = Feedback::classify(accuracy, &self.gates);
        log::debug!("practice: section {section} scored {accuracy:.1} ({feedback:?})");
        self.last_reading = Some(Reading {
            section,
            transcript,
            accuracy,
            feedback,
        });
    }

    fn advance(&mut self) {
        if let Err(e) = self.session.advance() {
            log::warn!("practice: advance rejected: {e}");
            self.notices.push(Notice::warning(e.to_string()));
            return;
        }
        self.last_reading = None;

        if self.session.is_complete() {
            self.persist();
        }
    }

    fn persist(&mut self) {
        let Some(entry) = self.session.progress_entry() else {
            return;
        };
        match self.store.append(entry) {
            Ok(()) => self.refresh_overview(),
            Err(e) => {
                log::error!("practice: saving progress failed: {e}");
                self.notices
                    .push(Notice::error(format!("Error saving progress: {e}")));
            }
        }
    }

    async fn listen(&mut self, events: &mpsc::Sender<PracticeEvent>) {
        let Some(text) = self.session.current_text().map(str::to_string) else {
            self.notices.push(Notice::info("There is no line to read yet."));
            return;
        };
        let section = self.session.cursor();

        let _ = events.send(PracticeEvent::Busy(Activity::Speaking)).await;
        match self.tts.synthesize(&text).await {
            Ok(audio) => {
                let _ = events.send(PracticeEvent::Speech { section, audio }).await;
            }
            Err(e) => {
                log::warn!("practice: speech synthesis failed: {e}");
                self.notices
                    .push(Notice::warning(format!("Error in text-to-speech: {e}")));
            }
        }
    }

    fn reset(&mut self) {
        self.stop_recording();
        self.session.reset(self.library.choose());
        self.last_reading = None;
        self.note_missing_picture();
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn note_missing_picture(&mut self) {
        if self.session.picture().is_none() {
            self.notices.push(Notice::warning(format!(
                "Please add pictures (dog.jpg, cat.jpg, car.jpg, ...) to {}",
                self.library.dir().display()
            )));
        }
    }

    fn refresh_overview(&mut self) {
        match self.store.load() {
            Ok(log) => self.overview = log.overview(self.recent_sessions),
            Err(e) => {
                log::error!("practice: loading progress failed: {e}");
                self.notices
                    .push(Notice::error(format!("Error loading progress: {e}")));
            }
        }
    }

    async fn publish(&self, events: &mpsc::Sender<PracticeEvent>) {
        let view = SessionView {
            session: self.session.clone(),
            recording: self.is_recording(),
            last_reading: self.last_reading.clone(),
            overview: self.overview.clone(),
            notices: self.notices.clone(),
        };
        let _ = events.send(PracticeEvent::Snapshot(Box::new(view))).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{DisabledModel, LlmError};
    use crate::stt::{MockSttEngine, SttError};
    use crate::tts::TtsError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Answers prompts with scripted replies and keeps every prompt.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }
    }

    /// Returns fixed bytes and remembers what it was asked to say.
    #[derive(Default)]
    struct RecordingTts {
        said: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechSynth for RecordingTts {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError> {
            self.said.lock().unwrap().push(text.to_string());
            Ok(b"mp3".to_vec())
        }
    }

    struct Harness {
        orc: PracticeOrchestrator,
        buf: SharedAudioBuffer,
        tx: mpsc::Sender<PracticeEvent>,
        rx: mpsc::Receiver<PracticeEvent>,
        dir: TempDir,
    }

    impl Harness {
        fn new(stt: MockSttEngine, model: Arc<dyn LanguageModel>, tts: Arc<dyn SpeechSynth>) -> Self {
            let dir = TempDir::new().unwrap();
            let pictures = dir.path().join("pictures");
            std::fs::create_dir(&pictures).unwrap();
            std::fs::write(pictures.join("dog.jpg"), b"img").unwrap();

            let buf = new_audio_buffer();
            let orc = PracticeOrchestrator::new(
                Collaborators {
                    stt: Arc::new(stt),
                    model,
                    tts,
                },
                ProgressStore::new(dir.path().join("progress_data.json")),
                PictureLibrary::new(pictures),
                PracticeConfig::default(),
                Arc::clone(&buf),
            );
            let (tx, rx) = mpsc::channel(256);
            Self { orc, buf, tx, rx, dir }
        }

        async fn send(&mut self, command: PracticeCommand) {
            self.orc.handle(command, &self.tx).await;
        }

        /// Record one second of audio and stop.
        async fn speak(&mut self) {
            self.send(PracticeCommand::StartRecording).await;
            self.buf.lock().unwrap().0.extend(vec![0.0f32; 16_000]);
            self.send(PracticeCommand::StopRecording).await;
        }

        fn drain(&mut self) -> Vec<PracticeEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.rx.try_recv() {
                events.push(event);
            }
            events
        }

        fn last_view(&mut self) -> SessionView {
            self.drain()
                .into_iter()
                .rev()
                .find_map(|e| match e {
                    PracticeEvent::Snapshot(view) => Some(*view),
                    _ => None,
                })
                .expect("no snapshot published")
        }

        fn saved_sessions(&self) -> usize {
            ProgressStore::new(self.dir.path().join("progress_data.json"))
                .load()
                .unwrap()
                .sessions
                .len()
        }
    }

    const ERRORS_JSON: &str = r#"[{"type": "grammar", "incorrect": "dog run", "correction": "dog runs", "explanation": "Use runs for one dog."}]"#;

    // -----------------------------------------------------------------------
    // Description stage
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn description_produces_errors_and_story() {
        let model = ScriptedModel::new(vec![ERRORS_JSON, "The dog runs. | It is happy."]);
        let mut h = Harness::new(
            MockSttEngine::ok("the dog run"),
            model.clone(),
            Arc::new(RecordingTts::default()),
        );

        h.speak().await;

        let events = h.drain();
        let busy: Vec<Activity> = events
            .iter()
            .filter_map(|e| match e {
                PracticeEvent::Busy(a) => Some(*a),
                _ => None,
            })
            .collect();
        assert_eq!(
            busy,
            vec![Activity::Transcribing, Activity::CheckingSpeech, Activity::WritingStory]
        );

        let session = h.orc.session();
        assert_eq!(session.stage(), Stage::StoryGenerated);
        assert_eq!(session.transcript(), "the dog run");
        assert_eq!(session.errors().len(), 1);
        assert_eq!(session.sections(), &["The dog runs.", "It is happy."]);
        assert!(model.prompts()[1].contains("about: dog"));
    }

    #[tokio::test]
    async fn malformed_error_response_still_produces_story() {
        let model = ScriptedModel::new(vec!["this is not json", "A dog. | It runs."]);
        let mut h = Harness::new(
            MockSttEngine::ok("the dog run"),
            model.clone(),
            Arc::new(RecordingTts::default()),
        );

        h.speak().await;

        let view = h.last_view();
        assert_eq!(view.session.stage(), Stage::StoryGenerated);
        assert!(view.session.errors().is_empty());
        assert_eq!(view.session.sections().len(), 2);
        assert!(view.notices.iter().any(|n| n.level == NoticeLevel::Warning));
        assert!(model.prompts()[1].contains("No specific errors were detected"));
    }

    #[tokio::test]
    async fn empty_story_stays_in_description() {
        let model = ScriptedModel::new(vec!["[]", "  |  "]);
        let mut h = Harness::new(
            MockSttEngine::ok("a dog"),
            model,
            Arc::new(RecordingTts::default()),
        );

        h.speak().await;

        let view = h.last_view();
        assert_eq!(view.session.stage(), Stage::Description);
        assert!(view
            .notices
            .iter()
            .any(|n| n.message.contains("Let's try again")));
    }

    #[tokio::test]
    async fn disabled_model_degrades_without_leaving_description() {
        let mut h = Harness::new(
            MockSttEngine::ok("a dog"),
            Arc::new(DisabledModel),
            Arc::new(RecordingTts::default()),
        );

        h.speak().await;

        let view = h.last_view();
        assert_eq!(view.session.stage(), Stage::Description);
        assert_eq!(view.session.transcript(), "a dog");
        assert!(view.notices.len() >= 2);
    }

    #[tokio::test]
    async fn empty_transcript_skips_the_model() {
        let model = ScriptedModel::new(vec![ERRORS_JSON, "A. | B."]);
        let mut h = Harness::new(
            MockSttEngine::ok("   "),
            model.clone(),
            Arc::new(RecordingTts::default()),
        );

        h.speak().await;

        assert_eq!(h.orc.session().stage(), Stage::Description);
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn short_recording_is_reported() {
        let model = ScriptedModel::new(vec![]);
        let mut h = Harness::new(
            MockSttEngine::ok("a dog"),
            model.clone(),
            Arc::new(RecordingTts::default()),
        );

        h.send(PracticeCommand::StartRecording).await;
        h.buf.lock().unwrap().0.extend(vec![0.0f32; 100]);
        h.send(PracticeCommand::StopRecording).await;

        let view = h.last_view();
        assert_eq!(view.notices[0].level, NoticeLevel::Error);
        assert!(model.prompts().is_empty());
    }

    // -----------------------------------------------------------------------
    // Practice stage
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn attempt_is_scored_and_recorded() {
        let stt = MockSttEngine::script(vec![
            Ok("the dog run".into()),
            Ok("The dog runs.".into()),
            Ok("xyz".into()),
        ]);
        let model = ScriptedModel::new(vec!["[]", "The dog runs. | It is happy."]);
        let mut h = Harness::new(stt, model, Arc::new(RecordingTts::default()));

        h.speak().await;
        h.speak().await;

        let view = h.last_view();
        let reading = view.last_reading.unwrap();
        assert_eq!(reading.section, 0);
        assert_eq!(reading.accuracy, 100.0);
        assert_eq!(reading.feedback, Feedback::Excellent);
        assert_eq!(view.session.attempts(0).len(), 1);
        assert_eq!(view.session.cursor(), 0);

        h.speak().await;
        let view = h.last_view();
        assert_eq!(view.last_reading.unwrap().feedback, Feedback::KeepPracticing);
        assert_eq!(view.session.attempts(0).len(), 2);
    }

    #[tokio::test]
    async fn completion_persists_exactly_once() {
        let stt = MockSttEngine::script(vec![Ok("a dog".into()), Ok("The dog runs.".into())]);
        let model = ScriptedModel::new(vec!["[]", "The dog runs."]);
        let mut h = Harness::new(stt, model, Arc::new(RecordingTts::default()));

        h.speak().await;
        h.speak().await;
        assert_eq!(h.saved_sessions(), 0);

        h.send(PracticeCommand::Advance).await;
        let view = h.last_view();
        assert!(view.session.is_complete());
        assert_eq!(view.overview.total_sessions, 1);
        assert_eq!(h.saved_sessions(), 1);

        h.send(PracticeCommand::Advance).await;
        let view = h.last_view();
        assert_eq!(view.notices[0].level, NoticeLevel::Warning);
        assert_eq!(h.saved_sessions(), 1);
    }

    #[tokio::test]
    async fn listen_speaks_the_current_section() {
        let tts = Arc::new(RecordingTts::default());
        let model = ScriptedModel::new(vec!["[]", "The dog runs. | It is happy."]);
        let mut h = Harness::new(MockSttEngine::ok("a dog"), model, tts.clone());

        h.send(PracticeCommand::Listen).await;
        assert!(tts.said.lock().unwrap().is_empty());

        h.speak().await;
        h.drain();
        h.send(PracticeCommand::Listen).await;

        let speech = h.drain().into_iter().find_map(|e| match e {
            PracticeEvent::Speech { section, audio } => Some((section, audio)),
            _ => None,
        });
        assert_eq!(speech, Some((0, b"mp3".to_vec())));
        assert_eq!(tts.said.lock().unwrap().as_slice(), &["The dog runs."]);
    }

    #[tokio::test]
    async fn save_failure_is_reported_and_session_continues() {
        let stt = MockSttEngine::script(vec![Ok("a dog".into()), Ok("The dog runs.".into())]);
        let model = ScriptedModel::new(vec!["[]", "The dog runs."]);
        let mut h = Harness::new(stt, model, Arc::new(RecordingTts::default()));
        let progress_file = h.dir.path().join("progress_data.json");
        std::fs::write(&progress_file, "{ not json").unwrap();

        h.speak().await;
        h.speak().await;
        h.send(PracticeCommand::Advance).await;

        let view = h.last_view();
        assert!(view
            .notices
            .iter()
            .any(|n| n.level == NoticeLevel::Error && n.message.contains("Error saving progress")));
        assert!(view.session.is_complete());
        let summary = view.session.summary().unwrap();
        assert_eq!(summary.total_attempts, 1);
        assert_eq!(summary.average_accuracy, 100.0);
        assert_eq!(std::fs::read_to_string(&progress_file).unwrap(), "{ not json");

        h.send(PracticeCommand::Reset).await;
        let view = h.last_view();
        assert_eq!(view.session.stage(), Stage::Description);
        assert!(!view.session.is_complete());
        assert!(view.notices.is_empty());
    }

    // -----------------------------------------------------------------------
    // Reset / cancel / run loop
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reset_starts_a_fresh_session() {
        let stt = MockSttEngine::script(vec![Ok("a dog".into()), Ok("The dog runs.".into())]);
        let model = ScriptedModel::new(vec![ERRORS_JSON, "The dog runs."]);
        let mut h = Harness::new(stt, model, Arc::new(RecordingTts::default()));

        h.speak().await;
        h.speak().await;
        h.send(PracticeCommand::Advance).await;
        h.send(PracticeCommand::Reset).await;

        let view = h.last_view();
        assert_eq!(view.session.stage(), Stage::Description);
        assert_eq!(view.session.subject(), "dog");
        assert!(view.session.transcript().is_empty());
        assert!(view.session.errors().is_empty());
        assert!(view.session.sections().is_empty());
        assert!(view.last_reading.is_none());
    }

    #[tokio::test]
    async fn cancel_discards_the_recording() {
        let mut h = Harness::new(
            MockSttEngine::ok("a dog"),
            ScriptedModel::new(vec![]),
            Arc::new(RecordingTts::default()),
        );

        h.send(PracticeCommand::StartRecording).await;
        assert!(h.last_view().recording);
        h.buf.lock().unwrap().0.extend(vec![0.5f32; 16_000]);
        h.send(PracticeCommand::Cancel).await;

        let view = h.last_view();
        assert!(!view.recording);
        assert!(h.buf.lock().unwrap().0.is_empty());
        assert_eq!(view.session.stage(), Stage::Description);
    }

    #[tokio::test]
    async fn missing_pictures_block_the_description() {
        let dir = TempDir::new().unwrap();
        let buf = new_audio_buffer();
        let model = ScriptedModel::new(vec![]);
        let mut orc = PracticeOrchestrator::new(
            Collaborators {
                stt: Arc::new(MockSttEngine::ok("a dog")),
                model: model.clone(),
                tts: Arc::new(RecordingTts::default()),
            },
            ProgressStore::new(dir.path().join("progress_data.json")),
            PictureLibrary::new(dir.path().join("no-pictures")),
            PracticeConfig::default(),
            Arc::clone(&buf),
        );
        let (tx, _rx) = mpsc::channel(64);

        orc.handle(PracticeCommand::StartRecording, &tx).await;
        buf.lock().unwrap().0.extend(vec![0.0f32; 16_000]);
        orc.handle(PracticeCommand::StopRecording, &tx).await;

        assert_eq!(orc.session().stage(), Stage::Description);
        assert!(orc.session().transcript().is_empty());
        assert!(model.prompts().is_empty());
    }

    #[test]
    fn unreadable_progress_is_reported_once() {
        let dir = TempDir::new().unwrap();
        let progress_file = dir.path().join("progress_data.json");
        std::fs::write(&progress_file, "{ not json").unwrap();

        let orc = PracticeOrchestrator::new(
            Collaborators {
                stt: Arc::new(MockSttEngine::ok("a dog")),
                model: ScriptedModel::new(vec![]),
                tts: Arc::new(RecordingTts::default()),
            },
            ProgressStore::new(&progress_file),
            PictureLibrary::new(dir.path().join("no-pictures")),
            PracticeConfig::default(),
            new_audio_buffer(),
        )
        .with_recent_sessions(3);

        let loading: Vec<&Notice> = orc
            .notices
            .iter()
            .filter(|n| n.message.contains("Error loading progress"))
            .collect();
        assert_eq!(loading.len(), 1);
        assert_eq!(orc.notices.len(), 2);
    }

    #[tokio::test]
    async fn run_publishes_a_snapshot_per_command() {
        let h = Harness::new(
            MockSttEngine::ok("a dog"),
            ScriptedModel::new(vec![]),
            Arc::new(RecordingTts::default()),
        );
        let Harness { orc, tx, mut rx, dir: _dir, .. } = h;

        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        cmd_tx.send(PracticeCommand::Reset).await.unwrap();
        cmd_tx.send(PracticeCommand::Cancel).await.unwrap();
        drop(cmd_tx);

        orc.run(cmd_rx, tx).await;

        let mut snapshots = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PracticeEvent::Snapshot(_)) {
                snapshots += 1;
            }
        }
        assert_eq!(snapshots, 3);
    }

    #[tokio::test]
    async fn transcription_failure_is_reported() {
        let model = ScriptedModel::new(vec![]);
        let mut h = Harness::new(
            MockSttEngine::err(SttError::Transcription("decoder failed".into())),
            model.clone(),
            Arc::new(RecordingTts::default()),
        );

        h.speak().await;

        let view = h.last_view();
        assert_eq!(view.notices.len(), 1);
        assert_eq!(view.notices[0].level, NoticeLevel::Error);
        assert!(view.notices[0].message.contains("decoder failed"));
        assert_eq!(view.session.stage(), Stage::Description);
        assert!(model.prompts().is_empty());
    }
}
