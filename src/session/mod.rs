//! Practice session: picture choice, the per-session state machine and the
//! orchestrator that drives it.
//!
//! # Architecture
//!
//! ```text
//! UI ── PracticeCommand (mpsc) ──▶ PracticeOrchestrator::run()  ← tokio task
//!                                      │
//!                                      ├─ SttEngine      (spawn_blocking)
//!                                      ├─ ErrorDetector / StoryWriter
//!                                      ├─ SpeechSynth
//!                                      ├─ Session        (pure transitions)
//!                                      └─ ProgressStore  (on completion)
//! UI ◀── PracticeEvent (mpsc) ────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use storyweaver::config::AppConfig;
//! use storyweaver::progress::ProgressStore;
//! use storyweaver::session::{
//!     new_audio_buffer, Collaborators, PictureLibrary, PracticeCommand, PracticeOrchestrator,
//! };
//!
//! # fn collaborators() -> Collaborators { unimplemented!() }
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let orchestrator = PracticeOrchestrator::new(
//!         collaborators(),
//!         ProgressStore::new(&config.storage.progress_file),
//!         PictureLibrary::new(&config.storage.picture_dir),
//!         config.practice,
//!         new_audio_buffer(),
//!     );
//!
//!     let (command_tx, command_rx) = mpsc::channel(16);
//!     let (event_tx, _event_rx) = mpsc::channel(32);
//!     tokio::spawn(orchestrator.run(command_rx, event_tx));
//!     command_tx.send(PracticeCommand::Reset).await.unwrap();
//! }
//! ```

pub mod pictures;
pub mod runner;
pub mod state;

pub use pictures::{Picture, PictureLibrary};
pub use runner::{
    new_audio_buffer, Activity, Collaborators, Notice, NoticeLevel, PracticeCommand, PracticeEvent,
    PracticeOrchestrator, Reading, SessionView, SharedAudioBuffer,
};
pub use state::{SectionStats, Session, SessionError, SessionSummary, Stage};
