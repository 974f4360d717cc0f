//! Speech-to-text for the child's recordings.
//!
//! ```rust,no_run
//! use storyweaver::stt::{SttEngine, TranscribeParams, WhisperEngine};
//!
//! let engine = WhisperEngine::load("models/ggml-base.bin", TranscribeParams::default())
//!     .expect("model not found");
//!
//! // 16 kHz mono f32 PCM from the audio module
//! let audio: Vec<f32> = vec![0.0; 16_000];
//! let text = engine.transcribe(&audio).unwrap();
//! println!("{text}");
//! ```

pub mod engine;
pub mod transcribe;

pub use engine::{
    SttEngine, SttError, UnavailableStt, WhisperEngine, MAX_AUDIO_SAMPLES, MIN_AUDIO_SAMPLES,
};
pub use transcribe::TranscribeParams;

#[cfg(test)]
pub use engine::MockSttEngine;
