//! Audio in and out: microphone capture converted to speech-model input,
//! and MP3 playback for spoken story lines.
//!
//! ```text
//! Microphone → cpal callback → downmix → resample (16 kHz) → SharedAudioBuffer
//! SpeechSynth MP3 bytes → Player (rodio thread) → speakers
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use storyweaver::audio::Microphone;
//! use storyweaver::session::new_audio_buffer;
//!
//! let buffer = new_audio_buffer();
//! let mic = Microphone::open().unwrap();
//! let _handle = mic.record_into(buffer.clone()).unwrap(); // drop to stop
//!
//! buffer.lock().unwrap().1 = true; // start keeping samples
//! ```

pub mod capture;
pub mod playback;
pub mod resample;

pub use capture::{CaptureError, InputFormat, Microphone, StreamHandle};
pub use playback::{PlaybackError, Player};
pub use resample::{downmix, resample, to_model_input, MODEL_SAMPLE_RATE};
