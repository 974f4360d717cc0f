//! Speech-to-text engine trait and implementations.
//!
//! [`SttEngine`] is the interface the practice orchestrator depends on.  It
//! is object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn SttEngine>` and moved onto the blocking thread pool.
//!
//! * [`WhisperEngine`] wraps a `whisper_rs::WhisperContext`, loaded once at
//!   startup.
//! * [`UnavailableStt`] stands in when the model file is missing so the app
//!   still opens; every call reports the missing path.
//! * `MockSttEngine` (tests only) returns a scripted transcript.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::stt::transcribe::TranscribeParams;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The GGML model file was not found at the given path.
    #[error("speech model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a context or state.
    #[error("speech model failed to initialise: {0}")]
    ContextInit(String),

    /// The inference pass failed.
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Fewer than [`MIN_AUDIO_SAMPLES`] samples were recorded.
    #[error("recording too short, hold the button a little longer")]
    AudioTooShort,

    /// More than [`MAX_AUDIO_SAMPLES`] samples were recorded.
    #[error("recording too long, keep it under a minute")]
    AudioTooLong,
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Converts one recording into text.
///
/// `audio` must be **16 kHz, mono, f32** PCM.  Implementations reject clips
/// shorter than [`MIN_AUDIO_SAMPLES`] or longer than [`MAX_AUDIO_SAMPLES`].
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError>;
}

/// 0.5 s at 16 kHz.
pub const MIN_AUDIO_SAMPLES: usize = 8_000;
/// 60 s at 16 kHz.
pub const MAX_AUDIO_SAMPLES: usize = 960_000;

fn check_length(audio: &[f32]) -> Result<(), SttError> {
    if audio.len() < MIN_AUDIO_SAMPLES {
        return Err(SttError::AudioTooShort);
    }
    if audio.len() > MAX_AUDIO_SAMPLES {
        return Err(SttError::AudioTooLong);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Whisper-backed engine.  A fresh `WhisperState` is created per call, so the
/// loaded context can be shared without locking.
pub struct WhisperEngine {
    ctx: WhisperContext,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: whisper-rs declares WhisperContext Send + Sync; the weights are
// read-only after loading and TranscribeParams is plain owned data.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model from `model_path`.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`]: `model_path` does not exist.
    /// - [`SttError::ContextInit`] : whisper-rs failed to load the file.
    pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!("non-UTF-8 model path: {}", path.display()))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        Ok(Self { ctx, params })
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        check_length(audio)?;

        let mut fp = FullParams::new(SamplingStrategy::Greedy {
            best_of: self.params.best_of,
        });
        let lang = (self.params.language != "auto").then_some(self.params.language.as_str());
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let started = std::time::Instant::now();
        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        log::debug!(
            "stt: {} samples transcribed in {} ms",
            audio.len(),
            started.elapsed().as_millis()
        );
        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// UnavailableStt
// ---------------------------------------------------------------------------

/// Fallback engine used when the Whisper model could not be loaded.
pub struct UnavailableStt {
    reason: SttError,
}

impl UnavailableStt {
    pub fn new(reason: SttError) -> Self {
        Self { reason }
    }
}

impl SttEngine for UnavailableStt {
    fn transcribe(&self, _audio: &[f32]) -> Result<String, SttError> {
        Err(self.reason.clone())
    }
}

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// Returns scripted transcripts in order; the last one repeats.
#[cfg(test)]
pub struct MockSttEngine {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, SttError>>>,
}

#[cfg(test)]
impl MockSttEngine {
    /// Always returns `Ok(text)`.
    pub fn ok(text: impl Into<String>) -> Self {
        Self::script(vec![Ok(text.into())])
    }

    /// Always returns `Err(error)`.
    pub fn err(error: SttError) -> Self {
        Self::script(vec![Err(error)])
    }

    /// Returns each response once, then keeps repeating the last.
    pub fn script(responses: Vec<Result<String, SttError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
        }
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        check_length(audio)?;
        let mut queue = self.responses.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
