//! Parameters for a single Whisper inference run.

/// Settings that control one transcription.
///
/// ```
/// use storyweaver::stt::TranscribeParams;
///
/// let params = TranscribeParams {
///     language: "auto".into(),
///     ..TranscribeParams::default()
/// };
/// assert_eq!(params.best_of, 1);
/// ```
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// ISO-639-1 language code, or `"auto"` for Whisper's own detection.
    pub language: String,

    /// Greedy decoding candidates per step.  1 is fastest.
    pub best_of: i32,

    /// CPU threads handed to Whisper.
    pub n_threads: i32,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            best_of: 1,
            n_threads: optimal_threads(),
        }
    }
}

/// Available parallelism capped at 8; Whisper gains little beyond that.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}
