//! Conversion from the microphone's native format to speech-model input.
//!
//! Whisper expects **16 kHz mono `f32`**.  Microphones usually deliver
//! 44.1 or 48 kHz, often stereo, so every captured buffer goes through
//! [`to_model_input`]: [`downmix`] first, then [`resample`] with linear
//! interpolation.

/// Sample rate the speech model is trained on.
pub const MODEL_SAMPLE_RATE: u32 = 16_000;

/// Average interleaved frames down to one channel.
///
/// A trailing partial frame is dropped.  Zero channels yields nothing.
///
/// ```rust
/// use storyweaver::audio::downmix;
///
/// let stereo = [0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = usize::from(n);
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Linear-interpolation resampler from `from_rate` to `to_rate` Hz.
///
/// Output length is `ceil(len * to_rate / from_rate)`.
///
/// ```rust
/// use storyweaver::audio::resample;
///
/// assert_eq!(resample(&[0.25_f32; 480], 48_000, 16_000).len(), 160);
/// assert_eq!(resample(&[0.25_f32; 80], 8_000, 16_000).len(), 160);
/// ```
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let step = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (samples.len() as f64 / step).ceil() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}

/// Downmix and resample one captured buffer for the speech model.
pub fn to_model_input(samples: &[f32], channels: u16, sample_rate: u32) -> Vec<f32> {
    let mono = downmix(samples, channels);
    resample(&mono, sample_rate, MODEL_SAMPLE_RATE)
}
