//! Microphone capture via `cpal`.
//!
//! [`Microphone`] opens the default input device once at startup.
//! [`Microphone::record_into`] starts a stream whose callback converts each
//! hardware buffer to 16 kHz mono and appends it to the shared recording
//! buffer while its "recording" flag is set.  The returned [`StreamHandle`]
//! keeps the stream alive; dropping it stops capture.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::audio::resample::to_model_input;
use crate::session::SharedAudioBuffer;
use crate::stt::MAX_AUDIO_SAMPLES;

/// Keeps the cpal stream alive.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no microphone found on the default audio host")]
    NoDevice,

    #[error("failed to query the microphone format: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start input stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Native format of the input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

pub struct Microphone {
    device: cpal::Device,
    config: cpal::StreamConfig,
    format: InputFormat,
}

impl Microphone {
    /// Open the system default input device in its preferred format.
    pub fn open() -> Result<Self, CaptureError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;
        let supported = device.default_input_config()?;

        let format = InputFormat {
            sample_rate: supported.sample_rate().0,
            channels: supported.channels(),
        };
        Ok(Self {
            device,
            config: supported.into(),
            format,
        })
    }

    pub fn format(&self) -> InputFormat {
        self.format
    }

    /// Start streaming into `buffer`.
    ///
    /// Samples are only kept while `buffer.1` is `true`.  Once a recording
    /// passes the speech model's maximum length further samples are dropped;
    /// the transcriber then reports the clip as too long.
    pub fn record_into(&self, buffer: SharedAudioBuffer) -> Result<StreamHandle, CaptureError> {
        let format = self.format;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let Ok(mut buf) = buffer.lock() else {
                    return;
                };
                if !buf.1 || buf.0.len() > MAX_AUDIO_SAMPLES {
                    return;
                }
                let converted = to_model_input(data, format.channels, format.sample_rate);
                buf.0.extend_from_slice(&converted);
            },
            |err: cpal::StreamError| log::error!("audio: input stream error: {err}"),
            None,
        )?;

        stream.play()?;
        log::info!(
            "audio: capturing at {} Hz, {} channel(s)",
            format.sample_rate,
            format.channels
        );
        Ok(StreamHandle { _stream: stream })
    }
}
