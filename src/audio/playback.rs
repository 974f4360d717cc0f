//! MP3 playback for the "Listen" button, via `rodio`.
//!
//! `rodio::OutputStream` is not `Send`, so it lives on a dedicated
//! `audio-playback` thread.  [`Player`] is a cheap handle that ships encoded
//! clips to that thread; a new clip interrupts the one playing.

use std::io::Cursor;
use std::sync::mpsc;

use rodio::{Decoder, OutputStream, Sink};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device: {0}")]
    NoOutput(String),

    #[error("could not decode speech audio: {0}")]
    Decode(String),

    #[error("playback thread has stopped")]
    Closed,
}

/// Handle to the playback thread.
#[derive(Debug, Clone)]
pub struct Player {
    tx: mpsc::Sender<Vec<u8>>,
}

impl Player {
    /// Open the default output device on a new thread.
    pub fn spawn() -> Result<Self, PlaybackError> {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), PlaybackError>>();

        std::thread::Builder::new()
            .name("audio-playback".into())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(PlaybackError::NoOutput(e.to_string())));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let mut current: Option<Sink> = None;
                while let Ok(clip) = rx.recv() {
                    if let Some(sink) = current.take() {
                        sink.stop();
                    }
                    let source = match decode(clip) {
                        Ok(source) => source,
                        Err(e) => {
                            log::warn!("audio: {e}");
                            continue;
                        }
                    };
                    match Sink::try_new(&handle) {
                        Ok(sink) => {
                            sink.append(source);
                            current = Some(sink);
                        }
                        Err(e) => log::warn!("audio: cannot open playback sink: {e}"),
                    }
                }
                log::debug!("audio: playback thread exiting");
            })
            .map_err(|e| PlaybackError::NoOutput(e.to_string()))?;

        ready_rx.recv().map_err(|_| PlaybackError::Closed)??;
        Ok(Self { tx })
    }

    /// Queue `mp3` for playback, stopping whatever is playing.
    pub fn play(&self, mp3: Vec<u8>) -> Result<(), PlaybackError> {
        self.tx.send(mp3).map_err(|_| PlaybackError::Closed)
    }
}

fn decode(clip: Vec<u8>) -> Result<Decoder<Cursor<Vec<u8>>>, PlaybackError> {
    Decoder::new(Cursor::new(clip)).map_err(|e| PlaybackError::Decode(e.to_string()))
}
