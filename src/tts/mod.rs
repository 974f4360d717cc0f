//! Text-to-speech for the "Listen" button.
//!
//! [`SpeechSynth`] turns a story section into MP3 bytes.  The production
//! backend, [`GoogleTranslateTts`], uses the public Google Translate voice
//! endpoint; playback lives in [`crate::audio::playback`].

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TtsConfig;

/// Maximum characters the Translate voice endpoint accepts per request.
const MAX_CHUNK_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("nothing to say")]
    EmptyText,

    #[error("speech request failed: {0}")]
    Request(String),

    #[error("speech service returned HTTP {0}")]
    Status(u16),
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        TtsError::Request(e.to_string())
    }
}

/// Converts text to encoded audio (MP3).
#[async_trait]
pub trait SpeechSynth: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError>;
}

// ---------------------------------------------------------------------------
// GoogleTranslateTts
// ---------------------------------------------------------------------------

pub struct GoogleTranslateTts {
    client: reqwest::Client,
    config: TtsConfig,
}

impl GoogleTranslateTts {
    pub fn from_config(config: &TtsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        }
    }

    async fn fetch_chunk(&self, chunk: &str) -> Result<Vec<u8>, TtsError> {
        let url = format!("{}/translate_tts", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.config.language.as_str()),
                ("q", chunk),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TtsError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechSynth for GoogleTranslateTts {
    /// MP3 frames from consecutive chunks are simply concatenated; decoders
    /// play the result as one stream.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(TtsError::EmptyText);
        }

        let mut audio = Vec::new();
        for chunk in &chunks {
            audio.extend(self.fetch_chunk(chunk).await?);
        }
        log::debug!("tts: {} chunk(s), {} bytes", chunks.len(), audio.len());
        Ok(audio)
    }
}

/// Split `text` into pieces of at most `max_chars` characters, breaking on
/// whitespace.  A single word longer than the limit is split mid-word.  A
/// limit of zero is treated as one.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let split_at = word
                .char_indices()
                .nth(max_chars)
                .map_or(word.len(), |(i, _)| i);
            chunks.push(word[..split_at].to_string());
            word = &word[split_at..];
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(chunk_text("   \n", 100).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("The dog runs fast.", 100), vec!["The dog runs fast."]);
    }

    #[test]
    fn chunks_break_on_words_and_respect_limit() {
        let chunks = chunk_text("one two three four five", 9);
        assert_eq!(chunks, vec!["one two", "three", "four five"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 9));
    }

    #[test]
    fn overlong_word_is_split() {
        let chunks = chunk_text("hi abcdefghij", 4);
        assert_eq!(chunks, vec!["hi", "abcd", "efgh", "ij"]);
    }

    #[test]
    fn zero_limit_falls_back_to_single_characters() {
        assert_eq!(chunk_text("ab c", 0), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_any_request() {
        let tts = GoogleTranslateTts::from_config(&TtsConfig {
            base_url: "http://127.0.0.1:9".into(),
            language: "en".into(),
        });
        assert!(matches!(tts.synthesize("  ").await, Err(TtsError::EmptyText)));
    }
}
