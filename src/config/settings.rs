//! Application settings structs, defaults, environment overrides and TOML
//! persistence.
//!
//! Settings are resolved in three layers:
//!
//! 1. Built-in defaults ([`AppConfig::default`]).
//! 2. `settings.toml` in the platform config directory, when present.
//! 3. Environment variables ([`AppConfig::apply_env`]).
//!
//! [`AppConfig::validate`] runs last; a validation failure is fatal at
//! startup.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Configuration problems that prevent the application from starting.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The generative-language service is enabled but no key was supplied.
    #[error("GOOGLE_API_KEY is required when ENABLE_GOOGLE_GENAI is true")]
    MissingApiKey,

    /// The accuracy thresholds are out of range or in the wrong order.
    #[error("invalid accuracy thresholds: retry {retry} / advance {advance} (need 0 <= retry <= advance <= 100)")]
    InvalidThresholds { retry: f64, advance: f64 },

    /// An environment variable holds a value that cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

// ---------------------------------------------------------------------------
// LlmProvider
// ---------------------------------------------------------------------------

/// Selects which generative-language backend writes errors and stories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LlmProvider {
    /// Google Gemini `generateContent` REST API.
    Gemini,
    /// Any OpenAI-compatible chat-completions API (OpenAI, Ollama, Groq …).
    OpenAiCompatible,
}

impl Default for LlmProvider {
    fn default() -> Self {
        Self::Gemini
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the generative-language service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether the service is called at all.  When `false`, error detection
    /// and story generation degrade to empty results.
    pub enabled: bool,
    /// Which backend to use.
    pub provider: LlmProvider,
    /// Base URL of the API endpoint.
    ///
    /// - Gemini: `https://generativelanguage.googleapis.com`
    /// - Ollama (OpenAI mode): `http://localhost:11434`
    pub base_url: String,
    /// API key.  Required for Gemini when `enabled`.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::default(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            model: "gemini-2.5-flash".into(),
            temperature: 0.7,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper STT engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// Whisper model size (`"tiny"`, `"base"`, `"small"` …).  Resolved to
    /// `ggml-<model>.bin` inside the models directory.
    pub model: String,
    /// Spoken language as an ISO-639-1 code, or `"auto"`.
    pub language: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "base".into(),
            language: "en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the "Listen" speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Base URL of the Google Translate TTS endpoint.
    pub base_url: String,
    /// Voice language code.
    pub language: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://translate.google.com".into(),
            language: "en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PracticeConfig
// ---------------------------------------------------------------------------

/// Score gates used when presenting "next line" / "try again".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PracticeConfig {
    /// At or above this accuracy the child may move on with one action.
    pub advance_threshold: f64,
    /// At or above this accuracy (and below `advance_threshold`) both retry
    /// and advance are offered.  Below it, only retry.
    pub retry_threshold: f64,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            advance_threshold: 80.0,
            retry_threshold: 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// File locations for pictures and the progress log.
///
/// Relative paths are resolved against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub picture_dir: String,
    pub progress_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            picture_dir: "pictures".into(),
            progress_file: "progress_data.json".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Window appearance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Initial window size `(width, height)` in points.
    pub window_size: (f32, f32),
    /// Number of past sessions listed in the progress panel.
    pub recent_sessions: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (1000.0, 720.0),
            recent_sessions: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use storyweaver::config::AppConfig;
///
/// let mut config = AppConfig::load().unwrap();
/// config.apply_env(|key| std::env::var(key).ok()).unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub practice: PracticeConfig,
    pub storage: StorageConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Write the configuration as TOML, creating parent directories as
    /// needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override fields from environment-style variables.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(flag) = lookup("ENABLE_GOOGLE_GENAI") {
            self.llm.enabled = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(model) = lookup("GENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = lookup("WHISPER_MODEL") {
            self.stt.model = model;
        }
        if let Some(dir) = lookup("PICTURE_FOLDER") {
            self.storage.picture_dir = dir;
        }
        if let Some(file) = lookup("PROGRESS_FILE") {
            self.storage.progress_file = file;
        }
        if let Some(raw) = lookup("ACCURACY_THRESHOLD") {
            self.practice.advance_threshold = parse_threshold("ACCURACY_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("RETRY_THRESHOLD") {
            self.practice.retry_threshold = parse_threshold("RETRY_THRESHOLD", &raw)?;
        }
        Ok(())
    }

    /// Check the invariants the rest of the application relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.enabled
            && self.llm.provider == LlmProvider::Gemini
            && self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(ConfigError::MissingApiKey);
        }

        let PracticeConfig {
            advance_threshold: advance,
            retry_threshold: retry,
        } = self.practice;
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(advance) || !in_range(retry) || retry > advance {
            return Err(ConfigError::InvalidThresholds { retry, advance });
        }
        Ok(())
    }
}

fn parse_threshold(key: &str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert!(cfg.llm.enabled);
        assert_eq!(cfg.llm.provider, LlmProvider::Gemini);
        assert_eq!(cfg.llm.model, "gemini-2.5-flash");
        assert!(cfg.llm.api_key.is_none());
        assert_eq!(cfg.stt.model, "base");
        assert_eq!(cfg.storage.picture_dir, "pictures");
        assert_eq!(cfg.storage.progress_file, "progress_data.json");
        assert_eq!(cfg.practice.advance_threshold, 80.0);
        assert_eq!(cfg.practice.retry_threshold, 60.0);
        assert_eq!(cfg.ui.recent_sessions, 5);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.llm.model, AppConfig::default().llm.model);
        assert_eq!(config.practice, PracticeConfig::default());
    }

    #[test]
    fn modified_values_survive_save_and_load() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.llm.provider = LlmProvider::OpenAiCompatible;
        cfg.llm.base_url = "http://localhost:11434".into();
        cfg.llm.api_key = Some("sk-test".into());
        cfg.stt.model = "small".into();
        cfg.practice.advance_threshold = 85.0;
        cfg.storage.picture_dir = "/srv/pictures".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.llm.provider, LlmProvider::OpenAiCompatible);
        assert_eq!(loaded.llm.base_url, "http://localhost:11434");
        assert_eq!(loaded.llm.api_key, Some("sk-test".into()));
        assert_eq!(loaded.stt.model, "small");
        assert_eq!(loaded.practice.advance_threshold, 85.0);
        assert_eq!(loaded.storage.picture_dir, "/srv/pictures");
    }

    #[test]
    fn env_overrides_fields() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[
            ("GOOGLE_API_KEY", "abc"),
            ("WHISPER_MODEL", "tiny"),
            ("PICTURE_FOLDER", "pics"),
            ("PROGRESS_FILE", "log.json"),
            ("ACCURACY_THRESHOLD", "75"),
            ("RETRY_THRESHOLD", "50"),
        ]))
        .unwrap();

        assert_eq!(cfg.llm.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.stt.model, "tiny");
        assert_eq!(cfg.storage.picture_dir, "pics");
        assert_eq!(cfg.storage.progress_file, "log.json");
        assert_eq!(cfg.practice.advance_threshold, 75.0);
        assert_eq!(cfg.practice.retry_threshold, 50.0);
    }

    #[test]
    fn enable_flag_accepts_truthy_spellings() {
        for (raw, expected) in [("1", true), ("TRUE", true), ("yes", true), ("false", false), ("0", false)] {
            let mut cfg = AppConfig::default();
            cfg.apply_env(env(&[("ENABLE_GOOGLE_GENAI", raw)])).unwrap();
            assert_eq!(cfg.llm.enabled, expected, "flag {raw:?}");
        }
    }

    #[test]
    fn unparsable_threshold_is_rejected() {
        let mut cfg = AppConfig::default();
        let err = cfg
            .apply_env(env(&[("ACCURACY_THRESHOLD", "eighty")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "ACCURACY_THRESHOLD".into(),
                value: "eighty".into()
            }
        );
    }

    #[test]
    fn enabled_service_without_key_is_fatal() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.validate(), Err(ConfigError::MissingApiKey));

        let mut blank = AppConfig::default();
        blank.llm.api_key = Some("   ".into());
        assert_eq!(blank.validate(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn disabled_service_needs_no_key() {
        let mut cfg = AppConfig::default();
        cfg.llm.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn openai_compatible_provider_needs_no_key() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = LlmProvider::OpenAiCompatible;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key = Some("k".into());
        cfg.practice.retry_threshold = 90.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidThresholds { .. })
        ));

        cfg.practice.retry_threshold = 60.0;
        cfg.practice.advance_threshold = 120.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidThresholds { .. })
        ));
    }
}
