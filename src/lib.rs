//! StoryWeaver: picture-description and story-reading practice for young
//! children.
//!
//! The child describes a picture, the description is checked for grammar,
//! vocabulary and articulation errors, and a short story drilling the
//! corrections is read back one section at a time.

pub mod app;
pub mod audio;
pub mod config;
pub mod llm;
pub mod progress;
pub mod scoring;
pub mod session;
pub mod stt;
pub mod tts;
