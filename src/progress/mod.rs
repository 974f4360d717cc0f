//! Persistent record of completed practice sessions.

pub mod entry;
pub mod store;

pub use entry::{Attempt, ProgressEntry, ProgressLog, ProgressOverview, SectionAttempts};
pub use store::{ProgressStore, StoreError};
