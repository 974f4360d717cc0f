//! Read-aloud accuracy scoring.
//!
//! [`similarity`] compares the reference line with what the child said and
//! returns a percentage in `[0, 100]`:
//!
//! ```text
//! score = 2 · LCS(a, b) / (|a| + |b|) · 100
//! ```
//!
//! where `LCS` is the length of the longest common subsequence of the two
//! lower-cased, trimmed strings (counted in Unicode scalar values).  Unlike a
//! greedy block matcher this ratio is symmetric.
//!
//! [`Feedback`] turns a score into the retry/advance choices shown to the
//! child, gated by the thresholds in [`PracticeConfig`].

use serde::{Deserialize, Serialize};

use crate::config::PracticeConfig;

// ---------------------------------------------------------------------------
// similarity
// ---------------------------------------------------------------------------

/// Similarity between `reference` and `spoken`, as a percentage.
///
/// ```
/// use storyweaver::scoring::similarity;
///
/// assert_eq!(similarity("The dog runs fast", "the dog runs fast "), 100.0);
/// assert_eq!(similarity("The dog runs fast", ""), 0.0);
///
/// let near = similarity("The dog runs fast", "The dog run fast");
/// assert!(near > 80.0 && near < 100.0);
/// ```
pub fn similarity(reference: &str, spoken: &str) -> f64 {
    let a: Vec<char> = reference.trim().to_lowercase().chars().collect();
    let b: Vec<char> = spoken.trim().to_lowercase().chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }

    let matches = lcs_len(&a, &b);
    (2.0 * matches as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Longest-common-subsequence length, two-row dynamic programme.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    // Iterate over the longer string so the rows stay short.
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if inner.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; inner.len() + 1];
    let mut curr = vec![0usize; inner.len() + 1];

    for &x in outer {
        for (j, &y) in inner.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[inner.len()]
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// How a scored attempt is presented to the child.
///
/// | Variant          | Score band                       | Offers            |
/// |------------------|----------------------------------|-------------------|
/// | `Excellent`      | `>= advance_threshold`           | next line         |
/// | `GoodTry`        | `retry_threshold ..< advance`    | try again, next   |
/// | `KeepPracticing` | `< retry_threshold`              | try again         |
///
/// The bands only steer which buttons the UI shows; the session itself
/// never refuses an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feedback {
    Excellent,
    GoodTry,
    KeepPracticing,
}

impl Feedback {
    /// Classify `score` using the configured thresholds.
    ///
    /// ```
    /// use storyweaver::config::PracticeConfig;
    /// use storyweaver::scoring::Feedback;
    ///
    /// let gates = PracticeConfig::default();
    /// assert_eq!(Feedback::classify(80.0, &gates), Feedback::Excellent);
    /// assert_eq!(Feedback::classify(79.9, &gates), Feedback::GoodTry);
    /// assert_eq!(Feedback::classify(59.9, &gates), Feedback::KeepPracticing);
    /// ```
    pub fn classify(score: f64, gates: &PracticeConfig) -> Self {
        if score >= gates.advance_threshold {
            Feedback::Excellent
        } else if score >= gates.retry_threshold {
            Feedback::GoodTry
        } else {
            Feedback::KeepPracticing
        }
    }

    /// Whether a "next line" action is presented.
    pub fn offers_advance(self) -> bool {
        matches!(self, Feedback::Excellent | Feedback::GoodTry)
    }

    /// Whether a "try again" action is presented.
    pub fn offers_retry(self) -> bool {
        matches!(self, Feedback::GoodTry | Feedback::KeepPracticing)
    }

    /// Child-facing headline for the result.
    pub fn headline(self) -> &'static str {
        match self {
            Feedback::Excellent => "Excellent!",
            Feedback::GoodTry => "Good try! Try again to improve!",
            Feedback::KeepPracticing => "Keep practicing! Listen again and speak slowly and clearly!",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
