//! Clean-up of raw model responses.

/// Remove optional Markdown code-fence wrapping from a model response.
///
/// When the trimmed text starts with a fence, the opening line (which may
/// carry a language tag) and a closing fence line are dropped.  Text without
/// a fence is returned trimmed.
///
/// ```
/// use storyweaver::llm::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n[]\n```"), "[]");
/// assert_eq!(strip_code_fence("  plain text "), "plain text");
/// ```
pub fn strip_code_fence(raw: &str) -> String {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }

    let mut lines: Vec<&str> = text.lines().skip(1).collect();
    if lines.last().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}
