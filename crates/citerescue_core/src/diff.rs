use similar::TextDiff;

/// Unified diff between the original and rewritten document; empty when equal.
pub fn unified_diff(label: &str, before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(2)
        .header(&format!("a/{label}"), &format!("b/{label}"))
        .to_string()
}
