//! Compact rendering helpers for progress lines and error messages.
//!
//! Keeps build output bounded and readable while preserving signal.

use crate::core::registry::ArgumentSet;

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Render a completed argument set as `name=value, ...` with bounded width.
pub fn render_args(args: &ArgumentSet, max_chars: usize) -> String {
    let rendered = args
        .iter()
        .map(|(name, value)| format!("{}={}", name, value.preview()))
        .collect::<Vec<_>>()
        .join(", ");
    compact_line(&rendered, max_chars)
}
