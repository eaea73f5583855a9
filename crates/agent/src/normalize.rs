//! Search query normalization.
//!
//! Best-effort cleanup applied to `search_code` queries before dispatch:
//! collapse whitespace runs, strip backticks, normalize `\` path separators
//! to `/`, and drop punctuation the GitHub search API chokes on. This
//! improves tool-call success rates; it is not a correctness requirement.

/// The outcome of normalizing a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    pub original: String,
    pub cleaned: String,
    /// Whether the cleaned query differs from the original input.
    pub changed: bool,
}

/// Normalize a `search_code` query.
pub fn normalize_search_query(raw: &str) -> NormalizedQuery {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let cleaned: String = collapsed
        .chars()
        .filter(|c| *c != '`')
        .map(|c| if c == '\\' { '/' } else { c })
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '/' | ' ') {
                c
            } else {
                ' '
            }
        })
        .collect();

    // Punctuation replacement can reintroduce whitespace runs
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    let changed = !cleaned.is_empty() && cleaned != raw;
    let cleaned = if cleaned.is_empty() {
        raw.to_string()
    } else {
        cleaned
    };

    NormalizedQuery {
        original: raw.to_string(),
        cleaned,
        changed,
    }
}
