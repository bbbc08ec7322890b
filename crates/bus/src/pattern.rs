//! Message kind pattern matching.

/// Check a subscription pattern against a message kind.
///
/// Three forms are supported: an exact kind, a trailing-`*` prefix match
/// (`"task:*"` matches `"task:delegate"`), and a bare `"*"` that matches
/// everything.
pub fn pattern_matches(pattern: &str, kind: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return kind.starts_with(prefix);
    }
    pattern == kind
}
