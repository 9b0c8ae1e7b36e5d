use std::fmt;

/// Label used by the standalone download when the user gave no usable name.
pub const FALLBACK_LABEL: &str = "audio_temp";

/// Map an arbitrary label to a filesystem-safe token.
///
/// ASCII letters, digits, `-` and `_` are kept; everything else becomes `_`.
/// Runs of `_` collapse to one and leading/trailing `_` are trimmed, so the
/// result may be empty.
pub fn sanitize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

/// A label that is known to be a valid, non-empty path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SanitizedLabel(String);

impl SanitizedLabel {
    /// Sanitize `raw`, rejecting labels that sanitize to nothing.
    pub fn new(raw: &str) -> Option<Self> {
        let clean = sanitize_label(raw);
        if clean.is_empty() {
            None
        } else {
            Some(Self(clean))
        }
    }

    /// Sanitize `raw`, substituting [`FALLBACK_LABEL`] for empty results.
    pub fn or_fallback(raw: &str) -> Self {
        Self::new(raw).unwrap_or_else(|| Self(FALLBACK_LABEL.to_string()))
    }

    /// True when `name` is already in sanitized form (used to vet names that
    /// arrive from outside, e.g. URL path segments).
    pub fn is_sanitized(name: &str) -> bool {
        !name.is_empty() && sanitize_label(name) == name
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_spaces_collapse() {
        assert_eq!(sanitize_label("My Song!!  2024"), "My_Song_2024");
        assert_eq!(sanitize_label("Test Song"), "Test_Song");
    }

    #[test]
    fn keeps_dashes_and_trims_edges() {
        assert_eq!(sanitize_label("  --a-b__c!  "), "--a-b_c");
        assert_eq!(sanitize_label("__x__"), "x");
    }

    #[test]
    fn non_ascii_becomes_separator() {
        assert_eq!(sanitize_label("Canção do mar"), "Can_o_do_mar");
    }

    #[test]
    fn empty_and_garbage_inputs() {
        assert_eq!(sanitize_label(""), "");
        assert_eq!(sanitize_label("!!! ???"), "");
        assert!(SanitizedLabel::new("%%%").is_none());
        assert_eq!(SanitizedLabel::or_fallback("%%%").as_str(), FALLBACK_LABEL);
    }

    #[test]
    fn is_sanitized_rejects_traversal() {
        assert!(SanitizedLabel::is_sanitized("Test_Song"));
        assert!(!SanitizedLabel::is_sanitized(".."));
        assert!(!SanitizedLabel::is_sanitized("a/b"));
        assert!(!SanitizedLabel::is_sanitized(""));
    }
}
