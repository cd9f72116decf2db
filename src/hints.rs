//! Best-effort classifier for errors caused by client-only code running
//! during a server-side render.
//!
//! The sandbox deliberately exposes no browser globals, so a bundle that
//! dereferences `window` or `localStorage` fails with a reference error.
//! Matching those messages lets the engine attach a remediation hint to the
//! failure. The classifier only decorates an already-failed outcome; it
//! never influences control flow.

/// Hint appended to failures that match the client-only pattern table.
pub const CLIENT_ONLY_HINT: &str =
    "client-only code must be guarded for server execution; check for browser APIs \
     (window, document, storage, geolocation) reached during render";

/// Substrings of exception messages that indicate a browser API was
/// dereferenced at generation time.
const CLIENT_ONLY_PATTERNS: &[&str] = &[
    "window is not defined",
    "document is not defined",
    "self is not defined",
    "localStorage is not defined",
    "sessionStorage is not defined",
    "navigator is not defined",
    "location is not defined",
    "geolocation",
];

/// Returns the remediation hint if `message` looks like a client-only API
/// dereference, `None` otherwise.
pub fn classify(message: &str) -> Option<&'static str> {
    if CLIENT_ONLY_PATTERNS.iter().any(|p| message.contains(p)) {
        Some(CLIENT_ONLY_HINT)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_every_pattern_in_the_table() {
        for pattern in CLIENT_ONLY_PATTERNS {
            let message = format!("ReferenceError: {pattern}");
            assert_eq!(classify(&message), Some(CLIENT_ONLY_HINT), "{pattern}");
        }
    }

    #[test]
    fn matches_nested_error_chains() {
        let message = "render entry threw for '/b': ReferenceError: window is not defined";
        assert_eq!(classify(message), Some(CLIENT_ONLY_HINT));
    }

    #[test]
    fn ignores_unrelated_errors() {
        assert_eq!(classify("TypeError: x.map is not a function"), None);
        assert_eq!(classify("out of disk space"), None);
    }
}
