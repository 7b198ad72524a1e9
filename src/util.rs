//! Small helpers shared by the pipeline stages.

use std::time::{SystemTime, UNIX_EPOCH};

/// A unique class name for synthetic pseudo-element rules.
///
/// CSS class selectors cannot start with a digit, hence the letter prefix.
pub fn uid() -> String {
    format!("u{}", uuid::Uuid::new_v4().simple())
}

/// Escape the characters that break a `data:image/svg+xml` URI body.
pub fn escape_xhtml(xhtml: &str) -> String {
    xhtml
        .replace('%', "%25")
        .replace('#', "%23")
        .replace('\n', "%0A")
}

/// Milliseconds since the epoch, used as the cache-bust token.
pub fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uids_are_distinct_and_long_enough() {
        let ids: Vec<String> = (0..500).map(|_| uid()).collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.iter().all(|id| id.len() == 33));
        assert!(ids.iter().all(|id| id[1..].chars().all(|c| c.is_ascii_hexdigit())));
        assert!(ids.iter().all(|id| id.starts_with('u')));
    }

    #[test]
    fn escapes_uri_unsafe_characters() {
        assert_eq!(escape_xhtml("50% #fff\nx"), "50%25 %23fff%0Ax");
    }
}
