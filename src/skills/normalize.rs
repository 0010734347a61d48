//! Argument normalization for cache keys

/// Canonicalize an argument string so whitespace variants share a cache entry.
///
/// Trims both ends and collapses every internal whitespace run to one space.
/// Case and all other characters are preserved. The result is only a key;
/// content processing still receives the caller's original string.
pub fn normalize_arguments(raw: Option<&str>) -> String {
    match raw {
        None => String::new(),
        Some(s) => s.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_variants_match() {
        assert_eq!(normalize_arguments(Some(" a  b ")), normalize_arguments(Some("a b")));
        assert_eq!(normalize_arguments(Some("a\t\n b")), "a b");
        assert_eq!(normalize_arguments(Some(" file.pdf")), "file.pdf");
    }

    #[test]
    fn test_absent_equals_empty() {
        assert_eq!(normalize_arguments(None), normalize_arguments(Some("")));
        assert_eq!(normalize_arguments(Some("   ")), "");
    }

    #[test]
    fn test_case_preserved() {
        assert_ne!(normalize_arguments(Some("A")), normalize_arguments(Some("a")));
        assert_eq!(normalize_arguments(Some("FILE.PDF")), "FILE.PDF");
    }
}
