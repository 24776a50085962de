//! File-name wildcard matching for enumeration and watch filters

use crate::error::{FsError, Result};
use regex::{Regex, RegexBuilder};

/// Compiled `*` / `?` pattern matched against a single entry name.
///
/// Every other character, brackets included, matches itself.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Option<Regex>,
}

impl NamePattern {
    /// Compiles `pattern`. An empty pattern, `*` and `*.*` all match every
    /// name, including names without an extension.
    pub fn new(pattern: &str, case_sensitive: bool) -> Result<Self> {
        if pattern.contains('/') || pattern.contains('\\') {
            return Err(FsError::invalid_path(
                pattern,
                "search pattern must not contain a path separator",
            ));
        }

        let regex = if matches!(pattern, "" | "*" | "*.*") {
            None
        } else {
            let mut expr = String::with_capacity(pattern.len() + 8);
            expr.push('^');
            for c in pattern.chars() {
                match c {
                    '*' => expr.push_str(".*"),
                    '?' => expr.push('.'),
                    _ => expr.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
                }
            }
            expr.push('$');
            let compiled = RegexBuilder::new(&expr)
                .case_insensitive(!case_sensitive)
                .dot_matches_new_line(true)
                .build()
                .map_err(|e| {
                    FsError::invalid_path(pattern, format!("bad search pattern: {}", e))
                })?;
            Some(compiled)
        };

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn any() -> Self {
        Self {
            source: "*".to_string(),
            regex: None,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(name),
            None => true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_everything() {
        for p in ["", "*", "*.*"] {
            let pat = NamePattern::new(p, true).unwrap();
            assert!(pat.matches("README"));
            assert!(pat.matches("a.txt"));
            assert!(pat.matches(".hidden"));
        }
    }

    #[test]
    fn test_extension_pattern() {
        let pat = NamePattern::new("*.txt", true).unwrap();
        assert!(pat.matches("b.txt"));
        assert!(!pat.matches("b.rs"));
        assert!(!pat.matches("b.TXT"));
    }

    #[test]
    fn test_case_insensitive() {
        let pat = NamePattern::new("*.txt", false).unwrap();
        assert!(pat.matches("B.TXT"));
    }

    #[test]
    fn test_question_mark() {
        let pat = NamePattern::new("file?.log", true).unwrap();
        assert!(pat.matches("file1.log"));
        assert!(!pat.matches("file10.log"));
    }

    #[test]
    fn test_brackets_are_literal() {
        let pat = NamePattern::new("[draft]*.md", true).unwrap();
        assert!(pat.matches("[draft] notes.md"));
        assert!(!pat.matches("d notes.md"));
    }

    #[test]
    fn test_separator_rejected() {
        assert!(NamePattern::new("dir/*.txt", true).is_err());
        assert!(NamePattern::new("dir\\*.txt", true).is_err());
    }
}
