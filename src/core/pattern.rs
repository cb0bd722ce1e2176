use globset::{GlobBuilder, GlobMatcher};

use crate::error::{FsError, Result};
use crate::path::chars::{is_separator, is_valid_path_char, is_wildcard};

/// Entry-name filter compiled once per enumeration.
///
/// Only `*` and `?` are special; matching ignores case.
#[derive(Debug, Clone)]
pub enum SearchPattern {
    All,
    Literal(String),
    Wildcard(GlobMatcher),
}

impl SearchPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        if let Some(c) = pattern
            .chars()
            .find(|&c| is_separator(c) || !is_valid_path_char(c))
        {
            return Err(FsError::invalid_path(
                pattern,
                format!("character {c:?} is not allowed in a search pattern"),
            ));
        }

        if matches!(pattern, "" | "*" | "*.*") {
            return Ok(Self::All);
        }
        if !pattern.chars().any(is_wildcard) {
            return Ok(Self::Literal(pattern.to_lowercase()));
        }

        let glob = GlobBuilder::new(&to_glob(pattern))
            .case_insensitive(true)
            .literal_separator(false)
            .backslash_escape(false)
            .build()
            .map_err(|e| FsError::invalid_path(pattern, e.to_string()))?;

        Ok(Self::Wildcard(glob.compile_matcher()))
    }

    pub fn is_match(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Literal(literal) => name.to_lowercase() == *literal,
            Self::Wildcard(matcher) => matcher.is_match(name),
        }
    }

    pub fn matches_everything(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Escape glob syntax other than `*` and `?`; runs of `*` collapse to one.
fn to_glob(pattern: &str) -> String {
    let mut glob = String::with_capacity(pattern.len() + 8);
    for c in pattern.chars() {
        match c {
            '*' if glob.ends_with('*') => {}
            '[' => glob.push_str("[[]"),
            ']' => glob.push_str("[]]"),
            '{' => glob.push_str("[{]"),
            '}' => glob.push_str("[}]"),
            _ => glob.push(c),
        }
    }
    glob
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_all_forms() {
        for pattern in ["", "*", "*.*"] {
            let p = SearchPattern::new(pattern).expect("pattern");
            assert!(p.matches_everything());
            assert!(p.is_match("anything"));
            assert!(p.is_match("no_extension"));
        }
    }

    #[test]
    fn test_literal_is_case_insensitive() {
        let p = SearchPattern::new("Readme.TXT").expect("pattern");
        assert!(p.is_match("readme.txt"));
        assert!(!p.is_match("readme.txt.bak"));
    }

    #[test]
    fn test_wildcards() {
        let p = SearchPattern::new("*.log").expect("pattern");
        assert!(p.is_match("app.LOG"));
        assert!(!p.is_match("app.log.1"));

        let q = SearchPattern::new("file?.txt").expect("pattern");
        assert!(q.is_match("file1.txt"));
        assert!(!q.is_match("file10.txt"));
    }

    #[test]
    fn test_glob_syntax_is_literal() {
        let p = SearchPattern::new("[a]*{b}").expect("pattern");
        assert!(p.is_match("[a]x{b}"));
        assert!(!p.is_match("ax b"));

        let q = SearchPattern::new("a**b").expect("pattern");
        assert!(q.is_match("a-middle-b"));
    }

    #[test]
    fn test_rejects_separators_and_illegal_chars() {
        assert!(SearchPattern::new(r"dir\*.txt").is_err());
        assert!(SearchPattern::new("a/b").is_err());
        assert!(SearchPattern::new("a|b").is_err());
    }
}
