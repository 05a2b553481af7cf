//! Shell-style recipe name patterns.

use std::fmt;
use std::str::FromStr;

use globset::{GlobBuilder, GlobMatcher};

use crate::error::{Error, Result};

/// An anchored, case-sensitive glob (`*`, `?`, `[...]`) over recipe names.
#[derive(Clone)]
pub struct NamePattern {
    source: String,
    /// `None` matches every name
    matcher: Option<GlobMatcher>,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern == "*" {
            return Ok(Self::any());
        }
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|error| Error::InvalidInput(format!("Invalid name pattern: {error}")))?;
        Ok(Self {
            source: pattern.to_string(),
            matcher: Some(glob.compile_matcher()),
        })
    }

    /// The pattern matching every name.
    pub fn any() -> Self {
        Self {
            source: "*".to_string(),
            matcher: None,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(name),
            None => true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for NamePattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamePattern").field(&self.source).finish()
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_everything() {
        let pattern = NamePattern::any();
        assert!(pattern.matches("Pale Ale"));
        assert!(pattern.matches(""));
        assert!(pattern.matches("Weizen 1/2"));
    }

    #[test]
    fn glob_is_anchored_and_case_sensitive() {
        let pattern = NamePattern::new("Pale*").unwrap();
        assert!(pattern.matches("Pale Ale"));
        assert!(!pattern.matches("pale ale"));
        assert!(!pattern.matches("Extra Pale"));
    }

    #[test]
    fn single_char_and_class() {
        let pattern = NamePattern::new("Sud ?[0-9]").unwrap();
        assert!(pattern.matches("Sud A1"));
        assert!(!pattern.matches("Sud A"));
        assert!(!pattern.matches("Sud AB"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(matches!(
            NamePattern::new("Sud [1"),
            Err(Error::InvalidInput(_))
        ));
    }
}
