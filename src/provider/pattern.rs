use std::fmt;
use std::str::FromStr;

use globset::{GlobBuilder, GlobMatcher};
use snafu::ResultExt;

use crate::provider::{InvalidPatternSnafu, ProviderError};

/// Glob pattern matched against item names (`*`, `?`, `[...]`), case-insensitive.
///
/// An empty pattern, `*` and `*.*` all match every name.
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    source: String,
    matcher: Option<GlobMatcher>,
}

impl Pattern {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(pattern: &str) -> Result<Self, ProviderError> {
        let trimmed = pattern.trim();
        if matches!(trimmed, "" | "*" | "*.*") {
            return Ok(Self {
                source: trimmed.to_string(),
                matcher: None,
            });
        }

        let glob = GlobBuilder::new(trimmed)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .context(InvalidPatternSnafu { pattern: trimmed })?;

        Ok(Self {
            source: trimmed.to_string(),
            matcher: Some(glob.compile_matcher()),
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(name),
            None => true,
        }
    }

    pub fn matches_all(&self) -> bool {
        self.matcher.is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for Pattern {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::new(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "*")
        } else {
            write!(f, "{}", self.source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "anything.bin", true)]
    #[case("*.*", "noext", true)]
    #[case("*.bgl", "scenery.BGL", true)]
    #[case("*.bgl", "scenery.bglx", false)]
    #[case("AP?.txt", "ap1.txt", true)]
    #[case("[ab]*", "beta", true)]
    #[case("[ab]*", "gamma", false)]
    fn matches_names(#[case] pattern: &str, #[case] name: &str, #[case] expected: bool) {
        let pattern = Pattern::new(pattern).expect("Failed to build pattern");
        assert_eq!(pattern.matches(name), expected);
    }

    #[test]
    fn wildcard_does_not_cross_separators() {
        let pattern = Pattern::new("*.txt").expect("Failed to build pattern");
        assert!(!pattern.matches("dir/file.txt"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let result = Pattern::new("[unclosed");
        assert!(matches!(
            result,
            Err(ProviderError::InvalidPattern { .. })
        ));
    }
}
