//! Glob patterns with a single `*` wildcard.
//!
//! Every `*` matches any (possibly empty) run of characters; all other
//! characters match literally. Patterns are anchored at both ends.

use regex::Regex;

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compiles a glob pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the translated pattern is rejected
    /// (for example because it exceeds the regex size limit).
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&to_regex(pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Returns `true` if `candidate` matches the whole pattern.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// Returns the original pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Translates a glob into an anchored regular expression (`*` → `.*`).
#[must_use]
pub fn to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{body}$")
}
