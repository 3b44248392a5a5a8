//! Shell-style name patterns used to select recipes by name.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BrewSyncError, Result};

static MATCH_ALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^.*$").expect("valid match-all regex"));

/// A `*`/`?` glob over recipe names. Matching is case-sensitive.
#[derive(Debug, Clone)]
pub struct NamePattern {
    glob: String,
    regex: Regex,
}

impl NamePattern {
    /// Compile a glob. `*` matches any run of characters, `?` exactly one.
    pub fn new(glob: &str) -> Result<Self> {
        let escaped = regex::escape(glob)
            .replace(r"\*", ".*")
            .replace(r"\?", ".");
        let regex = Regex::new(&format!("^{escaped}$"))
            .map_err(|e| BrewSyncError::validation(format!("invalid name pattern '{glob}': {e}")))?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    /// The pattern matching every name.
    pub fn any() -> Self {
        Self {
            glob: "*".to_string(),
            regex: MATCH_ALL.clone(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The glob as given.
    pub fn as_str(&self) -> &str {
        &self.glob
    }

    /// Equivalent SQL `LIKE` pattern (`*` → `%`, `?` → `_`).
    pub fn to_sql_like(&self) -> String {
        self.glob.replace('*', "%").replace('?', "_")
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self::any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_whole_name() {
        let pattern = NamePattern::new("Pale*").unwrap();
        assert!(pattern.matches("Pale Ale"));
        assert!(pattern.matches("Pale"));
        assert!(!pattern.matches("Extra Pale Ale"));
        assert!(!pattern.matches("pale ale"));
    }

    #[test]
    fn question_mark_and_literals() {
        let pattern = NamePattern::new("IPA (v?)").unwrap();
        assert!(pattern.matches("IPA (v2)"));
        assert!(!pattern.matches("IPA (v12)"));
        assert!(NamePattern::new("Weizen 1/2").unwrap().matches("Weizen 1/2"));
    }

    #[test]
    fn any_matches_everything() {
        assert!(NamePattern::any().matches(""));
        assert!(NamePattern::default().matches("Stout"));
    }

    #[test]
    fn sql_like_translation() {
        assert_eq!(NamePattern::new("*Bock?").unwrap().to_sql_like(), "%Bock_");
    }
}
