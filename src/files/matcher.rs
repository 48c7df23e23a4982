// src/files/matcher.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled include / exclude patterns.
///
/// Patterns starting with `!` are exclusions. A path is selected when no
/// exclusion matches it and either an inclusion matches it or there are no
/// inclusions at all. Pattern order is irrelevant.
///
/// `*` does not cross `/`; use `**` for that.
#[derive(Clone)]
pub struct FileMatcher {
    includes: Option<GlobSet>,
    excludes: Option<GlobSet>,
}

impl fmt::Debug for FileMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileMatcher")
            .field("includes", &self.includes.as_ref().map(GlobSet::len))
            .field("excludes", &self.excludes.as_ref().map(GlobSet::len))
            .finish()
    }
}

impl FileMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            match pattern.strip_prefix('!') {
                Some(negated) => excludes.push(negated),
                None => includes.push(pattern),
            }
        }

        Ok(Self {
            includes: build_globset(&includes)?,
            excludes: build_globset(&excludes)?,
        })
    }

    /// Whether `rel_path` (forward slashes, relative to its group root) is
    /// selected.
    pub fn matches(&self, rel_path: &str) -> bool {
        if let Some(excludes) = &self.excludes {
            if excludes.is_match(rel_path) {
                return false;
            }
        }
        match &self.includes {
            Some(includes) => includes.is_match(rel_path),
            None => true,
        }
    }
}

fn build_globset(patterns: &[&str]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusions_win_regardless_of_order() {
        let before = FileMatcher::new(&["!lib/legacy.js", "**/*.js"]).unwrap();
        let after = FileMatcher::new(&["**/*.js", "!lib/legacy.js"]).unwrap();

        for matcher in [before, after] {
            assert!(matcher.matches("lib/app.js"));
            assert!(!matcher.matches("lib/legacy.js"));
            assert!(!matcher.matches("lib/app.css"));
        }
    }

    #[test]
    fn no_inclusions_selects_everything_not_excluded() {
        let matcher = FileMatcher::new(&["!**/*.map"]).unwrap();
        assert!(matcher.matches("app.js"));
        assert!(!matcher.matches("dist/app.js.map"));
    }

    #[test]
    fn single_star_stays_within_a_directory() {
        let matcher = FileMatcher::new(&["*.scss"]).unwrap();
        assert!(matcher.matches("main.scss"));
        assert!(!matcher.matches("partials/_base.scss"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(FileMatcher::new(&["src/[unclosed"]).is_err());
    }
}
