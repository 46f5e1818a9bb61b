use std::sync::Arc;

use derivative::Derivative;
use globset::GlobBuilder;
use globset::GlobMatcher;

use crate::EntryType;
use crate::Error;
use crate::FileStat;

/// Caller predicate consulted for every discovered entry with its path and
/// lstat. Returning `true` suppresses the entry; for a directory the subtree
/// is not walked either.
///
/// Called concurrently from several workers.
pub type EntryFilter = Arc<dyn Fn(&str, &FileStat) -> bool + Send + Sync>;

/// Enumerates what a walk may do with a discovered path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FilterLevel {
    /// Neither return the path nor descend into it.
    Deny,

    /// Descend (if it is a directory) but do not return the path.
    /// The type mask does not select it.
    Traverse,

    /// Return the path, and descend into it if it is a directory.
    Allow,
}

/// Exclude patterns, the caller predicate and the type mask, applied in that
/// order.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub(crate) struct FilterSet {
    /// Compiled exclude patterns, matched against base names.
    excludes: Vec<GlobMatcher>,

    #[derivative(Debug = "ignore")]
    predicate: Option<EntryFilter>,

    types: EntryType,
}

impl FilterSet {
    /// Compiles `patterns`. Patterns that fail to compile are returned as
    /// errors and left out, so they never match.
    pub(crate) fn create_with<S: AsRef<str>>(
        patterns: &[S],
        predicate: Option<EntryFilter>,
        types: EntryType,
    ) -> (Self, Vec<Error>) {
        let mut excludes = Vec::with_capacity(patterns.len());
        let mut errors = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .backslash_escape(true)
                .build();
            match glob {
                Ok(glob) => excludes.push(glob.compile_matcher()),
                Err(e) => errors.push(Error::Pattern {
                    pattern: pattern.to_string(),
                    how: e.kind().to_string(),
                }),
            }
        }
        let filter = Self {
            excludes,
            predicate,
            types,
        };
        (filter, errors)
    }

    /// Returns true if `name` matches any exclude pattern.
    pub(crate) fn is_excluded(&self, name: &str) -> bool {
        self.excludes.iter().any(|g| g.is_match(name))
    }

    /// Returns true if the caller predicate rejects `path`.
    pub(crate) fn rejects(&self, path: &str, stat: &FileStat) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(path, stat),
            None => false,
        }
    }

    /// Exclude patterns first, then the caller predicate.
    pub(crate) fn is_suppressed(&self, name: &str, path: &str, stat: &FileStat) -> bool {
        self.is_excluded(name) || self.rejects(path, stat)
    }

    /// Returns true if the type mask selects `stat`'s type.
    pub(crate) fn wants(&self, stat: &FileStat) -> bool {
        self.types.wants(stat.file_type)
    }

    /// Determines what to do with a discovered entry.
    ///
    /// The type mask only decides emission: a directory it does not select is
    /// still traversed.
    pub(crate) fn level(&self, name: &str, path: &str, stat: &FileStat) -> FilterLevel {
        if self.is_suppressed(name, path, stat) {
            return FilterLevel::Deny;
        }
        if self.wants(stat) {
            FilterLevel::Allow
        } else if stat.is_dir() {
            FilterLevel::Traverse
        } else {
            FilterLevel::Deny
        }
    }
}
