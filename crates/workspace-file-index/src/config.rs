//! Index configuration.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::error::{Result, WorkspaceIndexError};

/// Tunables of the file index.
///
/// Deserializable from host settings; every missing field takes its default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// How many times content iteration may switch between excluded and
    /// included directories along one path before the traversal is treated
    /// as runaway recursion and aborted.
    pub max_exclusion_alternations: usize,
    /// Minimum interval between "queried before initialization" warnings.
    pub not_initialized_log_interval_ms: u64,
    /// File name globs reported as ignored regardless of registrations.
    pub ignored_file_patterns: Vec<String>,
    /// Lowest `META-INF/versions/N` directory honored in multi-release archives.
    pub multi_release_min_version: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_exclusion_alternations: 100,
            not_initialized_log_interval_ms: 10_000,
            ignored_file_patterns: [".git", ".svn", ".hg", "CVS", "__pycache__", ".DS_Store", "*.pyc", "*~"]
                .into_iter()
                .map(String::from)
                .collect(),
            multi_release_min_version: 9,
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_exclusion_alternations == 0 {
            return Err(WorkspaceIndexError::InvalidConfig(
                "max_exclusion_alternations must be positive".to_string(),
            ));
        }
        if self.multi_release_min_version == 0 {
            return Err(WorkspaceIndexError::InvalidConfig(
                "multi_release_min_version must be positive".to_string(),
            ));
        }
        self.ignored_matcher().map(|_| ())
    }

    /// Compiles `ignored_file_patterns`.
    pub fn ignored_matcher(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignored_file_patterns {
            let glob = Glob::new(pattern).map_err(|source| WorkspaceIndexError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|source| WorkspaceIndexError::InvalidPattern {
                pattern: self.ignored_file_patterns.join(";"),
                source,
            })
    }
}
