/*!
 * The discovery pipeline: walk, glob search, explicit files, dedup, order
 */

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use crate::explicit::ExplicitFileMerger;
use crate::filter::{compile_pattern, FilterEngine, FilterRules};
use crate::glob::GlobMatcher;
use crate::types::{entry_order, Diagnostics, Discovery, Entry};
use crate::walker::DirectoryWalker;

/// Hard failures of a discovery run
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// None of the supplied roots exists or is a directory
    #[error("no valid root directories among {count} supplied")]
    NoValidRoots {
        count: usize,
        diagnostics: Diagnostics,
    },
}

/// Everything one discovery run needs to know
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Directories to scan; the current directory when empty
    pub roots: Vec<PathBuf>,
    /// Extensions to include, dot optional, any case
    pub include_extensions: Vec<String>,
    /// Extensions to exclude, dot optional, any case
    pub exclude_extensions: Vec<String>,
    /// Base-name patterns to include
    pub include_patterns: Vec<String>,
    /// Base-name patterns to exclude
    pub exclude_patterns: Vec<String>,
    /// Patterns searched for beneath every root
    pub glob_patterns: Vec<String>,
    pub include_all: bool,
    pub include_hidden: bool,
    pub include_binary: bool,
    /// Directories pruned from discovery, absolute or relative to the base directory
    pub ignore_dirs: Vec<PathBuf>,
    /// Files included regardless of the filter rules
    pub explicit_files: Vec<PathBuf>,
    /// Deepest directory level to descend into (root = 1)
    pub max_depth: Option<usize>,
    /// Base for relative explicit files and ignored directories; defaults
    /// to the first root
    pub base_dir: Option<PathBuf>,
}

impl DiscoveryOptions {
    /// Roots to scan, falling back to the current directory
    pub fn effective_roots(&self) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.roots.clone()
        }
    }

    /// Absolute base directory for relative paths
    pub fn resolved_base_dir(&self) -> PathBuf {
        let candidate = self
            .base_dir
            .clone()
            .or_else(|| self.roots.first().cloned())
            .unwrap_or_else(|| PathBuf::from("."));

        fs::canonicalize(&candidate).unwrap_or_else(|_| {
            if candidate.is_absolute() {
                candidate
            } else {
                env::current_dir().map(|cwd| cwd.join(&candidate)).unwrap_or(candidate)
            }
        })
    }

    /// True when only explicit files were asked for, so nothing is scanned
    pub fn only_explicit_files(&self) -> bool {
        !self.explicit_files.is_empty()
            && self.include_extensions.is_empty()
            && !self.include_all
            && self.include_patterns.is_empty()
            && self.glob_patterns.is_empty()
    }

    /// Build the filter rules, dropping malformed patterns with a diagnostic
    pub fn build_rules(&self, diagnostics: &mut Diagnostics) -> FilterRules {
        FilterRules {
            include_extensions: FilterRules::normalize_extensions(&self.include_extensions),
            exclude_extensions: FilterRules::normalize_extensions(&self.exclude_extensions),
            include_patterns: valid_patterns(&self.include_patterns, "include", diagnostics),
            exclude_patterns: valid_patterns(&self.exclude_patterns, "exclude", diagnostics),
            include_all: self.include_all,
            include_hidden: self.include_hidden,
            include_binary: self.include_binary,
            ignored_directories: FilterRules::resolve_directories(
                &self.ignore_dirs,
                &self.resolved_base_dir(),
            ),
        }
    }
}

fn valid_patterns(patterns: &[String], kind: &str, diagnostics: &mut Diagnostics) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .filter(|p| match compile_pattern(p) {
            Ok(_) => true,
            Err(e) => {
                diagnostics.error(None, format!("Invalid {} pattern '{}': {}", kind, p, e));
                false
            }
        })
        .map(str::to_string)
        .collect()
}

/// Composes the walker, glob matcher and explicit merger
pub struct DiscoveryOrchestrator {
    options: DiscoveryOptions,
}

impl DiscoveryOrchestrator {
    pub fn new(options: DiscoveryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Run discovery, taking the explicit-files-only path when it applies
    pub fn run(&self) -> Result<Discovery, DiscoveryError> {
        if self.options.only_explicit_files() {
            Ok(self.discover_explicit_files())
        } else {
            self.discover()
        }
    }

    /// Full pipeline: walk, glob search, explicit merge, dedup, sort
    pub fn discover(&self) -> Result<Discovery, DiscoveryError> {
        let mut diagnostics = Diagnostics::new();
        let roots = self.options.effective_roots();
        let filter = FilterEngine::new(self.options.build_rules(&mut diagnostics));

        let walked = DirectoryWalker::new(&filter, self.options.max_depth)
            .walk(&roots, &mut diagnostics);
        if walked.valid_roots == 0 {
            return Err(DiscoveryError::NoValidRoots {
                count: roots.len(),
                diagnostics,
            });
        }

        let mut entries = walked.entries;

        if !self.options.glob_patterns.is_empty() {
            let matched = GlobMatcher::new(&filter).find(
                &roots,
                &self.options.glob_patterns,
                &mut diagnostics,
            );
            entries.extend(matched);
        }

        if !self.options.explicit_files.is_empty() {
            let base_dir = self.options.resolved_base_dir();
            entries = ExplicitFileMerger::new(&base_dir).merge(
                entries,
                &self.options.explicit_files,
                &mut diagnostics,
            );
        }

        Ok(finish(entries, diagnostics))
    }

    /// Only the explicit files; no directory is walked or searched
    pub fn discover_explicit_files(&self) -> Discovery {
        let mut diagnostics = Diagnostics::new();
        diagnostics.info(
            None,
            "Only processing specifically included files (no directory scanning)",
        );

        let base_dir = self.options.resolved_base_dir();
        let entries = ExplicitFileMerger::new(&base_dir).merge(
            Vec::new(),
            &self.options.explicit_files,
            &mut diagnostics,
        );

        finish(entries, diagnostics)
    }
}

/// Convenience wrapper around `DiscoveryOrchestrator::run`
pub fn discover(options: DiscoveryOptions) -> Result<Discovery, DiscoveryError> {
    DiscoveryOrchestrator::new(options).run()
}

/// Keep the first entry per absolute path, then put everything in output order
fn finish(entries: Vec<Entry>, mut diagnostics: Diagnostics) -> Discovery {
    let mut seen = HashSet::new();
    let mut entries: Vec<Entry> = entries
        .into_iter()
        .filter(|entry| seen.insert(entry.absolute_path.clone()))
        .collect();
    entries.sort_by(entry_order);

    let files = entries.iter().filter(|e| e.is_file()).count();
    diagnostics.info(
        None,
        format!(
            "Final result: {} files, {} directories",
            files,
            entries.len() - files
        ),
    );

    Discovery {
        entries,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Level;

    #[test]
    fn test_effective_roots_default_to_current_dir() {
        let options = DiscoveryOptions::default();
        assert_eq!(options.effective_roots(), vec![PathBuf::from(".")]);
    }

    #[test]
    fn test_only_explicit_files() {
        let mut options = DiscoveryOptions {
            explicit_files: vec![PathBuf::from("main.py")],
            ..Default::default()
        };
        assert!(options.only_explicit_files());

        options.glob_patterns = vec!["*.md".to_string()];
        assert!(!options.only_explicit_files());

        options.glob_patterns.clear();
        options.include_all = true;
        assert!(!options.only_explicit_files());
    }

    #[test]
    fn test_build_rules_drops_malformed_patterns() {
        let options = DiscoveryOptions {
            include_extensions: vec!["PY".to_string(), ".Rs".to_string()],
            include_patterns: vec!["*.md".to_string(), "[".to_string()],
            exclude_patterns: vec![" ".to_string(), "*_test.*".to_string()],
            ..Default::default()
        };
        let mut diagnostics = Diagnostics::new();
        let rules = options.build_rules(&mut diagnostics);

        assert!(rules.include_extensions.contains(".py"));
        assert!(rules.include_extensions.contains(".rs"));
        assert_eq!(rules.include_patterns, vec!["*.md"]);
        assert_eq!(rules.exclude_patterns, vec!["*_test.*"]);
        assert_eq!(diagnostics.at_least(Level::Error).count(), 1);
    }
}
