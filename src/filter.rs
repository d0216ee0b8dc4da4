/*!
 * Include/exclude policy for discovered files and directories
 */

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};

use crate::binary::{extension_of, is_binary};
use crate::error::Result;
use crate::types::{ExclusionReason, InclusionReason, Verdict};

/// The complete rule set for one discovery run
#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    /// Dot-prefixed, lower-cased extensions to include
    pub include_extensions: BTreeSet<String>,
    /// Dot-prefixed, lower-cased extensions to exclude
    pub exclude_extensions: BTreeSet<String>,
    /// Patterns matched against base names to include
    pub include_patterns: Vec<String>,
    /// Patterns matched against base names to exclude
    pub exclude_patterns: Vec<String>,
    /// Include every file not otherwise excluded
    pub include_all: bool,
    /// Include dotfiles and dot-directories
    pub include_hidden: bool,
    /// Include files whose content looks binary
    pub include_binary: bool,
    /// Resolved directories pruned from discovery
    pub ignored_directories: Vec<PathBuf>,
}

impl FilterRules {
    /// Normalize a list of extensions: trimmed, dot-prefixed, lower-cased
    pub fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> BTreeSet<String> {
        extensions
            .iter()
            .map(|ext| ext.as_ref().trim())
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                if ext.starts_with('.') {
                    ext.to_lowercase()
                } else {
                    format!(".{}", ext.to_lowercase())
                }
            })
            .collect()
    }

    /// Resolve ignored directories to absolute paths.
    ///
    /// Directories that exist are canonicalized; ones that do not are made
    /// absolute against `base` so they still compare sensibly.
    pub fn resolve_directories(dirs: &[PathBuf], base: &Path) -> Vec<PathBuf> {
        dirs.iter()
            .map(|dir| {
                let joined = if dir.is_absolute() {
                    dir.clone()
                } else {
                    base.join(dir)
                };
                fs::canonicalize(&joined).unwrap_or(joined)
            })
            .collect()
    }
}

/// Compile a pattern matched against base names
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    Ok(Glob::new(pattern)?.compile_matcher())
}

/// A base-name pattern with its source text
#[derive(Debug, Clone)]
struct NamePattern {
    text: String,
    matcher: GlobMatcher,
}

fn compile_all(patterns: &[String]) -> Vec<NamePattern> {
    patterns
        .iter()
        .filter_map(|text| match compile_pattern(text) {
            Ok(matcher) => Some(NamePattern {
                text: text.clone(),
                matcher,
            }),
            Err(e) => {
                tracing::warn!("Dropping pattern '{}': {}", text, e);
                None
            }
        })
        .collect()
}

/// Evaluates files and directories against a `FilterRules` set
#[derive(Debug, Clone)]
pub struct FilterEngine {
    rules: FilterRules,
    include_patterns: Vec<NamePattern>,
    exclude_patterns: Vec<NamePattern>,
}

impl FilterEngine {
    pub fn new(rules: FilterRules) -> Self {
        tracing::debug!("FilterEngine initialized with:");
        tracing::debug!("  Include extensions: {:?}", rules.include_extensions);
        tracing::debug!("  Exclude extensions: {:?}", rules.exclude_extensions);
        tracing::debug!("  Include patterns: {:?}", rules.include_patterns);
        tracing::debug!("  Exclude patterns: {:?}", rules.exclude_patterns);
        tracing::debug!("  Include all: {}", rules.include_all);
        tracing::debug!("  Include hidden: {}", rules.include_hidden);
        tracing::debug!("  Include binary: {}", rules.include_binary);
        tracing::debug!("  Ignored directories: {:?}", rules.ignored_directories);
        Self {
            include_patterns: compile_all(&rules.include_patterns),
            exclude_patterns: compile_all(&rules.exclude_patterns),
            rules,
        }
    }

    pub fn rules(&self) -> &FilterRules {
        &self.rules
    }

    /// True when the path is one of the ignored directories or lies beneath one
    pub fn ignored_ancestor(&self, path: &Path) -> Option<&Path> {
        let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.rules
            .ignored_directories
            .iter()
            .find(|dir| resolved.starts_with(dir))
            .map(PathBuf::as_path)
    }

    /// Whether a directory must be pruned from traversal
    pub fn should_ignore_directory(&self, path: &Path) -> bool {
        if self.ignored_ancestor(path).is_some() {
            return true;
        }

        !self.rules.include_hidden && is_hidden(path)
    }

    /// Evaluate a file against the rules in fixed precedence order
    pub fn should_include_file(&self, path: &Path) -> Verdict {
        let name = base_name(path);

        if !self.rules.include_hidden && name.starts_with('.') {
            return Verdict::Excluded(ExclusionReason::Hidden);
        }

        if let Some(dir) = self.ignored_ancestor(path) {
            return Verdict::Excluded(ExclusionReason::IgnoredDirectory(dir.to_path_buf()));
        }

        if let Some(pattern) = self
            .exclude_patterns
            .iter()
            .find(|pattern| pattern.matcher.is_match(&name))
        {
            return Verdict::Excluded(ExclusionReason::ExcludePattern(pattern.text.clone()));
        }

        let extension = extension_of(path);
        if let Some(ext) = &extension {
            if self.rules.exclude_extensions.contains(ext) {
                return Verdict::Excluded(ExclusionReason::ExcludedExtension(ext.clone()));
            }
        }

        if self.rules.include_all {
            if !self.rules.include_binary && is_binary(path) {
                return Verdict::Excluded(ExclusionReason::Binary);
            }
            return Verdict::Included(InclusionReason::IncludeAll);
        }

        if self.rules.include_patterns.is_empty() && self.rules.include_extensions.is_empty() {
            return Verdict::Excluded(ExclusionReason::NoIncludeCriteria);
        }

        let pattern_match = self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matcher.is_match(&name));
        let extension_match = extension
            .as_ref()
            .map_or(false, |ext| self.rules.include_extensions.contains(ext));

        if !(pattern_match || extension_match) {
            return Verdict::Excluded(ExclusionReason::NoIncludeMatch);
        }

        if !self.rules.include_binary && is_binary(path) {
            return Verdict::Excluded(ExclusionReason::Binary);
        }

        if let Err(msg) = validate_readable(path) {
            return Verdict::Excluded(ExclusionReason::Unreadable(msg));
        }

        Verdict::Included(InclusionReason::PassedFilters)
    }
}

/// Base name of a path as a string
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Whether a path's base name marks it hidden
pub fn is_hidden(path: &Path) -> bool {
    base_name(path).starts_with('.')
}

/// Check that a path is an existing, readable regular file
pub fn validate_readable(path: &Path) -> std::result::Result<(), String> {
    let metadata = fs::metadata(path).map_err(|_| "File does not exist".to_string())?;
    if !metadata.is_file() {
        return Err("Path is not a file".to_string());
    }

    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
        _ => format!("Error accessing file: {}", e),
    })?;
    let mut byte = [0u8; 1];
    file.read(&mut byte)
        .map_err(|e| format!("Error accessing file: {}", e))?;
    Ok(())
}
