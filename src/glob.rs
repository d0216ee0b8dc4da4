/*!
 * Glob searches beneath the root directories
 */

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::filter::FilterEngine;
use crate::types::{Diagnostics, Entry, EntrySource, Verdict};
use crate::walker::root_display;

/// Marker that makes a pattern recursive on its own
const RECURSIVE_MARKER: &str = "**";

/// Resolves glob patterns against root directories, independently of the walker
pub struct GlobMatcher<'a> {
    filter: &'a FilterEngine,
}

impl<'a> GlobMatcher<'a> {
    pub fn new(filter: &'a FilterEngine) -> Self {
        Self { filter }
    }

    /// Find every regular file under `roots` matching one of `patterns`
    pub fn find(
        &self,
        roots: &[PathBuf],
        patterns: &[String],
        diagnostics: &mut Diagnostics,
    ) -> Vec<Entry> {
        let mut matches = Vec::new();
        if patterns.is_empty() {
            return matches;
        }

        let Some(set) = build_set(patterns, diagnostics) else {
            return matches;
        };

        let mut processed = HashSet::new();

        for root in roots {
            let base_path = match fs::canonicalize(root) {
                Ok(path) if path.is_dir() => path,
                _ => {
                    diagnostics.warn(Some(root), "Invalid directory for glob search");
                    continue;
                }
            };

            if self.filter.should_ignore_directory(&base_path) {
                diagnostics.debug(Some(&base_path), "Skipping ignored directory for glob");
                continue;
            }

            tracing::debug!("Applying glob patterns in: {}", base_path.display());
            let before = matches.len();
            self.search_root(&base_path, &set, &mut processed, &mut matches, diagnostics);
            tracing::debug!(
                "Found {} glob matches in {}",
                matches.len() - before,
                base_path.display()
            );
        }

        diagnostics.info(
            None,
            format!("Found {} files matching glob patterns", matches.len()),
        );
        matches
    }

    fn search_root(
        &self,
        base_path: &Path,
        set: &GlobSet,
        processed: &mut HashSet<PathBuf>,
        matches: &mut Vec<Entry>,
        diagnostics: &mut Diagnostics,
    ) {
        let display_root = root_display(base_path);
        let walker = WalkDir::new(base_path)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e.file_type().is_dir()
                    || self.filter.ignored_ancestor(e.path()).is_none()
            });

        for item in walker {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    diagnostics.warn(e.path(), format!("Error during glob search: {}", e));
                    continue;
                }
            };

            if !item.path().is_file() {
                continue;
            }

            let Ok(relative) = item.path().strip_prefix(base_path) else {
                continue;
            };
            if !set.is_match(relative) {
                continue;
            }

            let canonical = match fs::canonicalize(item.path()) {
                Ok(path) => path,
                Err(e) => {
                    diagnostics.warn(Some(item.path()), format!("Could not resolve glob match: {}", e));
                    continue;
                }
            };

            if processed.contains(&canonical) {
                continue;
            }

            match self.filter.should_include_file(item.path()) {
                Verdict::Included(_) => {
                    tracing::debug!("Added glob match: {}", canonical.display());
                    processed.insert(canonical.clone());
                    matches.push(Entry::file(
                        canonical,
                        display_root.join(relative),
                        relative.components().count() + 1,
                        EntrySource::Glob,
                    ));
                }
                Verdict::Excluded(reason) => {
                    tracing::debug!("Glob match excluded: {} ({})", item.path().display(), reason);
                    diagnostics.exclude(item.path(), reason);
                }
            }
        }
    }
}

/// Anchor a pattern for a search of all subdirectories
pub fn anchored(pattern: &str) -> String {
    if pattern.contains(RECURSIVE_MARKER) {
        pattern.to_string()
    } else {
        format!("{}/{}", RECURSIVE_MARKER, pattern)
    }
}

/// Compile the usable patterns; malformed ones are reported and dropped
fn build_set(patterns: &[String], diagnostics: &mut Diagnostics) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = 0;

    for pattern in patterns {
        match GlobBuilder::new(&anchored(pattern))
            .literal_separator(true)
            .build()
        {
            Ok(glob) => {
                builder.add(glob);
                added += 1;
            }
            Err(e) => diagnostics.error(None, format!("Invalid glob pattern '{}': {}", pattern, e)),
        }
    }

    if added == 0 {
        return None;
    }

    match builder.build() {
        Ok(set) => Some(set),
        Err(e) => {
            diagnostics.error(None, format!("Failed to build glob set: {}", e));
            None
        }
    }
}
