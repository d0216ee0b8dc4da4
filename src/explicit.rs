/*!
 * Caller-specified files that bypass the filter rules
 */

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::filter::validate_readable;
use crate::types::{Diagnostics, Entry, EntrySource};

/// Adds explicitly requested files to an entry list
pub struct ExplicitFileMerger<'a> {
    base_dir: &'a Path,
}

impl<'a> ExplicitFileMerger<'a> {
    /// `base_dir` should already be absolute; relative explicit paths are
    /// resolved against it
    pub fn new(base_dir: &'a Path) -> Self {
        Self { base_dir }
    }

    /// Append every valid explicit file not already present in `entries`
    pub fn merge(
        &self,
        mut entries: Vec<Entry>,
        files: &[PathBuf],
        diagnostics: &mut Diagnostics,
    ) -> Vec<Entry> {
        if files.is_empty() {
            return entries;
        }

        let mut existing: HashSet<PathBuf> =
            entries.iter().map(|e| e.absolute_path.clone()).collect();
        let mut added = 0;

        for requested in files {
            if requested.as_os_str().is_empty() {
                continue;
            }

            let joined = if requested.is_absolute() {
                requested.clone()
            } else {
                self.base_dir.join(requested)
            };

            let resolved = match fs::canonicalize(&joined) {
                Ok(path) => path,
                Err(_) => {
                    diagnostics.warn(
                        Some(requested),
                        "Cannot include file: File does not exist",
                    );
                    continue;
                }
            };

            if let Err(msg) = validate_readable(&resolved) {
                diagnostics.warn(Some(requested), format!("Cannot include file: {}", msg));
                continue;
            }

            if !existing.insert(resolved.clone()) {
                tracing::debug!("File already included: {}", resolved.display());
                continue;
            }

            let display = match resolved.strip_prefix(self.base_dir) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => PathBuf::from(resolved.file_name().unwrap_or_default()),
            };
            let depth = resolved
                .components()
                .count()
                .saturating_sub(self.base_dir.components().count());

            diagnostics.info(Some(&display), "Added included file");
            entries.push(Entry::file(resolved, display, depth, EntrySource::Explicit));
            added += 1;
        }

        if added > 0 {
            diagnostics.info(None, format!("Added {} specifically included files", added));
        }

        entries
    }
}
