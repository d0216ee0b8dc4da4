/*!
 * Recursive directory traversal
 */

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::filter::FilterEngine;
use crate::types::{entry_order, Diagnostics, Entry, EntrySource, Verdict};

/// Entries found by a walk, plus how many roots could actually be walked
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub entries: Vec<Entry>,
    pub valid_roots: usize,
}

/// A child of a directory, classified once
struct Child {
    name: String,
    path: PathBuf,
    canonical: PathBuf,
    is_dir: bool,
}

/// Depth-first, pre-order walker over one or more roots
pub struct DirectoryWalker<'a> {
    filter: &'a FilterEngine,
    max_depth: Option<usize>,
    processed: HashSet<PathBuf>,
}

impl<'a> DirectoryWalker<'a> {
    pub fn new(filter: &'a FilterEngine, max_depth: Option<usize>) -> Self {
        Self {
            filter,
            max_depth,
            processed: HashSet::new(),
        }
    }

    /// Walk every root in order and return the sorted entries
    pub fn walk(mut self, roots: &[PathBuf], diagnostics: &mut Diagnostics) -> WalkOutcome {
        let mut outcome = WalkOutcome::default();

        if roots.is_empty() {
            diagnostics.error(None, "No directories provided for scanning.");
            return outcome;
        }

        for root in roots {
            let Some(base_path) = resolve_root(root, diagnostics) else {
                continue;
            };
            outcome.valid_roots += 1;

            if self.filter.should_ignore_directory(&base_path) {
                diagnostics.info(Some(&base_path), "Skipping ignored directory");
                continue;
            }

            diagnostics.info(Some(&base_path), "Scanning directory");
            let display = root_display(&base_path);
            let before = outcome.entries.len();
            self.scan_directory(&base_path, &base_path, &display, 1, &mut outcome.entries, diagnostics);
            tracing::debug!(
                "Root {} contributed {} entries",
                base_path.display(),
                outcome.entries.len() - before
            );
        }

        outcome.entries.sort_by(entry_order);

        let files = outcome.entries.iter().filter(|e| e.is_file()).count();
        diagnostics.info(
            None,
            format!(
                "Found {} files and {} directories",
                files,
                outcome.entries.len() - files
            ),
        );

        outcome
    }

    /// Emit a directory and everything beneath it
    fn scan_directory(
        &mut self,
        path: &Path,
        canonical: &Path,
        display: &Path,
        depth: usize,
        entries: &mut Vec<Entry>,
        diagnostics: &mut Diagnostics,
    ) {
        if !self.processed.insert(canonical.to_path_buf()) {
            tracing::debug!("Already processed: {}", canonical.display());
            return;
        }

        entries.push(Entry::directory(
            canonical.to_path_buf(),
            display.to_path_buf(),
            depth,
            EntrySource::Walk,
        ));

        let children = match self.list_children(path, diagnostics) {
            Some(children) => children,
            None => return,
        };

        let (mut dirs, mut files): (Vec<Child>, Vec<Child>) =
            children.into_iter().partition(|child| child.is_dir);
        dirs.sort_by(|a, b| sort_key(&a.name).cmp(&sort_key(&b.name)));
        files.sort_by(|a, b| sort_key(&a.name).cmp(&sort_key(&b.name)));

        let child_depth = depth + 1;

        for dir in dirs {
            if self.filter.should_ignore_directory(&dir.path) {
                diagnostics.debug(Some(&dir.path), "Ignoring directory");
                continue;
            }

            if self.max_depth.map_or(false, |max| child_depth > max) {
                tracing::debug!("Depth limit reached at {}", dir.path.display());
                continue;
            }

            self.scan_directory(
                &dir.path,
                &dir.canonical,
                &display.join(&dir.name),
                child_depth,
                entries,
                diagnostics,
            );
        }

        for file in files {
            if self.processed.contains(&file.canonical) {
                continue;
            }

            match self.filter.should_include_file(&file.path) {
                Verdict::Included(reason) => {
                    tracing::debug!("Including file: {} ({})", file.path.display(), reason);
                    self.processed.insert(file.canonical.clone());
                    entries.push(Entry::file(
                        file.canonical,
                        display.join(&file.name),
                        child_depth,
                        EntrySource::Walk,
                    ));
                }
                Verdict::Excluded(reason) => diagnostics.exclude(&file.path, reason),
            }
        }
    }

    /// Read and classify the children of a directory.
    ///
    /// Returns `None` when the directory cannot be listed at all.
    fn list_children(&self, path: &Path, diagnostics: &mut Diagnostics) -> Option<Vec<Child>> {
        let mut children = Vec::new();

        for item in WalkDir::new(path).min_depth(1).max_depth(1).follow_links(true) {
            let dir_entry = match item {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    match e.io_error().map(|io| io.kind()) {
                        Some(ErrorKind::PermissionDenied) => {
                            diagnostics.error(Some(path), format!("Permission denied: {}", e))
                        }
                        _ => diagnostics.error(Some(path), format!("Error scanning directory: {}", e)),
                    }
                    return None;
                }
                Err(e) => {
                    let at = e.path().unwrap_or(path).to_path_buf();
                    diagnostics.warn(Some(&at), format!("Error reading directory entry: {}", e));
                    continue;
                }
            };

            // Links are classified by their target
            let file_type = dir_entry.file_type();
            if !file_type.is_dir() && !file_type.is_file() {
                tracing::debug!("Skipping special file: {}", dir_entry.path().display());
                continue;
            }

            let canonical = match fs::canonicalize(dir_entry.path()) {
                Ok(canonical) => canonical,
                Err(e) => {
                    diagnostics.warn(Some(dir_entry.path()), format!("Could not resolve path: {}", e));
                    continue;
                }
            };

            if self.processed.contains(&canonical) {
                tracing::debug!("Skipping already processed path: {}", canonical.display());
                continue;
            }

            children.push(Child {
                name: dir_entry.file_name().to_string_lossy().to_string(),
                is_dir: file_type.is_dir(),
                path: dir_entry.into_path(),
                canonical,
            });
        }

        Some(children)
    }
}

/// Resolve a caller-supplied root, recording why it is unusable
fn resolve_root(root: &Path, diagnostics: &mut Diagnostics) -> Option<PathBuf> {
    let base_path = match fs::canonicalize(root) {
        Ok(path) => path,
        Err(_) => {
            diagnostics.error(Some(root), "Directory does not exist");
            return None;
        }
    };

    if !base_path.is_dir() {
        diagnostics.error(Some(root), "Path is not a directory");
        return None;
    }

    Some(base_path)
}

/// Display path of a root: its own name, so siblings under the root's
/// parent stay distinguishable across several roots
pub fn root_display(root: &Path) -> PathBuf {
    match root.file_name() {
        Some(name) => PathBuf::from(name),
        None => root.to_path_buf(),
    }
}

fn sort_key(name: &str) -> (String, &str) {
    (name.to_lowercase(), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterRules;
    use std::io;
    use tempfile::{Builder, TempDir};

    fn tempdir() -> io::Result<TempDir> {
        Builder::new().prefix("flatdump").tempdir()
    }

    fn include_all() -> FilterEngine {
        FilterEngine::new(FilterRules {
            include_all: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_root_emitted_at_depth_one() -> io::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.txt"), "a")?;
        let filter = include_all();
        let mut diagnostics = Diagnostics::new();

        let outcome = DirectoryWalker::new(&filter, None)
            .walk(&[dir.path().to_path_buf()], &mut diagnostics);

        assert_eq!(outcome.valid_roots, 1);
        assert_eq!(outcome.entries.len(), 2);
        assert!(outcome.entries[0].is_dir());
        assert_eq!(outcome.entries[0].depth, 1);
        assert_eq!(outcome.entries[1].depth, 2);
        Ok(())
    }

    #[test]
    fn test_invalid_roots_are_reported() -> io::Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("plain.txt");
        fs::write(&file, "x")?;
        let filter = include_all();
        let mut diagnostics = Diagnostics::new();

        let outcome = DirectoryWalker::new(&filter, None)
            .walk(&[dir.path().join("missing"), file], &mut diagnostics);

        assert_eq!(outcome.valid_roots, 0);
        assert!(outcome.entries.is_empty());
        assert_eq!(
            diagnostics.at_least(crate::types::Level::Error).count(),
            2
        );
        Ok(())
    }

    #[test]
    fn test_overlapping_roots_do_not_duplicate() -> io::Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("sub"))?;
        fs::write(dir.path().join("sub").join("x.txt"), "x")?;
        let filter = include_all();
        let mut diagnostics = Diagnostics::new();

        let outcome = DirectoryWalker::new(&filter, None).walk(
            &[dir.path().to_path_buf(), dir.path().join("sub")],
            &mut diagnostics,
        );

        let mut paths: Vec<_> = outcome.entries.iter().map(|e| &e.absolute_path).collect();
        let total = paths.len();
        paths.dedup();
        assert_eq!(paths.len(), total);
        assert_eq!(total, 3);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates() -> io::Result<()> {
        let dir = tempdir()?;
        let sub = dir.path().join("sub");
        fs::create_dir(&sub)?;
        fs::write(sub.join("x.txt"), "x")?;
        std::os::unix::fs::symlink(dir.path(), sub.join("loop"))?;
        let filter = include_all();
        let mut diagnostics = Diagnostics::new();

        let outcome = DirectoryWalker::new(&filter, None)
            .walk(&[dir.path().to_path_buf()], &mut diagnostics);

        assert_eq!(outcome.entries.len(), 3);
        Ok(())
    }

    #[test]
    fn test_hidden_root_is_skipped() -> io::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join(".dotfiles");
        fs::create_dir(&root)?;
        fs::write(root.join("a.txt"), "a")?;
        let filter = include_all();
        let mut diagnostics = Diagnostics::new();

        let outcome = DirectoryWalker::new(&filter, None).walk(&[root], &mut diagnostics);

        assert_eq!(outcome.valid_roots, 1);
        assert!(outcome.entries.is_empty());
        Ok(())
    }

    #[test]
    fn test_unlistable_directory_has_no_children() -> io::Result<()> {
        let dir = tempdir()?;
        let filter = include_all();
        let walker = DirectoryWalker::new(&filter, None);
        let mut diagnostics = Diagnostics::new();
        let gone = dir.path().join("removed");

        assert!(walker.list_children(&gone, &mut diagnostics).is_none());
        assert!(diagnostics
            .at_least(crate::types::Level::Error)
            .any(|d| d.message.starts_with("Error scanning directory")));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_does_not_stop_walk() -> io::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.txt"), "a")?;
        fs::write(dir.path().join("z.txt"), "z")?;
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("m.txt"))?;
        let filter = include_all();
        let mut diagnostics = Diagnostics::new();

        let outcome = DirectoryWalker::new(&filter, None)
            .walk(&[dir.path().to_path_buf()], &mut diagnostics);

        let names: Vec<String> = outcome.entries.iter().map(Entry::name).collect();
        assert_eq!(&names[1..], ["a.txt", "z.txt"]);
        assert!(diagnostics
            .at_least(crate::types::Level::Warning)
            .any(|d| d.path.as_deref().map_or(false, |p| p.ends_with("m.txt"))));
        Ok(())
    }
}
