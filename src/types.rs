/*!
 * Core types and data structures for flatdump
 */

use std::cmp::Ordering;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use strum::Display;

/// Kind of a discovered filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntryKind {
    /// Directory
    Directory,
    /// Regular file
    File,
}

/// Pipeline stage that produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntrySource {
    /// Found by the directory walker
    Walk,
    /// Found by a glob search
    Glob,
    /// Supplied explicitly by the caller
    Explicit,
}

/// One discovered file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Canonical path, used as the identity for deduplication
    pub absolute_path: PathBuf,
    /// Path shown in every output and used for ordering
    pub display_path: PathBuf,
    /// File or directory
    pub kind: EntryKind,
    /// Distance from the root used to reach the entry (root = 1)
    pub depth: usize,
    /// Stage that produced the entry
    pub source: EntrySource,
}

impl Entry {
    /// Create a directory entry
    pub fn directory(
        absolute_path: PathBuf,
        display_path: PathBuf,
        depth: usize,
        source: EntrySource,
    ) -> Self {
        Self {
            absolute_path,
            display_path,
            kind: EntryKind::Directory,
            depth,
            source,
        }
    }

    /// Create a file entry
    pub fn file(
        absolute_path: PathBuf,
        display_path: PathBuf,
        depth: usize,
        source: EntrySource,
    ) -> Self {
        Self {
            absolute_path,
            display_path,
            kind: EntryKind::File,
            depth,
            source,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Display path rendered with `/` separators
    pub fn display(&self) -> String {
        display_string(&self.display_path)
    }

    /// Base name of the entry
    pub fn name(&self) -> String {
        self.absolute_path
            .file_name()
            .or_else(|| self.display_path.file_name())
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// Render a relative path with `/` separators regardless of platform
pub fn display_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            Component::RootDir => Some(String::new()),
            Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().to_string()),
            Component::CurDir | Component::ParentDir => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Compare two entries in output order.
///
/// Display paths are compared component by component, case-insensitively.
/// At each level a directory (or a component that leads further down) sorts
/// before a file, and a parent always precedes everything beneath it, so the
/// result reads as a pre-order listing of the tree.
pub fn entry_order(a: &Entry, b: &Entry) -> Ordering {
    let a_parts: Vec<String> = path_parts(&a.display_path);
    let b_parts: Vec<String> = path_parts(&b.display_path);

    for (i, (left, right)) in a_parts.iter().zip(b_parts.iter()).enumerate() {
        let left_is_file = a.is_file() && i + 1 == a_parts.len();
        let right_is_file = b.is_file() && i + 1 == b_parts.len();

        let ordering = left_is_file
            .cmp(&right_is_file)
            .then_with(|| left.to_lowercase().cmp(&right.to_lowercase()))
            .then_with(|| left.cmp(right));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a_parts
        .len()
        .cmp(&b_parts.len())
        .then_with(|| a.is_file().cmp(&b.is_file()))
        .then_with(|| a.absolute_path.cmp(&b.absolute_path))
}

fn path_parts(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            Component::RootDir => Some("/".to_string()),
            _ => None,
        })
        .collect()
}

/// Why a file was let through the filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InclusionReason {
    /// `include_all` is set and nothing excluded the file
    IncludeAll,
    /// Every filter passed
    PassedFilters,
}

impl fmt::Display for InclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncludeAll => write!(f, "include_all enabled"),
            Self::PassedFilters => write!(f, "passed all filters"),
        }
    }
}

/// Why a file was rejected by the filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Base name starts with a dot and hidden files are not included
    Hidden,
    /// Lies under one of the ignored directories
    IgnoredDirectory(PathBuf),
    /// Base name matches an exclude pattern
    ExcludePattern(String),
    /// Extension is in the exclude list
    ExcludedExtension(String),
    /// Content looks binary and binary files are not included
    Binary,
    /// Neither include patterns nor include extensions were declared
    NoIncludeCriteria,
    /// Include criteria exist but none matched
    NoIncludeMatch,
    /// The file could not be opened or read
    Unreadable(String),
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hidden => write!(f, "hidden file"),
            Self::IgnoredDirectory(dir) => write!(f, "in ignored directory {}", dir.display()),
            Self::ExcludePattern(pattern) => write!(f, "matches exclude pattern '{}'", pattern),
            Self::ExcludedExtension(ext) => write!(f, "has excluded extension '{}'", ext),
            Self::Binary => write!(f, "binary file (use --include-binary to include)"),
            Self::NoIncludeCriteria => write!(f, "no include criteria specified"),
            Self::NoIncludeMatch => write!(f, "does not match any include criteria"),
            Self::Unreadable(msg) => write!(f, "file validation failed: {}", msg),
        }
    }
}

/// Outcome of evaluating one file against the filter rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Included(InclusionReason),
    Excluded(ExclusionReason),
}

impl Verdict {
    pub fn is_included(&self) -> bool {
        matches!(self, Self::Included(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Included(reason) => reason.fmt(f),
            Self::Excluded(reason) => reason.fmt(f),
        }
    }
}

/// A file the pipeline looked at and rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub path: PathBuf,
    pub reason: ExclusionReason,
}

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

/// A message produced during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub path: Option<PathBuf>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.level, path.display(), self.message),
            None => write!(f, "[{}] {}", self.level, self.message),
        }
    }
}

/// Side channel for everything discovery wants to report.
///
/// Every record is mirrored to `tracing` at the matching level.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
    exclusions: Vec<Exclusion>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(&mut self, path: Option<&Path>, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(path = ?path, "{}", message);
        self.push(Level::Debug, path, message);
    }

    pub fn info(&mut self, path: Option<&Path>, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(path = ?path, "{}", message);
        self.push(Level::Info, path, message);
    }

    pub fn warn(&mut self, path: Option<&Path>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(path = ?path, "{}", message);
        self.push(Level::Warning, path, message);
    }

    pub fn error(&mut self, path: Option<&Path>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(path = ?path, "{}", message);
        self.push(Level::Error, path, message);
    }

    /// Record a rejected file
    pub fn exclude(&mut self, path: &Path, reason: ExclusionReason) {
        tracing::debug!("Excluding file: {} ({})", path.display(), reason);
        self.exclusions.push(Exclusion {
            path: path.to_path_buf(),
            reason,
        });
    }

    fn push(&mut self, level: Level, path: Option<&Path>, message: String) {
        self.messages.push(Diagnostic {
            level,
            path: path.map(Path::to_path_buf),
            message,
        });
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    /// Messages at or above the given level
    pub fn at_least(&self, level: Level) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(move |d| d.level >= level)
    }
}

/// Result of one discovery run
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Ordered, deduplicated entries
    pub entries: Vec<Entry>,
    /// What happened along the way
    pub diagnostics: Diagnostics,
}

impl Discovery {
    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.is_file())
    }

    pub fn directories(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.is_dir())
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    pub fn dir_count(&self) -> usize {
        self.directories().count()
    }
}
