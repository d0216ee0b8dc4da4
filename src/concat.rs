/*!
 * Content concatenation and file manifests
 */

use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use chrono::Local;
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;

use crate::binary::is_binary;
use crate::tokens::TokenCounter;
use crate::types::Entry;
use crate::utils::format_thousands;

/// Maximum number of errors listed in the summary
const MAX_LISTED_ERRORS: usize = 10;

/// Per-file statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileStats {
    /// Display path of the file
    pub path: String,
    pub lines: usize,
    pub chars: usize,
    pub tokens: usize,
}

/// Statistics for one concatenation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConcatStats {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub total_lines: usize,
    pub total_chars: usize,
    pub total_tokens: usize,
    pub errors: Vec<String>,
    pub file_details: Vec<FileStats>,
}

impl ConcatStats {
    /// Count a file whose content was written
    pub fn record_file(&mut self, path: String, content: &str, tokens: usize) -> &FileStats {
        let stats = FileStats {
            path,
            lines: content.lines().count(),
            chars: content.chars().count(),
            tokens,
        };
        self.files_processed += 1;
        self.total_lines += stats.lines;
        self.total_chars += stats.chars;
        self.total_tokens += stats.tokens;
        self.file_details.push(stats);
        &self.file_details[self.file_details.len() - 1]
    }

    /// Count a file that could not be written
    pub fn record_error(&mut self, path: &str, message: &str) {
        self.files_skipped += 1;
        self.errors.push(format!("{}: {}", path, message));
    }
}

/// A file's content, loaded and ready to write
#[derive(Debug)]
pub struct LoadedFile<'e> {
    pub entry: &'e Entry,
    pub content: Result<String, String>,
}

/// Concatenates file contents in entry order
pub struct Concatenator<'a> {
    counter: &'a TokenCounter,
    clean: bool,
    /// Progress bar advanced once per loaded file
    pub progress: Arc<ProgressBar>,
}

impl<'a> Concatenator<'a> {
    pub fn new(counter: &'a TokenCounter, clean: bool) -> Self {
        Self {
            counter,
            clean,
            progress: Arc::new(ProgressBar::hidden()),
        }
    }

    pub fn with_progress(mut self, progress: Arc<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    /// Load every file entry in parallel, keeping entry order
    pub fn load<'e>(&self, entries: &'e [Entry]) -> Vec<LoadedFile<'e>> {
        let files: Vec<&Entry> = entries.iter().filter(|e| e.is_file()).collect();
        self.progress.set_length(files.len() as u64);

        files
            .par_iter()
            .map(|&entry| {
                let content = self.load_one(entry);
                self.progress.inc(1);
                LoadedFile { entry, content }
            })
            .collect()
    }

    /// Token count of loaded content
    pub fn count_tokens(&self, content: &str) -> usize {
        self.counter.count(content)
    }

    fn load_one(&self, entry: &Entry) -> Result<String, String> {
        if is_binary(&entry.absolute_path) {
            tracing::warn!("Skipping binary file: {}", entry.display());
            return Err("Binary file".to_string());
        }

        let bytes = fs::read(&entry.absolute_path).map_err(|e| {
            tracing::error!("Error reading {}: {}", entry.absolute_path.display(), e);
            e.to_string()
        })?;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        Ok(if self.clean {
            clean_content(&content)
        } else {
            content
        })
    }

    /// Write the `## File Data` section followed by a summary
    pub fn write<W: Write>(&self, entries: &[Entry], out: &mut W) -> io::Result<ConcatStats> {
        let mut stats = ConcatStats::default();
        let loaded = self.load(entries);

        if loaded.is_empty() {
            tracing::warn!("No files found in file list");
            out.write_all(b"## File Data\n(No files found)\n\n")?;
            return Ok(stats);
        }

        tracing::info!("Starting concatenation of {} files", loaded.len());
        out.write_all(b"## File Data\n")?;

        for file in &loaded {
            let display = file.entry.display();
            match &file.content {
                Ok(content) => {
                    let tokens = self.counter.count(content);
                    let recorded = stats.record_file(display.clone(), content, tokens);
                    write!(
                        out,
                        "--- File: {}\n--- Characters: {}\n--- Token Count: {}\n",
                        display,
                        format_thousands(recorded.chars),
                        format_thousands(recorded.tokens)
                    )?;
                    out.write_all(content.as_bytes())?;
                    out.write_all(b"\n\n")?;
                }
                Err(message) => {
                    write!(
                        out,
                        "--- File: {}\n--- Error: {}\n--- Content: <Unable to read file>\n\n",
                        display, message
                    )?;
                    stats.record_error(&display, message);
                }
            }
        }

        write_summary(&stats, out)?;
        tracing::info!(
            "Concatenation complete. Processed: {}, Skipped: {}",
            stats.files_processed,
            stats.files_skipped
        );

        Ok(stats)
    }
}

fn write_summary<W: Write>(stats: &ConcatStats, out: &mut W) -> io::Result<()> {
    writeln!(out, "\n## Concatenation Summary")?;
    writeln!(out, "Files processed: {}", stats.files_processed)?;
    writeln!(out, "Files skipped: {}", stats.files_skipped)?;
    writeln!(out, "Total characters: {}", format_thousands(stats.total_chars))?;
    writeln!(out, "Total tokens: {}", format_thousands(stats.total_tokens))?;

    if !stats.errors.is_empty() {
        writeln!(out, "\n### Errors ({}):", stats.errors.len())?;
        for error in stats.errors.iter().take(MAX_LISTED_ERRORS) {
            writeln!(out, "- {}", error)?;
        }
        if stats.errors.len() > MAX_LISTED_ERRORS {
            writeln!(out, "... and {} more errors", stats.errors.len() - MAX_LISTED_ERRORS)?;
        }
    }

    write!(
        out,
        "\nCompleted at: {}\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

/// Write a `## File Manifest` listing files with their sizes, no content
pub fn write_manifest<W: Write>(entries: &[Entry], out: &mut W) -> io::Result<()> {
    out.write_all(b"## File Manifest\n")?;

    let files: Vec<&Entry> = entries.iter().filter(|e| e.is_file()).collect();
    if files.is_empty() {
        return out.write_all(b"(No files found)\n\n");
    }

    let mut total_size = 0u64;
    for (i, entry) in files.iter().enumerate() {
        match fs::metadata(&entry.absolute_path) {
            Ok(metadata) => {
                total_size += metadata.len();
                let marker = if is_binary(&entry.absolute_path) {
                    " [BINARY]"
                } else {
                    ""
                };
                writeln!(
                    out,
                    "{:3}. {} ({} bytes){}",
                    i + 1,
                    entry.display(),
                    format_thousands(metadata.len() as usize),
                    marker
                )?;
            }
            Err(e) => writeln!(out, "{:3}. {} (ERROR: {})", i + 1, entry.display(), e)?,
        }
    }

    write!(
        out,
        "\nTotal: {} files, {} bytes\n\n",
        files.len(),
        format_thousands(total_size as usize)
    )
}

/// Normalize whitespace while keeping indentation.
///
/// Trailing whitespace is stripped from every line, runs of blank lines are
/// capped at two and trailing blank lines are dropped.
pub fn clean_content(content: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut consecutive_empty = 0;

    for line in content.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            consecutive_empty += 1;
            if consecutive_empty <= 2 {
                lines.push("");
            }
        } else {
            consecutive_empty = 0;
            lines.push(trimmed);
        }
    }

    while lines.last().map_or(false, |line| line.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntrySource;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_clean_content() {
        let raw = "def f():   \n    return 1\t\n\n\n\n\nx = 2\n\n\n";
        assert_eq!(clean_content(raw), "def f():\n    return 1\n\n\nx = 2");
    }

    #[test]
    fn test_concatenation_format() -> io::Result<()> {
        let dir = tempdir()?;
        let text = dir.path().join("a.py");
        let blob = dir.path().join("b.dat");
        fs::write(&text, "print('hi')   \n")?;
        fs::write(&blob, [0u8, 1, 2])?;

        let entries = vec![
            Entry::file(text, PathBuf::from("p/a.py"), 2, EntrySource::Walk),
            Entry::file(blob, PathBuf::from("p/b.dat"), 2, EntrySource::Walk),
        ];
        let counter = TokenCounter::heuristic();
        let mut out = Vec::new();
        let stats = Concatenator::new(&counter, true).write(&entries, &mut out)?;
        let output = String::from_utf8_lossy(&out);

        assert!(output.starts_with("## File Data\n--- File: p/a.py\n--- Characters: 11\n"));
        assert!(output.contains("print('hi')\n\n"));
        assert!(output.contains("--- File: p/b.dat\n--- Error: Binary file\n"));
        assert!(output.contains("## Concatenation Summary\nFiles processed: 1\nFiles skipped: 1\n"));
        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.file_details[0].lines, 1);
        Ok(())
    }

    #[test]
    fn test_empty_concatenation() -> io::Result<()> {
        let counter = TokenCounter::heuristic();
        let mut out = Vec::new();
        Concatenator::new(&counter, true).write(&[], &mut out)?;
        assert_eq!(String::from_utf8_lossy(&out), "## File Data\n(No files found)\n\n");
        Ok(())
    }

    #[test]
    fn test_manifest() -> io::Result<()> {
        let dir = tempdir()?;
        let text = dir.path().join("a.txt");
        fs::write(&text, "hello")?;
        let entries = vec![Entry::file(text, PathBuf::from("a.txt"), 2, EntrySource::Walk)];

        let mut out = Vec::new();
        write_manifest(&entries, &mut out)?;
        assert_eq!(
            String::from_utf8_lossy(&out),
            "## File Manifest\n  1. a.txt (5 bytes)\n\nTotal: 1 files, 5 bytes\n\n"
        );
        Ok(())
    }
}
