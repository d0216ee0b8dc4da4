/*!
 * Console report of a finished dump
 *
 * Renders the run summary and the largest files with tabled.
 */

use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::concat::{ConcatStats, FileStats};
use crate::tokens::TokenEncoding;
use crate::utils::format_file_size;

/// Number of files listed when there are too many to show them all
const TOP_FILES: usize = 10;
/// Above this many files only the largest are listed
const FULL_LISTING_LIMIT: usize = 15;
const MAX_PATH_WIDTH: usize = 60;

/// What the console report shows for one run
#[derive(Debug, Clone)]
pub struct DumpReport {
    /// Where the output went
    pub output: String,
    /// Archive created from the output, if any
    pub archive: Option<String>,
    /// Size of the output file in bytes, when written to disk
    pub output_size: Option<u64>,
    pub duration: Duration,
    pub files_found: usize,
    pub directories_found: usize,
    pub encoding: TokenEncoding,
    /// Content statistics; absent when no content was written
    pub stats: Option<ConcatStats>,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "File Path")]
    path: String,
    #[tabled(rename = "Lines")]
    lines: String,
    #[tabled(rename = "Tokens")]
    tokens: String,
}

/// Renders `DumpReport`s as console tables
#[derive(Debug, Default)]
pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// Abbreviate large counts as `1.2K` / `3.4M`
    pub fn format_number(num: usize) -> String {
        if num >= 1_000_000 {
            format!("{:.1}M", num as f64 / 1_000_000.0)
        } else if num >= 1_000 {
            format!("{:.1}K", num as f64 / 1_000.0)
        } else {
            num.to_string()
        }
    }

    /// Shorten a display path to `max_len`, keeping its trailing components
    pub fn format_path(path: &str, max_len: usize) -> String {
        if path.chars().count() <= max_len {
            return path.to_string();
        }

        let mut kept = Vec::new();
        let mut width = 3;
        for part in path.split('/').rev() {
            let part_width = part.chars().count() + 1;
            if width + part_width > max_len {
                break;
            }
            kept.push(part);
            width += part_width;
        }

        if kept.is_empty() {
            let tail: String = path
                .chars()
                .rev()
                .take(max_len.saturating_sub(3))
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return format!("...{}", tail);
        }

        kept.reverse();
        format!(".../{}", kept.join("/"))
    }

    fn style(table: &mut Table) {
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));
    }

    fn summary_table(&self, report: &DumpReport) -> String {
        let mut rows = vec![
            SummaryRow {
                key: "Output",
                value: report.output.clone(),
            },
            SummaryRow {
                key: "Process Time",
                value: format!("{:.4?}", report.duration),
            },
            SummaryRow {
                key: "Files Found",
                value: Self::format_number(report.files_found),
            },
            SummaryRow {
                key: "Directories Found",
                value: Self::format_number(report.directories_found),
            },
        ];

        if let Some(size) = report.output_size {
            rows.push(SummaryRow {
                key: "Output Size",
                value: format_file_size(size),
            });
        }

        if let Some(stats) = &report.stats {
            rows.push(SummaryRow {
                key: "Files Written",
                value: format!(
                    "{} ({} skipped)",
                    Self::format_number(stats.files_processed),
                    stats.files_skipped
                ),
            });
            rows.push(SummaryRow {
                key: "Total Lines",
                value: Self::format_number(stats.total_lines),
            });
            rows.push(SummaryRow {
                key: "Total Characters",
                value: Self::format_number(stats.total_chars),
            });
            rows.push(SummaryRow {
                key: "LLM Tokens",
                value: format!(
                    "{} ({})",
                    Self::format_number(stats.total_tokens),
                    report.encoding.description()
                ),
            });
        }

        if let Some(archive) = &report.archive {
            rows.push(SummaryRow {
                key: "Archive",
                value: archive.clone(),
            });
        }

        let mut table = Table::new(rows);
        Self::style(&mut table);
        table.to_string()
    }

    fn files_table(&self, files: &[FileStats]) -> String {
        let mut sorted: Vec<&FileStats> = files.iter().collect();
        sorted.sort_by(|a, b| b.chars.cmp(&a.chars).then_with(|| a.path.cmp(&b.path)));
        if sorted.len() > FULL_LISTING_LIMIT {
            sorted.truncate(TOP_FILES);
        }

        let rows: Vec<FileRow> = sorted
            .into_iter()
            .map(|file| FileRow {
                path: Self::format_path(&file.path, MAX_PATH_WIDTH),
                lines: Self::format_number(file.lines),
                tokens: Self::format_number(file.tokens),
            })
            .collect();

        let mut table = Table::new(rows);
        Self::style(&mut table);
        table.to_string()
    }

    /// Render the report, file table first when there is one
    pub fn generate_report(&self, report: &DumpReport) -> String {
        let summary = format!("DUMP COMPLETE\n{}", self.summary_table(report));

        match &report.stats {
            Some(stats) if !stats.file_details.is_empty() => {
                let title = if stats.file_details.len() > FULL_LISTING_LIMIT {
                    "TOP 10 LARGEST FILES BY CHARACTER COUNT"
                } else {
                    "PROCESSED FILES"
                };
                format!("{}\n{}\n\n{}", title, self.files_table(&stats.file_details), summary)
            }
            _ => summary,
        }
    }

    /// Print the report to stderr, keeping stdout free for piped output
    pub fn print_report(&self, report: &DumpReport) {
        eprintln!("\n{}", self.generate_report(report));
    }
}
