/*!
 * Configuration handling for flatdump
 */

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use clap_complete::Shell;
use strum::Display;

use crate::archive::ArchiveFormat;
use crate::discovery::DiscoveryOptions;
use crate::error::{FlatdumpError, Result};
use crate::filter::compile_pattern;
use crate::tokens::TokenEncoding;
use crate::utils::{self, clean_list, is_stdio};

/// Layout of the generated output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown-style sections: tree, outline, file data
    #[default]
    Text,
    /// `<directory_scan>` XML document
    Xml,
    /// One JSON object with entries and totals
    Json,
}

/// Command-line arguments for flatdump
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "flatdump",
    version = env!("CARGO_PKG_VERSION"),
    about = "Flatten a source tree into a single file for LLM context",
    long_about = "Discovers files under one or more directories, filters them by extension, pattern, \
                  visibility and content type, and writes a directory tree, optional Python outline \
                  and the concatenated contents to one output file."
)]
pub struct Args {
    /// Directories to scan
    #[clap(default_value = ".")]
    pub directories: Vec<String>,

    /// Comma-separated extensions to include, without the dot
    #[clap(short = 'e', long, value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Comma-separated extensions to exclude
    #[clap(long, value_delimiter = ',')]
    pub exclude_extensions: Vec<String>,

    /// Comma-separated glob patterns to include, searched beneath every directory
    #[clap(short = 'g', long, value_delimiter = ',')]
    pub glob: Vec<String>,

    /// Comma-separated base-name patterns to exclude
    #[clap(long, value_delimiter = ',')]
    pub exclude_patterns: Vec<String>,

    /// Comma-separated files to include regardless of filters
    #[clap(short = 'f', long, value_delimiter = ',')]
    pub include_files: Vec<String>,

    /// Comma-separated directories to skip
    #[clap(short = 'i', long, value_delimiter = ',')]
    pub ignore_dirs: Vec<String>,

    /// Output file, or `stdio` / `-` for stdout [default: <current dir>.flatdump.txt]
    #[clap(short = 'o', long)]
    pub output: Option<String>,

    /// Archive the output file after writing it
    #[clap(short = 'z', long, value_enum)]
    pub archive: Option<ArchiveFormat>,

    /// Include every file that passes the exclusion rules
    #[clap(short = 'a', long)]
    pub all: bool,

    /// Include hidden files and directories
    #[clap(short = 'H', long)]
    pub hidden: bool,

    /// Include binary files
    #[clap(long)]
    pub include_binary: bool,

    /// Deepest directory level to descend into (the root is level 1)
    #[clap(long)]
    pub max_depth: Option<usize>,

    /// Generate an outline of Python files
    #[clap(short = 'O', long)]
    pub outline: bool,

    /// Do not write file contents
    #[clap(short = 'n', long)]
    pub no_dump: bool,

    /// Do not write the directory tree
    #[clap(short = 't', long)]
    pub no_tree: bool,

    /// List files with their sizes instead of their contents
    #[clap(long)]
    pub manifest: bool,

    /// Keep file contents as they are, without whitespace cleanup
    #[clap(long)]
    pub no_clean: bool,

    /// Write the configuration at the top of the output
    #[clap(long)]
    pub show_config: bool,

    /// Output layout
    #[clap(long, value_enum, default_value_t = OutputFormat::default())]
    pub format: OutputFormat,

    /// Token encoding used for statistics
    #[clap(long, value_enum, default_value_t = TokenEncoding::default())]
    pub tokenizer: TokenEncoding,

    /// Number of threads used to read files
    #[clap(long, default_value = "4")]
    pub threads: usize,

    /// Log progress at info level
    #[clap(short = 'v', long)]
    pub verbose: bool,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Everything discovery needs
    pub discovery: DiscoveryOptions,

    /// Output target as given, `stdio` for stdout
    pub output: String,

    pub format: OutputFormat,
    pub archive: Option<ArchiveFormat>,
    pub tree: bool,
    pub outline: bool,
    pub dump: bool,
    pub manifest: bool,
    pub clean_content: bool,
    pub show_config: bool,
    pub encoding: TokenEncoding,

    /// Number of threads to use for reading files
    pub num_threads: usize,

    pub verbose: bool,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args(args: Args) -> Self {
        let globs = clean_list(&args.glob);

        let discovery = DiscoveryOptions {
            roots: args.directories.iter().map(PathBuf::from).collect(),
            include_extensions: args.extensions,
            exclude_extensions: args.exclude_extensions,
            include_patterns: globs.clone(),
            exclude_patterns: clean_list(&args.exclude_patterns),
            glob_patterns: globs,
            include_all: args.all,
            include_hidden: args.hidden,
            include_binary: args.include_binary,
            ignore_dirs: clean_list(&args.ignore_dirs)
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            explicit_files: clean_list(&args.include_files)
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            max_depth: args.max_depth,
            base_dir: None,
        };

        Self {
            discovery,
            output: args.output.unwrap_or_else(utils::default_output_name),
            format: args.format,
            archive: args.archive,
            tree: !args.no_tree,
            outline: args.outline,
            dump: !args.no_dump,
            manifest: args.manifest,
            clean_content: !args.no_clean,
            show_config: args.show_config,
            encoding: args.tokenizer,
            num_threads: args.threads,
            verbose: args.verbose,
        }
    }

    /// Whether output goes to stdout
    pub fn writes_to_stdout(&self) -> bool {
        is_stdio(&self.output)
    }

    /// Absolute output path, `None` for stdout
    pub fn output_path(&self) -> Option<PathBuf> {
        if self.writes_to_stdout() {
            None
        } else {
            Some(utils::sanitize_output_path(&self.output, None))
        }
    }

    /// Check the configuration for problems before anything is written
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let options = &self.discovery;

        if options.include_extensions.is_empty()
            && !options.include_all
            && options.glob_patterns.is_empty()
            && options.explicit_files.is_empty()
        {
            report.fail(
                ValidationIssue::NoInclusionCriteria,
                "No extensions or glob provided and --all flag not set. No files to process. \
                 Use --extensions, --glob, --include-files or --all to specify what to include.",
            );
        }

        for root in &options.roots {
            if !root.exists() {
                report.fail(
                    ValidationIssue::DirectoryNotFound,
                    format!("Directory does not exist: {}", root.display()),
                );
            } else if !root.is_dir() {
                report.fail(
                    ValidationIssue::PathNotDirectory,
                    format!("Path is not a directory: {}", root.display()),
                );
            } else if fs::read_dir(root).is_err() {
                report.fail(
                    ValidationIssue::DirectoryNotReadable,
                    format!("Directory is not readable: {}", root.display()),
                );
            }
        }

        let base_dir = options.resolved_base_dir();
        for file in &options.explicit_files {
            let full_path = resolve_against(file, &base_dir);
            if !full_path.exists() {
                report.fail(
                    ValidationIssue::FileNotFound,
                    format!(
                        "Include file does not exist: {} (resolved to: {})",
                        file.display(),
                        full_path.display()
                    ),
                );
            } else if !full_path.is_file() {
                report.fail(
                    ValidationIssue::PathNotFile,
                    format!("Include path is not a file: {}", file.display()),
                );
            } else if fs::File::open(&full_path).is_err() {
                report.fail(
                    ValidationIssue::FileNotReadable,
                    format!("Include file is not readable: {}", file.display()),
                );
            }
        }

        for dir in &options.ignore_dirs {
            let full_path = resolve_against(dir, &base_dir);
            if !full_path.exists() {
                report.warn(format!(
                    "Ignore directory does not exist (will be skipped): {}",
                    dir.display()
                ));
            } else if !full_path.is_dir() {
                report.fail(
                    ValidationIssue::PathNotDirectory,
                    format!("Ignore path is not a directory: {}", dir.display()),
                );
            }
        }

        for pattern in &options.glob_patterns {
            if let Err(e) = compile_pattern(pattern) {
                report.fail(
                    ValidationIssue::InvalidGlobPattern,
                    format!("Invalid glob pattern '{}': {}", pattern, e),
                );
            }
        }

        for pattern in &options.exclude_patterns {
            if let Err(e) = compile_pattern(pattern) {
                report.fail(
                    ValidationIssue::InvalidExcludePattern,
                    format!("Invalid exclude pattern '{}': {}", pattern, e),
                );
            }
        }

        check_extensions(&mut report, &options.include_extensions, "extensions");
        check_extensions(&mut report, &options.exclude_extensions, "exclude-extensions");

        if options.max_depth == Some(0) {
            report.fail(
                ValidationIssue::InvalidMaxDepth,
                "Max depth must be positive: 0",
            );
        }

        if self.num_threads == 0 {
            report.fail(
                ValidationIssue::ConflictingOptions,
                "Thread count must be at least 1",
            );
        }

        if self.manifest && !self.dump {
            report.warn("--manifest has no effect together with --no-dump");
        }

        if self.format != OutputFormat::Text && (self.outline || self.manifest || self.show_config)
        {
            report.warn(format!(
                "--outline, --manifest and --show-config only apply to text output, not {}",
                self.format
            ));
        }

        match self.output_path() {
            None => {
                if self.archive.is_some() {
                    report.fail(
                        ValidationIssue::ArchiveWithStdio,
                        "Cannot create archive when output is stdio",
                    );
                }
            }
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if parent.exists() && !parent.is_dir() {
                        report.fail(
                            ValidationIssue::OutputNotWritable,
                            format!("Output directory is not a directory: {}", parent.display()),
                        );
                    } else if parent.exists()
                        && fs::metadata(parent).map_or(false, |m| m.permissions().readonly())
                    {
                        report.fail(
                            ValidationIssue::OutputNotWritable,
                            format!("Output directory is not writable: {}", parent.display()),
                        );
                    }
                }
            }
        }

        report
    }

    /// `## Flatdump Configuration` block written with `--show-config`
    pub fn describe(&self) -> String {
        let options = &self.discovery;
        let join = |items: &[String]| items.join(", ");
        let join_paths = |items: &[PathBuf]| {
            items
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let cwd = env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| ".".to_string());
        let output = self
            .output_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| utils::STDIO.to_string());

        let mut lines = vec![
            "## Flatdump Configuration".to_string(),
            format!("Working Directory: {}", cwd),
            format!("Output File: {}", output),
            format!("Target Directories: {}", join_paths(&options.effective_roots())),
            String::new(),
        ];

        let mut inclusion = Vec::new();
        if options.include_all {
            inclusion.push("All files (--all)".to_string());
        }
        if !options.include_extensions.is_empty() {
            inclusion.push(format!("Extensions: {}", join(&options.include_extensions)));
        }
        if !options.include_patterns.is_empty() {
            inclusion.push(format!("Include patterns: {}", join(&options.include_patterns)));
        }
        if !options.explicit_files.is_empty() {
            inclusion.push(format!("Specific files: {}", join_paths(&options.explicit_files)));
        }
        push_section(&mut lines, "Inclusion Criteria", inclusion);

        let mut exclusion = Vec::new();
        if !options.exclude_extensions.is_empty() {
            exclusion.push(format!("Extensions: {}", join(&options.exclude_extensions)));
        }
        if !options.exclude_patterns.is_empty() {
            exclusion.push(format!("Patterns: {}", join(&options.exclude_patterns)));
        }
        if !options.ignore_dirs.is_empty() {
            exclusion.push(format!("Directories: {}", join_paths(&options.ignore_dirs)));
        }
        if !options.include_binary {
            exclusion.push("Binary files (use --include-binary to include)".to_string());
        }
        if !options.include_hidden {
            exclusion.push("Hidden files (use --hidden to include)".to_string());
        }
        push_section(&mut lines, "Exclusion Criteria", exclusion);

        let mut processing = Vec::new();
        if let Some(depth) = options.max_depth {
            processing.push(format!("Maximum depth: {}", depth));
        }
        processing.push(format!(
            "Content cleaning: {}",
            enabled(self.clean_content)
        ));
        processing.push(format!("Directory tree: {}", enabled(self.tree)));
        processing.push(format!("Python outline: {}", enabled(self.outline)));
        processing.push(if !self.dump {
            "File concatenation: disabled".to_string()
        } else if self.manifest {
            "File manifest: enabled (no content)".to_string()
        } else {
            "File concatenation: enabled".to_string()
        });
        processing.push(format!("Token encoding: {}", self.encoding));
        if let Some(archive) = self.archive {
            processing.push(format!("Archive format: {}", archive));
        }
        push_section(&mut lines, "Processing Options", processing);

        if options.only_explicit_files() {
            lines.push("### Mode: Specific Files Only".to_string());
            lines.push("Directory scanning disabled - only processing specified files".to_string());
        } else {
            lines.push("### Mode: Directory Scanning".to_string());
            lines.push("Scanning directories with applied filters".to_string());
        }

        lines.extend([String::new(), "---".to_string(), String::new()]);
        lines.join("\n")
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: Vec<String>) {
    if items.is_empty() {
        return;
    }
    lines.push(format!("### {}:", title));
    lines.extend(items.into_iter().map(|item| format!("- {}", item)));
    lines.push(String::new());
}

fn resolve_against(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn check_extensions(report: &mut ValidationReport, extensions: &[String], flag: &str) {
    for ext in extensions {
        let trimmed = ext.trim();
        if trimmed.is_empty() {
            report.fail(
                ValidationIssue::EmptyExtension,
                format!("Empty extension found in --{} list", flag),
            );
        } else if let Some(bare) = trimmed.strip_prefix('.') {
            report.warn(format!(
                "Extension in --{} should not include a dot: '{}' (treated as '{}')",
                flag, trimmed, bare
            ));
        }
    }
}

/// Kinds of configuration problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ValidationIssue {
    NoInclusionCriteria,
    DirectoryNotFound,
    DirectoryNotReadable,
    FileNotFound,
    FileNotReadable,
    InvalidGlobPattern,
    InvalidExcludePattern,
    EmptyExtension,
    InvalidMaxDepth,
    OutputNotWritable,
    ConflictingOptions,
    ArchiveWithStdio,
    PathNotDirectory,
    PathNotFile,
}

/// Outcome of `Config::validate`
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Problem kinds, parallel to `details`
    pub issues: Vec<ValidationIssue>,
    /// Human-readable description of each issue
    pub details: Vec<String>,
    /// Problems that do not stop the run
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn fail(&mut self, issue: ValidationIssue, detail: impl Into<String>) {
        self.issues.push(issue);
        self.details.push(detail.into());
    }

    fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has(&self, issue: ValidationIssue) -> bool {
        self.issues.contains(&issue)
    }

    /// All details, one per line
    pub fn error_message(&self) -> Option<String> {
        if self.details.is_empty() {
            return None;
        }
        Some(self.details.join("\n"))
    }

    /// Log the warnings and turn any issue into a configuration error
    pub fn into_result(self) -> Result<Vec<String>> {
        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }
        match self.error_message() {
            Some(message) => Err(FlatdumpError::Config(message)),
            None => Ok(self.warnings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Config {
        let argv = std::iter::once("flatdump").chain(args.iter().copied());
        Config::from_args(Args::parse_from(argv))
    }

    #[test]
    fn test_from_args() {
        let config = parse(&["src", "-e", "py,rs", "-g", "*.md", "--no-tree", "-o", "stdio"]);
        assert_eq!(config.discovery.roots, vec![PathBuf::from("src")]);
        assert_eq!(config.discovery.include_extensions, vec!["py", "rs"]);
        assert_eq!(config.discovery.include_patterns, vec!["*.md"]);
        assert_eq!(config.discovery.glob_patterns, vec!["*.md"]);
        assert!(!config.tree);
        assert!(config.dump);
        assert!(config.clean_content);
        assert!(config.writes_to_stdout());
        assert_eq!(config.output_path(), None);
    }

    #[test]
    fn test_no_inclusion_criteria() -> io::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().to_string_lossy().to_string();
        let report = parse(&[&root, "-o", "-"]).validate();
        assert!(!report.is_valid());
        assert!(report.has(ValidationIssue::NoInclusionCriteria));
        Ok(())
    }

    #[test]
    fn test_validation_issues() -> io::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().to_string_lossy().to_string();
        let missing = dir.path().join("missing").to_string_lossy().to_string();

        let report = parse(&[
            &root,
            &missing,
            "-e",
            ".py,",
            "-f",
            "nope.txt",
            "--max-depth",
            "0",
            "-o",
            "stdio",
            "-z",
            "tar.gz",
        ])
        .validate();

        assert!(report.has(ValidationIssue::DirectoryNotFound));
        assert!(report.has(ValidationIssue::FileNotFound));
        assert!(report.has(ValidationIssue::EmptyExtension));
        assert!(report.has(ValidationIssue::InvalidMaxDepth));
        assert!(report.has(ValidationIssue::ArchiveWithStdio));
        assert!(report.warnings.iter().any(|w| w.contains("'.py'")));
        assert!(report.into_result().is_err());
        Ok(())
    }

    #[test]
    fn test_valid_config() -> io::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("a.py"), "x = 1\n")?;
        let root = dir.path().to_string_lossy().to_string();

        let config = parse(&[&root, "-e", "py", "-f", "a.py", "-o", "stdio"]);
        let report = config.validate();
        assert!(report.is_valid(), "{:?}", report.details);
        assert!(report.into_result().is_ok());
        Ok(())
    }

    #[test]
    fn test_describe() {
        let config = parse(&["-f", "main.py", "-i", "build", "-o", "stdio"]);
        let text = config.describe();
        assert!(text.starts_with("## Flatdump Configuration\n"));
        assert!(text.contains("Output File: stdio"));
        assert!(text.contains("### Inclusion Criteria:\n- Specific files: main.py"));
        assert!(text.contains("- Directories: build"));
        assert!(text.contains("### Mode: Specific Files Only"));
        assert!(text.ends_with("\n---\n"));
    }
}
