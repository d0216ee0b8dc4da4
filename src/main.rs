/*!
 * Command-line interface for flatdump
 */

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use tracing_subscriber::EnvFilter;

use flatdump::archive::archive_file;
use flatdump::concat::{write_manifest, ConcatStats, Concatenator};
use flatdump::config::{Args, Config, OutputFormat};
use flatdump::discovery::DiscoveryOrchestrator;
use flatdump::error::{Result, ResultExt};
use flatdump::outline::write_outline;
use flatdump::report::{DumpReport, Reporter};
use flatdump::tokens::TokenCounter;
use flatdump::tree::render_tree;
use flatdump::types::Entry;
use flatdump::utils::{current_dir_label, STDIO};
use flatdump::writer::{JsonWriter, XmlWriter};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn progress_bar(total: u64) -> ProgressBar {
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim} {pos}/{len} ({percent}%) {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress.set_prefix("Reading");
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Where the output is written
fn open_sink(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        None => Ok(Box::new(io::stdout().lock())),
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating output directory {}", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
    }
}

/// Write the text layout: header, configuration, tree, outline, contents
fn write_text<W: Write>(
    config: &Config,
    entries: &[Entry],
    concatenator: &Concatenator,
    out: &mut W,
) -> io::Result<Option<ConcatStats>> {
    if config.tree {
        tracing::info!("Generating directory tree...");
        out.write_all(render_tree(entries, &current_dir_label()).as_bytes())?;
    }

    if config.outline {
        tracing::info!("Generating Python outline...");
        write_outline(entries, out)?;
    }

    if !config.dump {
        return Ok(None);
    }

    if config.manifest {
        tracing::info!("Generating file manifest...");
        write_manifest(entries, out)?;
        Ok(None)
    } else {
        tracing::info!("Concatenating files...");
        concatenator.write(entries, out).map(Some)
    }
}

/// Write an XML or JSON document
fn write_document<W: Write>(
    format: OutputFormat,
    entries: &[Entry],
    concatenator: &Concatenator,
    out: &mut W,
) -> io::Result<ConcatStats> {
    match format {
        OutputFormat::Json => JsonWriter::new(concatenator).write(entries, out),
        _ => XmlWriter::new(concatenator).write(entries, out),
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::from_args(args);
    config.validate().into_result()?;

    if let Err(e) = ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build_global()
    {
        tracing::warn!("Failed to set thread pool size: {}", e);
    }

    let start_time = Instant::now();
    let output_path = config.output_path();
    let output_label = output_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| STDIO.to_string());

    tracing::info!("Starting file discovery...");
    let mut discovery = DiscoveryOrchestrator::new(config.discovery.clone()).run()?;

    if let Some(path) = &output_path {
        let before = discovery.entries.len();
        discovery.entries.retain(|entry| &entry.absolute_path != path);
        if discovery.entries.len() < before {
            tracing::info!("Excluded the output file from processing");
        }
    }

    let file_count = discovery.file_count();
    let dir_count = discovery.dir_count();

    let mut out = open_sink(output_path.as_deref())?;
    let counter = TokenCounter::new(config.encoding)?;

    if file_count == 0 {
        tracing::warn!("No files found matching criteria");
        let concatenator = Concatenator::new(&counter, config.clean_content);
        match config.format {
            OutputFormat::Text => {
                writeln!(out, "## Florted: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
                out.write_all(b"## No files found matching criteria\n")?;
            }
            format => {
                write_document(format, &discovery.entries, &concatenator, &mut out)?;
            }
        }
        out.flush()?;
        eprintln!("No files found matching the specified criteria.");
        return Ok(());
    }

    eprintln!(
        "Processing {} files from {} directories -> {}",
        file_count, dir_count, output_label
    );

    let progress = Arc::new(progress_bar(file_count as u64));
    let concatenator =
        Concatenator::new(&counter, config.clean_content).with_progress(progress.clone());

    let stats = match config.format {
        OutputFormat::Text => {
            writeln!(out, "## Florted: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
            if config.show_config {
                out.write_all(config.describe().as_bytes())?;
            }
            write_text(&config, &discovery.entries, &concatenator, &mut out)?
        }
        format => Some(write_document(format, &discovery.entries, &concatenator, &mut out)?),
    };
    out.flush()?;
    drop(out);
    progress.finish_and_clear();

    let archive = match (config.archive, &output_path) {
        (Some(format), Some(path)) => {
            tracing::info!("Creating {} archive...", format);
            match archive_file(path, format) {
                Ok(archive) => Some(archive.display().to_string()),
                Err(e) => {
                    tracing::warn!("Failed to create archive: {}", e);
                    None
                }
            }
        }
        _ => None,
    };

    let report = DumpReport {
        output: output_label,
        archive,
        output_size: output_path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len()),
        duration: start_time.elapsed(),
        files_found: file_count,
        directories_found: dir_count,
        encoding: counter.encoding(),
        stats,
    };
    Reporter::new().print_report(&report);

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(shell) = args.generate {
        clap_complete::generate(shell, &mut Args::command(), "flatdump", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
