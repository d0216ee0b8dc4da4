/*!
 * Utility functions for flatdump
 */

use std::env;
use std::path::{Path, PathBuf};

/// Output target that means "write to stdout"
pub const STDIO: &str = "stdio";

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Format a count with `,` thousands separators
pub fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Trim list items and drop empty ones
pub fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Whether an output target means stdout
pub fn is_stdio(output: &str) -> bool {
    output == STDIO || output == "-"
}

/// Make an output path absolute without requiring it to exist
pub fn sanitize_output_path(output: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(output);
    let joined = if path.is_absolute() {
        path
    } else {
        base_dir
            .map(Path::to_path_buf)
            .or_else(|| env::current_dir().ok())
            .unwrap_or_default()
            .join(path)
    };

    // Canonicalize the parent when it exists so the path compares equal to
    // canonical entry paths
    match (joined.parent(), joined.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or(joined),
        _ => joined,
    }
}

/// Default output file name: `<current dir name>.flatdump.txt`
pub fn default_output_name() -> String {
    let name = env::current_dir()
        .ok()
        .and_then(|cwd| cwd.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "output".to_string());
    format!("{}.flatdump.txt", name)
}

/// Name of the current working directory, used as the tree's root label
pub fn current_dir_label() -> String {
    env::current_dir()
        .ok()
        .and_then(|cwd| cwd.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| ".".to_string())
}
