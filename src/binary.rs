/*!
 * Binary content detection
 */

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use once_cell::sync::Lazy;

/// Number of leading bytes sampled from a file
pub const SAMPLE_SIZE: usize = 8192;

/// Share of non-text bytes above which a sample counts as binary
pub const NON_TEXT_THRESHOLD: f64 = 0.30;

/// Extensions treated as binary without reading the file
pub static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Executables and object code
        ".exe", ".dll", ".so", ".dylib", ".bin", ".obj", ".o", ".a", ".lib",
        // Archives
        ".zip", ".tar", ".gz", ".bz2", ".xz", ".7z", ".rar",
        // Images
        ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".ico", ".svg", ".webp",
        // Audio and video
        ".mp3", ".mp4", ".avi", ".mov", ".wmv", ".flv", ".mkv", ".wav",
        // Office documents
        ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
        // Compiled bytecode
        ".pyc", ".pyo", ".pyd", ".class", ".jar",
    ]
    .into_iter()
    .collect()
});

/// Normalized (dot-prefixed, lower-cased) extension of a path, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// Decide whether a file holds binary content.
///
/// Known binary extensions short-circuit without touching the file. Any I/O
/// failure counts as binary.
pub fn is_binary(path: &Path) -> bool {
    if let Some(ext) = extension_of(path) {
        if BINARY_EXTENSIONS.contains(ext.as_str()) {
            return true;
        }
    }

    match read_sample(path) {
        Ok(sample) => is_binary_sample(&sample),
        Err(e) => {
            tracing::debug!("Error determining if file is binary {}: {}", path.display(), e);
            true
        }
    }
}

/// Classify an in-memory sample
pub fn is_binary_sample(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }

    if sample.contains(&0) {
        return true;
    }

    let non_text = sample.iter().filter(|&&b| !is_text_byte(b)).count();
    (non_text as f64 / sample.len() as f64) > NON_TEXT_THRESHOLD
}

fn is_text_byte(b: u8) -> bool {
    matches!(b, 32..=126 | b'\n' | b'\r' | b'\t' | 0x0c | 0x08)
}

fn read_sample(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buffer = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}
