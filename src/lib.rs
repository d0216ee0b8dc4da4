/*!
 * flatdump - Flatten source trees into a single file for LLM context
 *
 * The library discovers files beneath one or more roots, filters them by
 * extension, pattern, visibility and content type, merges glob matches and
 * explicitly requested files, and returns a deduplicated, ordered entry
 * list. Consumers render that list as a tree, an outline, concatenated
 * contents, XML or JSON.
 */

pub mod archive;
pub mod binary;
pub mod concat;
pub mod config;
pub mod discovery;
pub mod error;
pub mod explicit;
pub mod filter;
pub mod glob;
pub mod outline;
pub mod report;
pub mod tokens;
pub mod tree;
pub mod types;
pub mod utils;
pub mod walker;
pub mod writer;

#[cfg(test)]
mod tests;

// Re-export main components for easier access
pub use binary::is_binary;
pub use config::{Config, OutputFormat};
pub use discovery::{discover, DiscoveryError, DiscoveryOptions, DiscoveryOrchestrator};
pub use error::{FlatdumpError, Result};
pub use filter::{FilterEngine, FilterRules};
pub use report::{DumpReport, Reporter};
pub use types::{Diagnostics, Discovery, Entry, EntryKind, EntrySource, ExclusionReason, Verdict};
pub use utils::format_file_size;
pub use writer::{JsonWriter, XmlWriter};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
