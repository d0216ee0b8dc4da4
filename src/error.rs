//! Global error handling for flatdump
//!
//! This module provides a centralized error type that can represent errors
//! from all modules in the project.

use std::io;
use thiserror::Error;

use crate::discovery::DiscoveryError;

/// Global error type for flatdump operations
#[derive(Error, Debug)]
pub enum FlatdumpError {
    /// Discovery could not run at all
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pattern compilation errors
    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),

    /// Archive errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Unexpected error
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Specialized Result type for flatdump operations
pub type Result<T> = std::result::Result<T, FlatdumpError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T, E> {
    /// Add additional context to an error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E: std::error::Error + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        self.map_err(|e| {
            let context = f();
            FlatdumpError::Unexpected(format!("{}: {}", context, e))
        })
    }
}

// Allow converting FlatdumpError to io::Error for io::Result callers
impl From<FlatdumpError> for io::Error {
    fn from(err: FlatdumpError) -> Self {
        io::Error::new(io::ErrorKind::Other, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_error_converts() {
        let err: FlatdumpError = globset::Glob::new("[a-").unwrap_err().into();
        assert!(matches!(err, FlatdumpError::Glob(_)));
        assert!(err.to_string().starts_with("Glob error: "));
    }

    #[test]
    fn test_into_io_error_keeps_message() {
        let err = io::Error::from(FlatdumpError::Config("bad flag".to_string()));
        assert_eq!(err.to_string(), "Configuration error: bad flag");
    }

    #[test]
    fn test_with_context() {
        let parsed: std::result::Result<u32, _> = "x".parse::<u32>();
        let err = parsed.with_context(|| "parsing depth").unwrap_err();
        assert!(err.to_string().starts_with("Unexpected error: parsing depth:"));
    }
}
