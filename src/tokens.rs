//! Token counting for output statistics
//!
//! The heuristic counter needs no model data and is the default. The BPE
//! encodings use tiktoken and give counts that match OpenAI-style models.

use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use strum::{Display, EnumIter, EnumProperty};
use tiktoken_rs::CoreBPE;

use crate::error::{FlatdumpError, Result};

/// Available token encodings
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    EnumIter,
    Display,
    ValueEnum,
    Serialize,
    EnumProperty,
)]
#[strum(serialize_all = "lowercase")]
pub enum TokenEncoding {
    /// Regex-based approximation of code tokens
    #[default]
    #[strum(props(description = "regex approximation"))]
    Heuristic,

    /// GPT-4 / GPT-3.5 byte pair encoding
    #[strum(props(description = "cl100k_base BPE"))]
    Cl100k,

    /// GPT-4o byte pair encoding
    #[strum(props(description = "o200k_base BPE"))]
    O200k,
}

impl TokenEncoding {
    /// Short human-readable description
    pub fn description(&self) -> &'static str {
        self.get_str("description").unwrap_or("unknown")
    }
}

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"[A-Za-z_][A-Za-z0-9_]*",   // identifiers and words
        r"|\d+\.?\d*%?",             // numbers and percentages
        r"|[+\-*/=<>!&|^~]+=?",      // operators
        r"|[(){}\[\]]",              // brackets
        r"|[.,;:]",                  // punctuation
        r#"|['"`]"#,                 // quotes
        r"|[@#$%\\]",                // special symbols
    ))
    .expect("token pattern is valid")
});

/// Counts tokens with the selected encoding
pub struct TokenCounter {
    encoding: TokenEncoding,
    bpe: Option<CoreBPE>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl TokenCounter {
    pub fn new(encoding: TokenEncoding) -> Result<Self> {
        let bpe = match encoding {
            TokenEncoding::Heuristic => None,
            TokenEncoding::Cl100k => Some(
                tiktoken_rs::cl100k_base()
                    .map_err(|e| FlatdumpError::Config(format!("cl100k encoding: {}", e)))?,
            ),
            TokenEncoding::O200k => Some(
                tiktoken_rs::o200k_base()
                    .map_err(|e| FlatdumpError::Config(format!("o200k encoding: {}", e)))?,
            ),
        };

        Ok(Self { encoding, bpe })
    }

    /// Heuristic counter, which cannot fail to build
    pub fn heuristic() -> Self {
        Self {
            encoding: TokenEncoding::Heuristic,
            bpe: None,
        }
    }

    pub fn encoding(&self) -> TokenEncoding {
        self.encoding
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => count_heuristic(text),
        }
    }
}

/// Approximate token count of source text
pub fn count_heuristic(text: &str) -> usize {
    TOKEN_PATTERN.find_iter(text).count()
}
