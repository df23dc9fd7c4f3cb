//! Token counting for LLM context budget management.
//!
//! Uses tiktoken-rs for accurate OpenAI-compatible token counts,
//! with a fallback heuristic when tiktoken is unavailable.
//!
//! The tree builder and chunk packer depend on counting only through
//! the [`Tokenizer`] trait, so tests (and callers with their own
//! tokenization) can substitute a deterministic counter.

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

/// Token encoding to use for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// cl100k_base: GPT-4, GPT-3.5-turbo, ChatGPT
    #[default]
    Cl100kBase,
    /// o200k_base: GPT-4o
    O200kBase,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Cl100kBase => write!(f, "cl100k_base"),
            Encoding::O200kBase => write!(f, "o200k_base"),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(Encoding::Cl100kBase),
            "o200k" | "o200k_base" => Ok(Encoding::O200kBase),
            _ => Err(format!("unknown encoding: {}", s)),
        }
    }
}

/// Counts tokens in a piece of text.
///
/// Implementations must be deterministic: identical input yields an
/// identical count for the lifetime of the value. The chunk packer's
/// budget accounting depends on this.
pub trait Tokenizer {
    /// Count tokens in the given text.
    fn count(&self, text: &str) -> usize;
}

// Cached tokenizers - initialized once per encoding
static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn get_tokenizer(encoding: Encoding) -> Option<&'static CoreBPE> {
    match encoding {
        Encoding::Cl100kBase => CL100K
            .get_or_init(|| tiktoken_rs::cl100k_base().ok())
            .as_ref(),
        Encoding::O200kBase => O200K
            .get_or_init(|| tiktoken_rs::o200k_base().ok())
            .as_ref(),
    }
}

/// Count tokens using tiktoken.
fn tiktoken_count(text: &str, encoding: Encoding) -> Option<usize> {
    let bpe = get_tokenizer(encoding)?;
    Some(bpe.encode_ordinary(text).len())
}

/// Fallback heuristic: ~4 characters per token.
fn fallback_count(text: &str) -> usize {
    // Code tends to have ~3.5 chars/token, prose ~4.2
    (text.len() + 3) / 4
}

/// Count tokens in text using the default encoding (cl100k_base).
///
/// This function never fails - it falls back to a heuristic if
/// tiktoken is unavailable.
///
/// # Examples
///
/// ```
/// use ccontext::tokens::count_tokens;
///
/// let count = count_tokens("Hello, world!");
/// assert!(count > 0);
/// ```
pub fn count_tokens(text: &str) -> usize {
    count_tokens_with_encoding(text, Encoding::default())
}

/// Count tokens in text using the specified encoding.
///
/// Falls back to a character-based heuristic (~4 chars/token)
/// if tiktoken is unavailable.
pub fn count_tokens_with_encoding(text: &str, encoding: Encoding) -> usize {
    tiktoken_count(text, encoding).unwrap_or_else(|| fallback_count(text))
}

/// Reusable token counter with cached tokenizer.
///
/// This is the production [`Tokenizer`]; one instance is threaded
/// through the tree builder and chunk packer so a whole run counts
/// with a single, fixed encoding.
///
/// # Examples
///
/// ```
/// use ccontext::tokens::{Encoding, TokenCounter, Tokenizer};
///
/// let counter = TokenCounter::new(Encoding::Cl100kBase);
/// let count = counter.count("First text");
/// assert!(count > 0);
/// ```
pub struct TokenCounter {
    encoding: Encoding,
}

impl TokenCounter {
    /// Create a new token counter with the specified encoding.
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    /// Get the encoding this counter uses.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Tokenizer for TokenCounter {
    fn count(&self, text: &str) -> usize {
        count_tokens_with_encoding(text, self.encoding)
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new(Encoding::default())
    }
}
