//! ccontext - Pack a directory tree into LLM-sized context chunks.
//!
//! ccontext walks a directory tree, renders a visual file tree with
//! per-file token counts, concatenates file contents, and emits output
//! sized to fit a language-model context window - splitting into
//! labeled chunks with continuity markers when the content exceeds the
//! configured token budget.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use ccontext::builder::build_file_tree;
//! use ccontext::chunker::{extract_segments, pack, PackOptions};
//! use ccontext::config::Config;
//! use ccontext::exclude::ExcludeMatcher;
//! use ccontext::output::{build_footer, build_header};
//! use ccontext::tokens::TokenCounter;
//!
//! let root = Path::new("./my-project");
//! let config = Config::default();
//! let counter = TokenCounter::new(config.encoding);
//! let matcher = ExcludeMatcher::new(root, &config.excludes, &config.includes, true).unwrap();
//!
//! let tree = build_file_tree(root, &matcher, &counter, &config.uploadable_extensions).unwrap();
//! let segments = extract_segments(&tree, &counter);
//! let header = build_header(root, &tree, &config.context_prompt, &counter);
//! let footer = build_footer(&counter);
//!
//! let chunks = pack(
//!     header,
//!     segments,
//!     footer,
//!     PackOptions::new(config.max_tokens, config.buffer_ratio),
//!     &counter,
//! ).unwrap();
//! println!("{} chunks", chunks.len());
//! ```
//!
//! # Modules
//!
//! - [`tokens`] - Token counting for LLM context budgets
//! - [`config`] - Resolved run configuration
//! - [`exclude`] - Glob and gitignore based path exclusion
//! - [`tree`] - File tree representation and rendering
//! - [`builder`] - Exclusion-aware directory traversal
//! - [`chunker`] - Segment extraction and token-budgeted packing
//! - [`output`] - Document framing and chunk delivery

pub mod tokens;
pub mod config;
pub mod exclude;
pub mod errors;
pub mod tree;
pub mod builder;
pub mod chunker;
pub mod output;

// Re-export key types at crate root for convenience
pub use builder::{build_file_tree, BuildError};
pub use chunker::{extract_segments, pack, Chunk, PackError, PackOptions, Segment};
pub use config::{Config, ConfigError};
pub use errors::CcontextError;
pub use exclude::{ExcludeError, ExcludeMatcher};
pub use output::OutputError;
pub use tokens::{count_tokens, Encoding, TokenCounter, Tokenizer};
pub use tree::{render_tree, FileContent, FileNode, NodeKind};
