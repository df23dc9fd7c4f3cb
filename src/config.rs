//! Resolved run configuration.
//!
//! Settings come from three layers, highest priority first: command-line
//! flags, a JSON config file (an explicit `--config` path, or
//! `.ccontext-config.json` in the scan root), and built-in defaults.
//! The resolved [`Config`] is validated once and then threaded as a
//! plain value into the tree builder and chunk packer - there is no
//! ambient global state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::tokens::Encoding;

/// Name of the per-project config file looked up in the scan root.
pub const PROJECT_CONFIG_FILENAME: &str = ".ccontext-config.json";

/// Default per-chunk token ceiling.
pub const DEFAULT_MAX_TOKENS: usize = 32_000;

/// Default fraction of the budget reserved as safety margin.
pub const DEFAULT_BUFFER_RATIO: f64 = 0.05;

const DEFAULT_CONTEXT_PROMPT: &str = "\
[[SYSTEM INSTRUCTIONS]]
The following output represents a detailed directory structure and file \
contents from a specified root path. The file tree includes both excluded \
and included files and directories, clearly marking exclusions. Each file's \
content is displayed with comprehensive headings and separators to enhance \
readability. If the data represents a codebase, interpret and handle it as \
such, providing appropriate assistance as a programmer AI assistant.
[[END SYSTEM INSTRUCTIONS]]";

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("max_tokens must be a positive integer, got {0}")]
    InvalidMaxTokens(usize),

    #[error("buffer_ratio must be in [0, 1), got {0}")]
    InvalidBufferRatio(f64),
}

/// On-disk config file shape. All fields optional; anything absent
/// falls through to the next layer.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    max_tokens: Option<usize>,
    buffer_ratio: Option<f64>,
    excluded_folders_files: Vec<String>,
    included_folders_files: Vec<String>,
    uploadable_extensions: Vec<String>,
    encoding: Option<String>,
    context_prompt: Option<String>,
    verbose: Option<bool>,
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hard per-chunk token ceiling.
    pub max_tokens: usize,
    /// Fraction of `max_tokens` reserved unused per chunk, absorbing
    /// counting imprecision and injected continuity text.
    pub buffer_ratio: f64,
    /// Glob patterns for paths to exclude.
    pub excludes: Vec<String>,
    /// Glob patterns for paths to force-include. Includes win over
    /// excludes and ignore rules.
    pub includes: Vec<String>,
    /// File extensions (lowercase, no dot) delivered out-of-band as
    /// attachments rather than inlined.
    pub uploadable_extensions: HashSet<String>,
    /// Token encoding used for all counting in this run.
    pub encoding: Encoding,
    /// Instructions prepended to the document header.
    pub context_prompt: String,
    /// Respect .gitignore files during traversal.
    pub respect_gitignore: bool,
    /// Echo chunk contents to stdout as they are delivered.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            buffer_ratio: DEFAULT_BUFFER_RATIO,
            excludes: Vec::new(),
            includes: Vec::new(),
            uploadable_extensions: HashSet::new(),
            encoding: Encoding::default(),
            context_prompt: DEFAULT_CONTEXT_PROMPT.to_string(),
            respect_gitignore: true,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration for a scan of `root`.
    ///
    /// If `explicit_path` is given it must exist; otherwise
    /// `.ccontext-config.json` in the root is used when present, and
    /// defaults apply when neither is found.
    pub fn load(root: &Path, explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Some(read_config_file(path)?)
            }
            None => {
                let project_path = root.join(PROJECT_CONFIG_FILENAME);
                if project_path.exists() {
                    Some(read_config_file(&project_path)?)
                } else {
                    None
                }
            }
        };

        let mut config = Config::default();
        if let Some(file) = file {
            config.apply_file(file);
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(max_tokens) = file.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(buffer_ratio) = file.buffer_ratio {
            self.buffer_ratio = buffer_ratio;
        }
        self.excludes.extend(file.excluded_folders_files);
        self.includes.extend(file.included_folders_files);
        self.uploadable_extensions.extend(
            file.uploadable_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase()),
        );
        if let Some(encoding) = file.encoding {
            if let Ok(parsed) = encoding.parse() {
                self.encoding = parsed;
            }
        }
        if let Some(prompt) = file.context_prompt {
            self.context_prompt = prompt;
        }
        if let Some(verbose) = file.verbose {
            self.verbose = verbose;
        }
    }

    /// Merge pattern lists from the command line. Command-line patterns
    /// take priority, so they go in front of config-file patterns.
    pub fn merge_patterns(&mut self, excludes: &[String], includes: &[String]) {
        self.excludes = merge(split_patterns(excludes), std::mem::take(&mut self.excludes));
        self.includes = merge(split_patterns(includes), std::mem::take(&mut self.includes));
    }

    /// Check budget invariants. Called before any traversal begins;
    /// an invalid budget refuses the whole run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(self.max_tokens));
        }
        if !(0.0..1.0).contains(&self.buffer_ratio) {
            return Err(ConfigError::InvalidBufferRatio(self.buffer_ratio));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge(mut first: Vec<String>, rest: Vec<String>) -> Vec<String> {
    for item in rest {
        if !first.contains(&item) {
            first.push(item);
        }
    }
    first
}

/// Split `|`-separated pattern arguments into individual patterns,
/// dropping empty pieces.
pub fn split_patterns(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|arg| arg.split('|'))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
