//! Path exclusion: glob patterns plus gitignore rules.
//!
//! The tree builder consults an [`ExcludeMatcher`] before recursing
//! into a directory or reading a file. Precedence: include patterns
//! win over everything, then gitignore rules, then exclude patterns.
//! Patterns are matched against the path relative to the scan root.

use std::path::{Path, PathBuf};

use glob::Pattern;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use thiserror::Error;

/// Errors building an exclusion matcher.
#[derive(Debug, Error)]
pub enum ExcludeError {
    #[error("invalid glob pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to load gitignore rules: {0}")]
    Gitignore(#[from] ignore::Error),
}

/// Decides whether a relative path is excluded from the scan.
///
/// Built once per run from the resolved configuration; immutable and
/// cheap to query afterwards.
pub struct ExcludeMatcher {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
    gitignores: Vec<ScopedGitignore>,
}

/// One .gitignore file's rules, scoped to the directory that contains
/// it. Rules apply only at and below that directory.
struct ScopedGitignore {
    /// Containing directory, relative to the scan root.
    base: PathBuf,
    matcher: Gitignore,
}

impl ExcludeMatcher {
    /// Compile glob patterns and, unless disabled, gitignore rules
    /// found under `root`.
    pub fn new(
        root: &Path,
        excludes: &[String],
        includes: &[String],
        respect_gitignore: bool,
    ) -> Result<Self, ExcludeError> {
        let gitignores = if respect_gitignore {
            build_gitignores(root)?
        } else {
            Vec::new()
        };

        Ok(Self {
            includes: compile_patterns(includes)?,
            excludes: compile_patterns(excludes)?,
            gitignores,
        })
    }

    /// Matcher that excludes nothing. Useful for tests and embedding.
    pub fn allow_all() -> Self {
        Self {
            includes: Vec::new(),
            excludes: Vec::new(),
            gitignores: Vec::new(),
        }
    }

    /// Check whether the path (relative to the scan root) is excluded.
    ///
    /// `is_dir` disambiguates directory-only gitignore patterns
    /// (`target/`). Exclusion of a directory prunes its whole subtree:
    /// the builder never descends, so nested include patterns cannot
    /// re-include files under an excluded directory.
    pub fn is_excluded(&self, relative_path: &Path, is_dir: bool) -> bool {
        let normalized = normalize(relative_path);

        if self.includes.iter().any(|p| p.matches(&normalized)) {
            return false;
        }

        if self.gitignored(relative_path, is_dir) {
            return true;
        }

        self.excludes.iter().any(|p| p.matches(&normalized))
    }

    /// A gitignore rule applies only to paths under its own directory,
    /// matched relative to that directory.
    fn gitignored(&self, relative_path: &Path, is_dir: bool) -> bool {
        for scoped in &self.gitignores {
            let path = match relative_path.strip_prefix(&scoped.base) {
                Ok(path) if !path.as_os_str().is_empty() => path,
                _ => continue,
            };
            if scoped
                .matcher
                .matched_path_or_any_parents(path, is_dir)
                .is_ignore()
            {
                return true;
            }
        }
        false
    }
}

fn compile_patterns(raw: &[String]) -> Result<Vec<Pattern>, ExcludeError> {
    raw.iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| ExcludeError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Collect every .gitignore file under `root`, each compiled into its
/// own matcher rooted at the directory containing it.
fn build_gitignores(root: &Path) -> Result<Vec<ScopedGitignore>, ExcludeError> {
    let mut files = Vec::new();
    find_gitignores(root, &mut files);

    let mut scoped = Vec::new();
    for file in files {
        let dir = match file.parent() {
            Some(dir) => dir,
            None => continue,
        };
        let base = dir
            .strip_prefix(root)
            .unwrap_or_else(|_| Path::new(""))
            .to_path_buf();

        let mut builder = GitignoreBuilder::new(dir);
        // add() returns a parse error without poisoning the builder;
        // a malformed gitignore should not abort the run.
        let _ = builder.add(&file);
        scoped.push(ScopedGitignore {
            base,
            matcher: builder.build()?,
        });
    }
    Ok(scoped)
}

fn find_gitignores(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|n| n == ".git") {
                continue;
            }
            find_gitignores(&path, out);
        } else if path.file_name().is_some_and(|n| n == ".gitignore") {
            out.push(path);
        }
    }
}

/// Posix-style relative path string for glob matching.
fn normalize(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        raw.into_owned()
    } else {
        raw.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
