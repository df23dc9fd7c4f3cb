//! Tree construction: the exclusion-aware directory walk.
//!
//! Recursive depth-first descent from a root directory. Each entry is
//! checked against the exclusion predicate before it is recursed into
//! or read, directory listings are sorted in byte order so repeated
//! runs over an unchanged tree are identical, and every file read
//! failure is absorbed into a placeholder node. One bad file never
//! stops the walk; only a broken root is fatal.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::exclude::ExcludeMatcher;
use crate::tokens::Tokenizer;
use crate::tree::{FileContent, FileNode};

/// Bytes sniffed for the NUL heuristic before attempting to decode.
const BINARY_SNIFF_LEN: usize = 1024;

/// Token cost charged for an attachment marker. The real payload is
/// delivered out-of-band, so the cost is fixed regardless of size.
const ATTACHMENT_TOKEN_COST: usize = 1;

/// Errors that abort tree construction. Per-file problems never
/// surface here; they become placeholder nodes instead.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read root directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Build the file tree for `root`.
///
/// The matcher decides exclusion per relative path; excluded
/// directories become leaf nodes and are never descended into.
/// Files whose extension is in `uploadable_extensions` get a
/// fixed-cost attachment marker and are not read at all.
///
/// # Examples
///
/// ```no_run
/// use ccontext::builder::build_file_tree;
/// use ccontext::exclude::ExcludeMatcher;
/// use ccontext::tokens::TokenCounter;
/// use std::collections::HashSet;
/// use std::path::Path;
///
/// let counter = TokenCounter::default();
/// let tree = build_file_tree(
///     Path::new("./project"),
///     &ExcludeMatcher::allow_all(),
///     &counter,
///     &HashSet::new(),
/// ).unwrap();
/// println!("{} files, {} tokens", tree.file_count(), tree.total_tokens());
/// ```
pub fn build_file_tree(
    root: &Path,
    matcher: &ExcludeMatcher,
    tokenizer: &dyn Tokenizer,
    uploadable_extensions: &HashSet<String>,
) -> Result<FileNode, BuildError> {
    if !root.exists() {
        return Err(BuildError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(BuildError::NotADirectory(root.to_path_buf()));
    }

    let name = root.file_name().map_or_else(
        || root.to_string_lossy().into_owned(),
        |n| n.to_string_lossy().into_owned(),
    );

    let walker = TreeWalker {
        root,
        matcher,
        tokenizer,
        uploadable_extensions,
    };

    let mut node = FileNode::directory(name, PathBuf::new());
    walker.fill(&mut node, root, true)?;
    Ok(node)
}

struct TreeWalker<'a> {
    root: &'a Path,
    matcher: &'a ExcludeMatcher,
    tokenizer: &'a dyn Tokenizer,
    uploadable_extensions: &'a HashSet<String>,
}

impl TreeWalker<'_> {
    fn fill(&self, node: &mut FileNode, dir: &Path, is_root: bool) -> Result<(), BuildError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            // An unreadable subdirectory stays in the tree as an empty
            // shell; only the root itself is fatal.
            Err(_) if !is_root => return Ok(()),
            Err(source) => {
                return Err(BuildError::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut names: Vec<(String, PathBuf, bool)> = entries
            .flatten()
            .map(|entry| {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                // file_type() does not follow symlinks, so a link to an
                // ancestor directory is handled as a file and the walk
                // cannot cycle.
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                (name, path, is_dir)
            })
            .collect();
        // Byte-order sort; determines segment and chunk ordering too.
        names.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, path, is_dir) in names {
            let relative = path.strip_prefix(self.root).unwrap_or(&path).to_path_buf();

            if self.matcher.is_excluded(&relative, is_dir) {
                node.add_child(FileNode::excluded(name, relative, is_dir));
                continue;
            }

            if is_dir {
                let mut child = FileNode::directory(name, relative);
                self.fill(&mut child, &path, false)?;
                node.add_child(child);
            } else {
                let mut child = FileNode::file(name, relative.clone());
                let (tokens, content) = self.read_file_payload(&path, &relative);
                child.set_payload(tokens, content);
                node.add_child(child);
            }
        }

        Ok(())
    }

    /// Read one file and decide how it enters the document.
    ///
    /// Order matters: the uploadable-extension check comes first so
    /// attachment files are never read or tokenized; then the NUL-byte
    /// sniff and UTF-8 decode classify binaries; read errors turn into
    /// an inline error placeholder.
    fn read_file_payload(&self, path: &Path, relative: &Path) -> (usize, FileContent) {
        if self.is_uploadable(path) {
            return (ATTACHMENT_TOKEN_COST, FileContent::Attachment);
        }

        let mut file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) => return read_error(relative, &e),
        };

        let mut sniff = [0u8; BINARY_SNIFF_LEN];
        let n = match file.read(&mut sniff) {
            Ok(n) => n,
            Err(e) => return read_error(relative, &e),
        };
        if sniff[..n].contains(&0) {
            return (0, FileContent::Binary);
        }

        let mut bytes = sniff[..n].to_vec();
        if let Err(e) = file.read_to_end(&mut bytes) {
            return read_error(relative, &e);
        }

        match String::from_utf8(bytes) {
            Ok(text) => {
                let tokens = self.tokenizer.count(&text);
                (tokens, FileContent::Text(text))
            }
            // Undecodable means binary, not an error.
            Err(_) => (0, FileContent::Binary),
        }
    }

    fn is_uploadable(&self, path: &Path) -> bool {
        if self.uploadable_extensions.is_empty() {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.uploadable_extensions.contains(&ext.to_lowercase()))
    }
}

fn read_error(relative: &Path, error: &std::io::Error) -> (usize, FileContent) {
    (
        0,
        FileContent::Error(format!(
            "Error reading file {}: {}",
            relative.display(),
            error
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;
    use std::fs;
    use tempfile::TempDir;

    /// One token per whitespace-separated word; exact arithmetic for tests.
    struct WordCounter;

    impl Tokenizer for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    fn build(dir: &Path) -> FileNode {
        build_file_tree(dir, &ExcludeMatcher::allow_all(), &WordCounter, &HashSet::new())
            .unwrap()
    }

    #[test]
    fn test_basic_structure_and_tokens() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), "world").unwrap();

        let tree = build(dir.path());
        assert!(tree.is_directory());
        assert_eq!(tree.file_count(), 2);
        assert_eq!(tree.total_tokens(), 2);

        let names: Vec<_> = tree.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }

    #[test]
    fn test_missing_root() {
        let result = build_file_tree(
            Path::new("/nonexistent/path"),
            &ExcludeMatcher::allow_all(),
            &WordCounter,
            &HashSet::new(),
        );
        assert!(matches!(result, Err(BuildError::NotFound(_))));
    }

    #[test]
    fn test_file_root_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "x").unwrap();
        let result = build_file_tree(
            &file,
            &ExcludeMatcher::allow_all(),
            &WordCounter,
            &HashSet::new(),
        );
        assert!(matches!(result, Err(BuildError::NotADirectory(_))));
    }

    #[test]
    fn test_excluded_directory_not_descended() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("skip")).unwrap();
        fs::write(dir.path().join("skip/inner.txt"), "hidden words here").unwrap();
        fs::write(dir.path().join("keep.txt"), "kept").unwrap();

        let matcher = ExcludeMatcher::new(
            dir.path(),
            &["skip".to_string()],
            &[],
            false,
        )
        .unwrap();
        let tree =
            build_file_tree(dir.path(), &matcher, &WordCounter, &HashSet::new()).unwrap();

        let skip = tree
            .children()
            .iter()
            .find(|c| c.name == "skip")
            .unwrap();
        assert!(skip.excluded);
        assert!(skip.children().is_empty());
        assert_eq!(tree.total_tokens(), 1);
    }

    #[test]
    fn test_binary_file_zero_tokens() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.bin"), b"abc\x00def").unwrap();

        let tree = build(dir.path());
        let node = &tree.children()[0];
        assert_eq!(node.tokens(), 0);
        assert!(matches!(
            node.kind,
            NodeKind::File {
                content: FileContent::Binary,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_utf8_treated_as_binary() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("latin1.txt"), [0xE9, 0x20, 0x61]).unwrap();

        let tree = build(dir.path());
        assert!(matches!(
            tree.children()[0].kind,
            NodeKind::File {
                content: FileContent::Binary,
                ..
            }
        ));
    }

    #[test]
    fn test_uploadable_extension_fixed_cost() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("paper.pdf"), vec![0u8; 100_000]).unwrap();

        let uploadable: HashSet<String> = ["pdf".to_string()].into_iter().collect();
        let tree = build_file_tree(
            dir.path(),
            &ExcludeMatcher::allow_all(),
            &WordCounter,
            &uploadable,
        )
        .unwrap();

        let node = &tree.children()[0];
        assert_eq!(node.tokens(), 1);
        assert!(matches!(
            node.kind,
            NodeKind::File {
                content: FileContent::Attachment,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_never_recurse() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "real words").unwrap();
        // A link back to the root would loop forever if followed.
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("b.link"))
            .unwrap();

        let tree = build(dir.path());

        let cycle = tree.children().iter().find(|c| c.name == "loop").unwrap();
        assert!(cycle.is_file());
        assert!(cycle.children().is_empty());
        assert!(matches!(
            cycle.kind,
            NodeKind::File {
                content: FileContent::Error(_),
                ..
            }
        ));

        // A link to a regular file still inlines its target.
        let link = tree.children().iter().find(|c| c.name == "b.link").unwrap();
        assert_eq!(link.tokens(), 2);
    }

    #[test]
    fn test_deterministic_rebuild() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("z.txt"), "zeta").unwrap();
        fs::write(dir.path().join("a.txt"), "alpha beta").unwrap();
        fs::create_dir(dir.path().join("m")).unwrap();
        fs::write(dir.path().join("m/n.txt"), "nested").unwrap();

        let first = build(dir.path());
        let second = build(dir.path());
        assert_eq!(first, second);
    }

    #[test]
    fn test_spec_example_scenario() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::write(dir.path().join("b.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), "world").unwrap();

        let matcher = ExcludeMatcher::new(
            dir.path(),
            &["b.txt".to_string()],
            &[],
            false,
        )
        .unwrap();
        let tree =
            build_file_tree(dir.path(), &matcher, &WordCounter, &HashSet::new()).unwrap();

        assert_eq!(tree.children().len(), 3);
        let b = tree.children().iter().find(|c| c.name == "b.txt").unwrap();
        assert!(b.excluded);
        assert_eq!(tree.file_count(), 2);
        assert_eq!(tree.total_tokens(), 2);
    }
}
