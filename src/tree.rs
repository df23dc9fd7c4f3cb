//! File tree representation and rendering.
//!
//! Provides the in-memory tree produced by the builder and functions
//! for rendering it with box-drawing characters and per-file token
//! counts.

use std::path::PathBuf;

/// How a file's body is represented in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Decoded text, inlined into the document.
    Text(String),
    /// Binary data; represented by a placeholder, never inlined.
    Binary,
    /// Delivered out-of-band as an attachment; the inline marker costs
    /// a fixed single token regardless of actual file size.
    Attachment,
    /// The file could not be read; the message replaces its content so
    /// one bad file never stops the walk.
    Error(String),
}

impl FileContent {
    /// Text inserted into the document for this content.
    pub fn render(&self, relative_path: &str) -> String {
        match self {
            FileContent::Text(text) => text.clone(),
            FileContent::Binary => "<Binary data>".to_string(),
            FileContent::Attachment => format!("<Attached file: {}>", relative_path),
            FileContent::Error(message) => message.clone(),
        }
    }
}

/// The type of a filesystem node. The two variants carry disjoint
/// payloads: directories have children, files have tokens and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Directory { children: Vec<FileNode> },
    File { tokens: usize, content: FileContent },
}

/// A node in the file tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    /// File or directory name (not full path).
    pub name: String,
    /// Path relative to the scan root; stable identity key.
    pub path: PathBuf,
    /// Excluded by the predicate. Excluded directories are leaves;
    /// excluded files carry no content or token count.
    pub excluded: bool,
    /// Directory or file payload.
    pub kind: NodeKind,
}

impl FileNode {
    /// Create a new directory node.
    pub fn directory(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            excluded: false,
            kind: NodeKind::Directory {
                children: Vec::new(),
            },
        }
    }

    /// Create a new file node with no payload yet.
    ///
    /// Construction is two-phase: the structural node exists as soon
    /// as the entry is discovered, and [`set_payload`] attaches tokens
    /// and content once the read has succeeded or failed.
    ///
    /// [`set_payload`]: FileNode::set_payload
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            excluded: false,
            kind: NodeKind::File {
                tokens: 0,
                content: FileContent::Binary,
            },
        }
    }

    /// Create an excluded leaf node (file or directory shell).
    pub fn excluded(name: impl Into<String>, path: impl Into<PathBuf>, is_dir: bool) -> Self {
        let mut node = if is_dir {
            Self::directory(name, path)
        } else {
            Self::file(name, path)
        };
        node.excluded = true;
        node
    }

    /// Attach token count and content to a file node.
    pub fn set_payload(&mut self, token_count: usize, file_content: FileContent) {
        if let NodeKind::File { tokens, content } = &mut self.kind {
            *tokens = token_count;
            *content = file_content;
        }
    }

    /// Check if this is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// Add a child node. Only valid for directories.
    pub fn add_child(&mut self, child: FileNode) {
        if let NodeKind::Directory { children } = &mut self.kind {
            children.push(child);
        }
    }

    /// Get child nodes (empty slice for files).
    pub fn children(&self) -> &[FileNode] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// This node's own token count (0 for directories).
    pub fn tokens(&self) -> usize {
        match &self.kind {
            NodeKind::File { tokens, .. } => *tokens,
            NodeKind::Directory { .. } => 0,
        }
    }

    /// Aggregate token count: a file's own count, or the recursive sum
    /// over a directory's children.
    pub fn total_tokens(&self) -> usize {
        match &self.kind {
            NodeKind::File { tokens, .. } => *tokens,
            NodeKind::Directory { children } => {
                children.iter().map(|c| c.total_tokens()).sum()
            }
        }
    }

    /// Count non-excluded files in this tree.
    pub fn file_count(&self) -> usize {
        match &self.kind {
            NodeKind::File { .. } => usize::from(!self.excluded),
            NodeKind::Directory { children } => {
                children.iter().map(|c| c.file_count()).sum()
            }
        }
    }

    /// Sort children lexicographically by name (byte order), recursively.
    ///
    /// Byte order keeps the rendered tree, the extracted segments, and
    /// repeated runs over an unchanged directory in the same sequence.
    pub fn sort_children(&mut self) {
        if let NodeKind::Directory { children } = &mut self.kind {
            children.sort_by(|a, b| a.name.cmp(&b.name));
            for child in children {
                child.sort_children();
            }
        }
    }
}

/// Box-drawing characters for tree rendering.
const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const VERTICAL: &str = "│   ";
const SPACE: &str = "    ";

/// Render a file tree to a string with box-drawing characters,
/// annotating each file with its own token count.
///
/// # Examples
///
/// ```
/// use ccontext::tree::{render_tree, FileContent, FileNode};
///
/// let mut root = FileNode::directory("project", "");
/// let mut file = FileNode::file("main.rs", "main.rs");
/// file.set_payload(12, FileContent::Text("fn main() {}".into()));
/// root.add_child(file);
/// root.sort_children();
///
/// let output = render_tree(&root);
/// assert!(output.contains("main.rs [12 tokens]"));
/// ```
pub fn render_tree(root: &FileNode) -> String {
    let mut output = String::with_capacity(4096);
    render_node(&mut output, root, "", true, true);
    output
}

fn render_node(output: &mut String, node: &FileNode, prefix: &str, is_last: bool, is_root: bool) {
    let branch = if is_root {
        ""
    } else if is_last {
        LAST_BRANCH
    } else {
        BRANCH
    };

    output.push_str(prefix);
    output.push_str(branch);
    output.push_str(&node.name);

    if node.is_directory() {
        output.push('/');
    }

    if node.excluded {
        output.push_str(" [excluded]");
    } else if let NodeKind::File { tokens, content } = &node.kind {
        match content {
            FileContent::Binary => output.push_str(" [binary]"),
            FileContent::Attachment => output.push_str(" [attachment]"),
            FileContent::Error(_) => output.push_str(" [read error]"),
            FileContent::Text(_) => {
                output.push_str(&format!(" [{} tokens]", format_number(*tokens)));
            }
        }
    }

    output.push('\n');

    let children = node.children();
    let child_count = children.len();
    for (i, child) in children.iter().enumerate() {
        let is_last_child = i == child_count - 1;

        let new_prefix = if is_root {
            String::new()
        } else {
            let continuation = if is_last { SPACE } else { VERTICAL };
            format!("{}{}", prefix, continuation)
        };

        render_node(output, child, &new_prefix, is_last_child, false);
    }
}

/// Format number with thousands separators.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_node() {
        let node = FileNode::directory("src", "src");
        assert!(node.is_directory());
        assert!(!node.is_file());
        assert_eq!(node.tokens(), 0);
    }

    #[test]
    fn test_file_payload_two_phase() {
        let mut node = FileNode::file("main.rs", "src/main.rs");
        assert_eq!(node.tokens(), 0);

        node.set_payload(42, FileContent::Text("fn main() {}".into()));
        assert_eq!(node.tokens(), 42);
        assert!(matches!(
            node.kind,
            NodeKind::File {
                content: FileContent::Text(_),
                ..
            }
        ));
    }

    #[test]
    fn test_add_child_ignored_on_file() {
        let mut file = FileNode::file("a.rs", "a.rs");
        file.add_child(FileNode::file("b.rs", "b.rs"));
        assert!(file.children().is_empty());
    }

    #[test]
    fn test_total_tokens_aggregates() {
        let mut root = FileNode::directory("root", "");
        let mut a = FileNode::file("a.txt", "a.txt");
        a.set_payload(10, FileContent::Text("aaa".into()));
        root.add_child(a);

        let mut sub = FileNode::directory("sub", "sub");
        let mut b = FileNode::file("b.txt", "sub/b.txt");
        b.set_payload(7, FileContent::Text("bbb".into()));
        sub.add_child(b);
        root.add_child(sub);

        assert_eq!(root.total_tokens(), 17);
        assert_eq!(root.file_count(), 2);
    }

    #[test]
    fn test_sort_children_byte_order() {
        let mut root = FileNode::directory("root", "");
        root.add_child(FileNode::file("b.txt", "b.txt"));
        root.add_child(FileNode::file("B.txt", "B.txt"));
        root.add_child(FileNode::file("a.txt", "a.txt"));
        root.sort_children();

        let names: Vec<_> = root.children().iter().map(|c| c.name.as_str()).collect();
        // Uppercase sorts before lowercase in byte order
        assert_eq!(names, vec!["B.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_excluded_leaf() {
        let node = FileNode::excluded("target", "target", true);
        assert!(node.excluded);
        assert!(node.is_directory());
        assert_eq!(node.total_tokens(), 0);
    }

    #[test]
    fn test_render_marks_variants() {
        let mut root = FileNode::directory("project", "");

        let mut text = FileNode::file("a.rs", "a.rs");
        text.set_payload(1234, FileContent::Text("code".into()));
        root.add_child(text);

        let mut binary = FileNode::file("img.png", "img.png");
        binary.set_payload(0, FileContent::Binary);
        root.add_child(binary);

        let mut attached = FileNode::file("doc.pdf", "doc.pdf");
        attached.set_payload(1, FileContent::Attachment);
        root.add_child(attached);

        root.add_child(FileNode::excluded("target", "target", true));
        root.sort_children();

        let output = render_tree(&root);
        assert!(output.contains("a.rs [1,234 tokens]"));
        assert!(output.contains("img.png [binary]"));
        assert!(output.contains("doc.pdf [attachment]"));
        assert!(output.contains("target/ [excluded]"));
        assert!(output.contains("├──") && output.contains("└──"));
    }

    #[test]
    fn test_render_nested_prefixes() {
        let mut root = FileNode::directory("project", "");
        let mut src = FileNode::directory("src", "src");
        let mut main = FileNode::file("main.rs", "src/main.rs");
        main.set_payload(5, FileContent::Text("x".into()));
        src.add_child(main);
        root.add_child(src);
        root.sort_children();

        let output = render_tree(&root);
        assert!(output.contains("src/"));
        assert!(output.contains("└── main.rs"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
