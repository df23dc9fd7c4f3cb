//! Document assembly and delivery.
//!
//! Builds the header and footer framing around the packed file
//! contents, and dispatches finished chunks to their destination:
//! the system clipboard, stdout, a plain file, or a generated
//! Markdown document. The packer itself knows nothing about delivery.

use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::chunker::Segment;
use crate::tokens::Tokenizer;
use crate::tree::{render_tree, FileNode};

/// Marker opening the file-tree section of the document.
pub const TREE_HEADER: &str = "### ========== File Tree ==========\n";

/// Marker closing the file-tree section.
pub const TREE_FOOTER: &str = "### ========== End of File Tree ==========\n";

/// Marker closing the detailed file contents, i.e. the whole document.
pub const END_MARKER: &str = "### ========== End of Detailed File Contents ==========\n";

/// Errors that can occur during output delivery.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the document header segment: context prompt, root path, and
/// the framed file tree. Always the first text in chunk 1.
pub fn build_header(
    root_path: &Path,
    tree: &FileNode,
    context_prompt: &str,
    tokenizer: &dyn Tokenizer,
) -> Segment {
    let text = format!(
        "## {}\n\n## Root Path: {}\n\n{}{}{}",
        context_prompt,
        root_path.display(),
        TREE_HEADER,
        render_tree(tree),
        TREE_FOOTER,
    );
    Segment::new("<header>", text, tokenizer)
}

/// Build the document footer segment. Rides in whichever chunk is
/// open when the content ends.
pub fn build_footer(tokenizer: &dyn Tokenizer) -> Segment {
    Segment::new("<footer>", END_MARKER, tokenizer)
}

/// Copy text to the system clipboard.
pub fn copy_to_clipboard(text: &str) -> Result<(), OutputError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| OutputError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| OutputError::Clipboard(e.to_string()))
}

/// Write the combined chunk texts to a file, separated by blank lines.
pub fn write_output_file(path: &Path, chunk_texts: &[String]) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    for (i, text) in chunk_texts.iter().enumerate() {
        if i > 0 {
            writeln!(file)?;
        }
        file.write_all(text.as_bytes())?;
        writeln!(file)?;
    }
    Ok(())
}

/// Generate a Markdown document of the tree and file contents.
///
/// Unchunked: this is the browsable rendition of the same data the
/// clipboard path delivers, so it carries no sequencing frames.
pub fn write_markdown(
    path: &Path,
    tree: &FileNode,
    segments: &[Segment],
) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;

    writeln!(file, "# Directory and File Contents\n")?;
    writeln!(file, "## File Tree\n")?;
    writeln!(file, "```\n{}```", render_tree(tree))?;
    for segment in segments {
        file.write_all(segment.text.as_bytes())?;
    }
    writeln!(file, "\n{}", END_MARKER)?;

    Ok(())
}
