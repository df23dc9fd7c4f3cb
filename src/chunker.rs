//! Segment extraction and token-budgeted chunk packing.
//!
//! The packer consumes an ordered sequence of text segments (document
//! header, one segment per file, footer) and produces chunks that each
//! fit within a token budget. Multi-chunk output is framed with
//! sequencing text and a continuity excerpt quoting the tail of the
//! previous chunk, so a stateless reader can reassemble the document
//! incrementally.

use thiserror::Error;

use crate::tokens::Tokenizer;
use crate::tree::{FileNode, NodeKind};

/// Lines of the previous chunk quoted as a continuity anchor. A line
/// count, not a token count - deliberately approximate.
const CONTINUITY_LINES: usize = 10;

/// Marker closing every chunk except the last.
pub const MORE_CHUNKS_MARKER: &str = "###More chunks to follow...###";

/// Marker closing the final chunk.
pub const FINAL_CHUNK_MARKER: &str = "###This is the final chunk.###";

/// Errors from the chunk packer.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("max_tokens must be a positive integer, got {0}")]
    InvalidMaxTokens(usize),

    #[error("buffer_ratio must be in [0, 1), got {0}")]
    InvalidBufferRatio(f64),

    #[error("budget of {available} tokens cannot fit the {frame}-token chunk framing")]
    BudgetTooSmall { available: usize, frame: usize },
}

/// One ordered unit of output text: a file's wrapped content, or the
/// document header/footer framing. Token count is measured once at
/// creation and reused by the packer.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Originating relative path, or a synthetic marker for framing.
    pub source: String,
    /// Raw text body.
    pub text: String,
    /// Cached token count of `text`.
    pub tokens: usize,
}

impl Segment {
    /// Create a segment, measuring its token count.
    pub fn new(source: impl Into<String>, text: impl Into<String>, tokenizer: &dyn Tokenizer) -> Self {
        let text = text.into();
        let tokens = tokenizer.count(&text);
        Self {
            source: source.into(),
            text,
            tokens,
        }
    }
}

/// A budget-respecting grouping of segments (or segment fragments).
///
/// `payload` is the exact concatenation of the segment text packed
/// into this chunk; `text` is the deliverable form, identical to the
/// payload for single-chunk output and wrapped with sequencing frames
/// otherwise. Concatenating all payloads in order reproduces the full
/// document byte-for-byte.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 1-based position in the sequence.
    pub index: usize,
    /// Total number of chunks.
    pub total: usize,
    /// Raw packed text, before any wrapping.
    pub payload: String,
    /// Token count of `payload`.
    pub payload_tokens: usize,
    /// Deliverable text, including sequencing frames.
    pub text: String,
    /// Measured token count of `text`.
    pub tokens: usize,
}

/// Budget settings for one packing run.
#[derive(Debug, Clone, Copy)]
pub struct PackOptions {
    /// Hard per-chunk token ceiling.
    pub max_tokens: usize,
    /// Fraction of `max_tokens` reserved unused per chunk. The
    /// reservation absorbs counting imprecision across frame joins;
    /// the sequencing frames themselves are measured and charged
    /// against the packing budget.
    pub buffer_ratio: f64,
}

impl PackOptions {
    pub fn new(max_tokens: usize, buffer_ratio: f64) -> Self {
        Self {
            max_tokens,
            buffer_ratio,
        }
    }

    fn validate(&self) -> Result<(), PackError> {
        if self.max_tokens == 0 {
            return Err(PackError::InvalidMaxTokens(self.max_tokens));
        }
        if !(0.0..1.0).contains(&self.buffer_ratio) {
            return Err(PackError::InvalidBufferRatio(self.buffer_ratio));
        }
        Ok(())
    }

    /// Tokens usable for payload per chunk.
    fn available_tokens(&self) -> usize {
        (self.max_tokens as f64 * (1.0 - self.buffer_ratio)).floor() as usize
    }
}

/// Flatten a tree into the ordered per-file segment sequence.
///
/// Depth-first pre-order in the builder's sort order, so the rendered
/// tree and the emitted content reference files in the same relative
/// sequence. Directories contribute nothing; each non-excluded file
/// contributes exactly one segment wrapped in a path-identifying
/// header, keeping segment boundaries visible after concatenation or
/// mid-segment splits.
pub fn extract_segments(root: &FileNode, tokenizer: &dyn Tokenizer) -> Vec<Segment> {
    let mut segments = Vec::new();
    collect_segments(root, tokenizer, &mut segments);
    segments
}

fn collect_segments(node: &FileNode, tokenizer: &dyn Tokenizer, out: &mut Vec<Segment>) {
    if node.excluded {
        return;
    }
    match &node.kind {
        NodeKind::Directory { children } => {
            for child in children {
                collect_segments(child, tokenizer, out);
            }
        }
        NodeKind::File { content, .. } => {
            let path = node.path.display().to_string();
            let body = content.render(&path);
            let text = format!("\n#### File: {}\n**Contents:**\n{}\n", path, body);
            out.push(Segment::new(path, text, tokenizer));
        }
    }
}

/// Pack the document into budget-respecting chunks.
///
/// The header segment opens the first chunk and the footer closes the
/// last; both flow through the same threshold test as file segments.
/// An empty document (no segments, zero-length framing) yields zero
/// chunks; a document that fits within the budget yields exactly one
/// chunk whose text is the unmodified concatenation.
///
/// Multi-chunk output is packed twice: the first pass determines that
/// sequencing frames are needed at all, the second charges the
/// measured frame cost against each chunk's payload budget so the
/// wrapped text stays under `max_tokens`.
pub fn pack(
    header: Segment,
    segments: Vec<Segment>,
    footer: Segment,
    options: PackOptions,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<Chunk>, PackError> {
    options.validate()?;
    let available = options.available_tokens();

    let chunks = pack_payloads(&header, &segments, &footer, available, available, tokenizer);
    if chunks.len() <= 1 {
        return Ok(wrap_chunks(chunks, options, tokenizer));
    }

    // The re-pack may grow the chunk count, which only changes the
    // numerals printed inside the frames; the buffer reservation
    // absorbs that drift.
    let total = chunks.len();
    let first_cost = tokenizer.count(&first_frame(total, ""));
    let rest_cost = tokenizer
        .count(&middle_frame(2, total, "", ""))
        .max(tokenizer.count(&last_frame(total, total, "")));
    let frame = first_cost.max(rest_cost);
    if frame >= available {
        return Err(PackError::BudgetTooSmall { available, frame });
    }

    let chunks = pack_payloads(
        &header,
        &segments,
        &footer,
        available - first_cost,
        available - rest_cost,
        tokenizer,
    );
    Ok(wrap_chunks(chunks, options, tokenizer))
}

fn pack_payloads(
    header: &Segment,
    segments: &[Segment],
    footer: &Segment,
    first_budget: usize,
    rest_budget: usize,
    tokenizer: &dyn Tokenizer,
) -> Vec<(String, usize)> {
    let mut packer = Packer {
        first_budget,
        rest_budget,
        tokenizer,
        payload: String::new(),
        payload_tokens: 0,
        chunks: Vec::new(),
    };

    packer.push(&header.text, header.tokens);
    for segment in segments {
        packer.push(&segment.text, segment.tokens);
    }
    packer.push(&footer.text, footer.tokens);
    packer.flush();
    packer.chunks
}

struct Packer<'a> {
    first_budget: usize,
    rest_budget: usize,
    tokenizer: &'a dyn Tokenizer,
    payload: String,
    payload_tokens: usize,
    chunks: Vec<(String, usize)>,
}

impl Packer<'_> {
    /// Budget for the chunk currently being filled. The first chunk
    /// gives up the initialization preamble's worth of payload, later
    /// chunks the continuation frame's worth.
    fn budget(&self) -> usize {
        if self.chunks.is_empty() {
            self.first_budget
        } else {
            self.rest_budget
        }
    }

    /// Append one segment's text, flushing or splitting as needed.
    fn push(&mut self, text: &str, tokens: usize) {
        if text.is_empty() {
            return;
        }

        if tokens > self.budget() {
            self.push_oversized(text);
            return;
        }

        if self.payload_tokens + tokens > self.budget() {
            self.flush();
        }
        self.payload.push_str(text);
        self.payload_tokens += tokens;
    }

    /// A single segment larger than the open chunk's budget: split it
    /// into fixed-size character slices and re-measure each slice,
    /// since token boundaries are opaque to us. Slice size
    /// approximates one budget's worth of text; a slice that still
    /// over-measures (dense unicode) is halved until it fits,
    /// preserving the invariant.
    fn push_oversized(&mut self, text: &str) {
        self.push_sliced(text, self.budget().max(1));
    }

    fn push_sliced(&mut self, text: &str, size: usize) {
        for slice in char_slices(text, size) {
            let tokens = self.tokenizer.count(slice);
            if tokens > self.budget() && slice.chars().nth(1).is_some() {
                let half = (slice.chars().count() / 2).max(1);
                self.push_sliced(slice, half);
                continue;
            }
            if self.payload_tokens + tokens > self.budget() {
                self.flush();
            }
            self.payload.push_str(slice);
            self.payload_tokens += tokens;
        }
    }

    /// Close out the running buffer as a completed chunk.
    fn flush(&mut self) {
        if !self.payload.is_empty() {
            let payload = std::mem::take(&mut self.payload);
            self.chunks.push((payload, self.payload_tokens));
        }
        self.payload_tokens = 0;
    }
}

/// Split text into consecutive slices of at most `size` characters,
/// on char boundaries.
fn char_slices(text: &str, size: usize) -> Vec<&str> {
    let mut slices = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            slices.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        slices.push(&text[start..]);
    }
    slices
}

fn first_frame(total: usize, payload: &str) -> String {
    format!(
        "## Initialization\n\
         The following content will be delivered in multiple chunks to \
         ensure all data is processed correctly. There will be a total \
         of {} chunks. Read each chunk thoroughly and wait for the \
         final chunk, marked by '{}', before drawing conclusions.\n\n\
         ### Chunk 1 of {}: File Tree and Initial File Contents\n{}\n{}",
        total, FINAL_CHUNK_MARKER, total, payload, MORE_CHUNKS_MARKER
    )
}

fn middle_frame(index: usize, total: usize, excerpt: &str, payload: &str) -> String {
    format!(
        "### Chunk {} of {} (continued from Chunk {})\nPrevious chunk ended with:\n{}\n{}\n{}",
        index,
        total,
        index - 1,
        excerpt,
        payload,
        MORE_CHUNKS_MARKER
    )
}

fn last_frame(index: usize, total: usize, payload: &str) -> String {
    format!(
        "### Chunk {} of {}\n{}\n{}",
        index, total, payload, FINAL_CHUNK_MARKER
    )
}

/// Apply sequencing frames to the materialized chunks.
///
/// A single chunk is emitted as-is. Otherwise chunk 1 gets an
/// initialization preamble stating the total, middle chunks quote the
/// tail of their predecessor, and the last chunk carries the final
/// marker. Frame cost was charged during packing; the continuity
/// excerpt spends whatever room is left under the ceiling and is
/// trimmed from the front until the whole chunk fits `max_tokens`.
fn wrap_chunks(
    raw: Vec<(String, usize)>,
    options: PackOptions,
    tokenizer: &dyn Tokenizer,
) -> Vec<Chunk> {
    let total = raw.len();

    if total == 1 {
        let (payload, payload_tokens) = raw.into_iter().next().unwrap();
        return vec![Chunk {
            index: 1,
            total: 1,
            text: payload.clone(),
            tokens: payload_tokens,
            payload,
            payload_tokens,
        }];
    }

    let mut chunks = Vec::with_capacity(total);

    for (i, (payload, payload_tokens)) in raw.iter().enumerate() {
        let index = i + 1;

        let text = if index == 1 {
            first_frame(total, payload)
        } else if index == total {
            last_frame(index, total, payload)
        } else {
            // Measure the frame without the excerpt; whatever room is
            // left under the ceiling is what the excerpt may spend.
            let frame_tokens = tokenizer.count(&middle_frame(index, total, "", payload));
            let excerpt_budget = options.max_tokens.saturating_sub(frame_tokens);
            let excerpt = continuity_excerpt(&raw[i - 1].0, excerpt_budget, tokenizer);
            middle_frame(index, total, &excerpt, payload)
        };

        let tokens = tokenizer.count(&text);
        chunks.push(Chunk {
            index,
            total,
            payload: payload.clone(),
            payload_tokens: *payload_tokens,
            text,
            tokens,
        });
    }

    chunks
}

/// Last lines of the previous chunk, trimmed from the front until the
/// excerpt fits the given token budget.
fn continuity_excerpt(previous: &str, budget: usize, tokenizer: &dyn Tokenizer) -> String {
    let lines: Vec<&str> = previous.lines().collect();
    let start = lines.len().saturating_sub(CONTINUITY_LINES);

    for skip in start..lines.len() {
        let excerpt = lines[skip..].join("\n");
        if tokenizer.count(&excerpt) <= budget {
            return excerpt;
        }
    }
    String::new()
}
