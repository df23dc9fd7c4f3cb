//! ccontext CLI - pack a directory tree into LLM-sized context chunks.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{generate, Shell};

use ccontext::builder::build_file_tree;
use ccontext::chunker::{extract_segments, pack, Chunk, PackOptions};
use ccontext::config::Config;
use ccontext::errors::{exit_code, CcontextError};
use ccontext::exclude::ExcludeMatcher;
use ccontext::output::{
    build_footer, build_header, copy_to_clipboard, write_markdown, write_output_file,
};
use ccontext::tokens::{Encoding, TokenCounter};
use ccontext::tree::{format_number, render_tree};

#[derive(Parser)]
#[command(name = "ccontext")]
#[command(about = "Pack a directory tree and its file contents into LLM-sized context chunks")]
#[command(version)]
struct Cli {
    /// Root directory to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Glob patterns to exclude; repeatable, "|"-separated accepted
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Glob patterns to force-include; win over excludes and gitignore
    #[arg(short, long)]
    include: Vec<String>,

    /// Maximum tokens per chunk
    #[arg(short, long)]
    max_tokens: Option<usize>,

    /// Fraction of the budget reserved as safety margin, in [0, 1)
    #[arg(long)]
    buffer_ratio: Option<f64>,

    /// Path to a custom configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Token encoding
    #[arg(long, value_enum)]
    encoding: Option<EncodingArg>,

    /// Do not apply .gitignore rules
    #[arg(long)]
    ignore_gitignore: bool,

    /// Print chunks to stdout instead of copying to the clipboard
    #[arg(long)]
    stdout: bool,

    /// Write the chunked document to a file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a Markdown rendition of the tree and contents to a file
    #[arg(long, value_name = "FILE")]
    generate_md: Option<PathBuf>,

    /// Deliver all chunks without prompting between them
    #[arg(short = 'y', long)]
    yes: bool,

    /// Echo chunk contents while delivering
    #[arg(short, long)]
    verbose: bool,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Cl100k,
    O200k,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Cl100k => Encoding::Cl100kBase,
            EncodingArg::O200k => Encoding::O200kBase,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "ccontext", &mut std::io::stdout());
        return;
    }

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

fn run(cli: Cli) -> Result<(), CcontextError> {
    let root = cli.path.canonicalize().map_err(|_| {
        CcontextError::Build(ccontext::BuildError::NotFound(cli.path.clone()))
    })?;

    let mut config = Config::load(&root, cli.config.as_deref())?;
    config.merge_patterns(&cli.exclude, &cli.include);
    if let Some(max_tokens) = cli.max_tokens {
        config.max_tokens = max_tokens;
    }
    if let Some(buffer_ratio) = cli.buffer_ratio {
        config.buffer_ratio = buffer_ratio;
    }
    if let Some(encoding) = cli.encoding {
        config.encoding = encoding.into();
    }
    if cli.ignore_gitignore {
        config.respect_gitignore = false;
    }
    config.verbose |= cli.verbose;
    config.validate()?;

    let counter = TokenCounter::new(config.encoding);
    let matcher = ExcludeMatcher::new(
        &root,
        &config.excludes,
        &config.includes,
        config.respect_gitignore,
    )?;

    let tree = build_file_tree(&root, &matcher, &counter, &config.uploadable_extensions)?;

    // Status output goes to stderr so --stdout and -o stay clean.
    eprintln!("Root Path: {}\n", root.display());
    eprint!("{}", render_tree(&tree));

    let segments = extract_segments(&tree, &counter);
    let header = build_header(&root, &tree, &config.context_prompt, &counter);
    let footer = build_footer(&counter);

    if let Some(md_path) = &cli.generate_md {
        write_markdown(md_path, &tree, &segments)?;
        eprintln!("Markdown file generated at {}", md_path.display());
    }

    let chunks = pack(
        header,
        segments,
        footer,
        PackOptions::new(config.max_tokens, config.buffer_ratio),
        &counter,
    )?;

    let total_tokens: usize = chunks.iter().map(|c| c.payload_tokens).sum();
    eprintln!(
        "\nTokens: {}/{}",
        format_number(total_tokens),
        format_number(config.max_tokens)
    );
    if chunks.len() > 1 {
        eprintln!(
            "The output exceeds the token limit and will be delivered in {} chunks.",
            chunks.len()
        );
        for chunk in &chunks {
            eprintln!("Chunk {}: {} tokens", chunk.index, chunk.tokens);
        }
    }

    if chunks.is_empty() {
        eprintln!("Nothing to deliver: no included files under the root.");
        return Ok(());
    }

    if let Some(path) = &cli.output {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        write_output_file(path, &texts)?;
        eprintln!("Output written to {}", path.display());
        return Ok(());
    }

    if cli.stdout {
        let mut out = std::io::stdout().lock();
        for chunk in &chunks {
            writeln!(out, "{}", chunk.text)?;
        }
        return Ok(());
    }

    deliver_to_clipboard(&chunks, cli.yes, config.verbose)?;
    Ok(())
}

/// Copy chunks to the clipboard one at a time, pausing between them so
/// each can be pasted before the next overwrites it.
fn deliver_to_clipboard(chunks: &[Chunk], skip_prompts: bool, verbose: bool) -> Result<(), CcontextError> {
    if chunks.len() == 1 {
        copy_to_clipboard(&chunks[0].text)?;
        eprintln!("Copied to clipboard.");
        return Ok(());
    }

    let stdin = std::io::stdin();
    for chunk in chunks {
        if !skip_prompts {
            eprint!(
                "(Chunk {}/{}) Press Enter to continue or type 'q' to abort: ",
                chunk.index, chunk.total
            );
            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            if line.trim().eq_ignore_ascii_case("q") {
                eprintln!("Operation aborted by user.");
                return Ok(());
            }
        }

        if verbose {
            println!("{}", chunk.text);
        }
        copy_to_clipboard(&chunk.text)?;
        eprintln!("Copied chunk {}/{}.", chunk.index, chunk.total);
    }

    eprintln!("Successfully finished all chunks ({0}/{0}).", chunks.len());
    Ok(())
}
