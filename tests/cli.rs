use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn ccontext(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_ccontext"))
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn cli_stdout_document_contains_tree_and_contents() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join("a.txt"), "alpha file contents\n");
    write_file(&dir.path().join("sub/c.txt"), "nested file contents\n");

    let output = ccontext(&[dir.path().to_str().unwrap(), "--stdout", "--yes"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("### ========== File Tree =========="));
    assert!(stdout.contains("a.txt"));
    assert!(stdout.contains("sub/"));
    assert!(stdout.contains("#### File: a.txt"));
    assert!(stdout.contains("alpha file contents"));
    assert!(stdout.contains("#### File: sub/c.txt"));
    assert!(stdout.contains("nested file contents"));
    assert!(stdout.contains("### ========== End of Detailed File Contents =========="));
}

#[test]
fn cli_exclude_pattern_prunes_files() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join("keep.txt"), "keep me\n");
    write_file(&dir.path().join("drop.log"), "drop me\n");

    let output = ccontext(&[
        dir.path().to_str().unwrap(),
        "--stdout",
        "--yes",
        "-e",
        "*.log",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("keep me"));
    assert!(!stdout.contains("drop me"));
    // Excluded entries still appear in the tree, marked.
    assert!(stdout.contains("drop.log [excluded]"));
}

#[test]
fn cli_include_overrides_gitignore() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join(".gitignore"), "*.log\n");
    write_file(&dir.path().join("visible.txt"), "visible body\n");
    write_file(&dir.path().join("wanted.log"), "wanted body\n");
    write_file(&dir.path().join("unwanted.log"), "unwanted body\n");

    let output = ccontext(&[
        dir.path().to_str().unwrap(),
        "--stdout",
        "--yes",
        "-i",
        "wanted.log",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("visible body"));
    assert!(stdout.contains("wanted body"));
    assert!(!stdout.contains("unwanted body"));
}

#[test]
fn cli_small_budget_produces_framed_chunks() {
    let dir = tempdir().unwrap();

    let body: String = (0..200)
        .map(|i| format!("line number {} with several words on it\n", i))
        .collect();
    write_file(&dir.path().join("big.txt"), &body);

    let output = ccontext(&[
        dir.path().to_str().unwrap(),
        "--stdout",
        "--yes",
        "-m",
        "500",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("## Initialization"));
    assert!(stdout.contains("### Chunk 1 of "));
    assert!(stdout.contains("###More chunks to follow...###"));
    assert!(stdout.contains("###This is the final chunk.###"));
}

#[test]
fn cli_generate_md_writes_document() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join("a.txt"), "markdown me\n");
    let md_path = dir.path().join("context.md");

    let output = ccontext(&[
        dir.path().to_str().unwrap(),
        "--stdout",
        "--yes",
        "--generate-md",
        md_path.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let md = fs::read_to_string(&md_path).unwrap();
    assert!(md.starts_with("# Directory and File Contents"));
    assert!(md.contains("markdown me"));
}

#[test]
fn cli_project_config_is_used() {
    let dir = tempdir().unwrap();

    write_file(
        &dir.path().join(".ccontext-config.json"),
        r#"{"excluded_folders_files": ["secret.txt"]}"#,
    );
    write_file(&dir.path().join("secret.txt"), "hidden body\n");
    write_file(&dir.path().join("open.txt"), "open body\n");

    let output = ccontext(&[dir.path().to_str().unwrap(), "--stdout", "--yes"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("open body"));
    assert!(!stdout.contains("hidden body"));
}

#[test]
fn cli_missing_root_fails_with_walk_exit_code() {
    let output = ccontext(&["/nonexistent/path", "--stdout", "--yes"]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(3));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("error:"));
}

#[test]
fn cli_invalid_budget_rejected_before_walk() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a.txt"), "body\n");

    let output = ccontext(&[
        dir.path().to_str().unwrap(),
        "--stdout",
        "--yes",
        "-m",
        "0",
    ]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_output_file_written() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a.txt"), "file body here\n");
    let out_path = dir.path().join("context.txt");

    let output = ccontext(&[
        dir.path().to_str().unwrap(),
        "--yes",
        "-o",
        out_path.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let written = fs::read_to_string(&out_path).unwrap();
    assert!(written.contains("file body here"));
}
