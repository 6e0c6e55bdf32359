//! Integration tests for the jsift command-line binary.

use std::io::Write;
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;

fn run_stdin(args: &[&str], input: &str) -> (String, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jsift"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn jsift");
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .expect("failed to write stdin");
    }
    let output = child.wait_with_output().expect("failed to wait for jsift");
    (
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
        output.status.code().unwrap_or(-1),
    )
}

#[test]
fn test_query_from_stdin() {
    let (stdout, _, code) = run_stdin(&[".user"], r#"{"user": "midbel"}"#);
    assert_eq!(code, 0);
    assert_eq!(stdout, "\"midbel\"\n");
}

#[test]
fn test_query_from_file() {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    file.write_all(br#"{"items": [{"n": 1}, {"n": 2}]}"#)
        .expect("failed to write temp file");
    let path = file.path().to_string_lossy().into_owned();
    let output = Command::new(env!("CARGO_BIN_EXE_jsift"))
        .args([".items[].n", &path])
        .output()
        .expect("failed to run jsift");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "[1, 2]\n");
}

#[test]
fn test_dash_reads_stdin() {
    let (stdout, _, code) = run_stdin(&[".a", "-"], r#"{"a": true}"#);
    assert_eq!(code, 0);
    assert_eq!(stdout, "true\n");
}

#[test]
fn test_list_prints_one_value_per_line() {
    let (stdout, _, code) = run_stdin(&["--list", ".items[]"], r#"{"items": [1, 2, 3]}"#);
    assert_eq!(code, 0);
    assert_eq!(stdout, "1\n2\n3\n");
}

#[test]
fn test_debug_prints_the_tree() {
    let (stdout, _, code) = run_stdin(&["--debug", ".items[0].name"], "");
    assert_eq!(code, 0);
    assert!(stdout.contains("ident(items)"), "{stdout}");
    assert!(stdout.contains("index(0)"), "{stdout}");
    assert!(stdout.contains("ident(name)"), "{stdout}");
}

#[test]
fn test_bad_query_exits_2() {
    let (_, stderr, code) = run_stdin(&["ident"], "{}");
    assert_eq!(code, 2);
    assert!(stderr.contains("parse error"), "{stderr}");
}

#[test]
fn test_malformed_document_exits_1() {
    let (_, stderr, code) = run_stdin(&["."], "{\"a\": tru}");
    assert_eq!(code, 1);
    assert!(!stderr.is_empty());
}

#[test]
fn test_missing_file_exits_2() {
    let output = Command::new(env!("CARGO_BIN_EXE_jsift"))
        .args([".", "/no/such/file.json"])
        .output()
        .expect("failed to run jsift");
    assert_eq!(output.status.code(), Some(2));
}
