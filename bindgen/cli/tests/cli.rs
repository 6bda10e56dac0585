//! End-to-end runs of the `raybridge` binary against the headless runtime.

use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_dir() -> std::path::PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("raybridge_cli_{}_{id}", std::process::id()));
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn raybridge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_raybridge"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run raybridge")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn runs_the_demo_for_the_requested_frames() {
    let output = raybridge(&["--frames", "5"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("ran 5 frames (0 errors)"), "stdout: {out}");
}

#[test]
fn manual_palette_builds_colors_with_the_constructor() {
    let output = raybridge(&["--frames", "2", "--manual-palette"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("ran 2 frames (0 errors)"), "stdout: {out}");
    // No palette was installed and the per-frame colors were released.
    assert!(out.contains("0 live blocks"), "stdout: {out}");
}

#[test]
fn check_resolves_the_bundled_api() {
    let output = raybridge(&["--check"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("17 functions"), "stdout: {out}");
    assert!(out.contains("7 structs"), "stdout: {out}");
    assert!(out.contains("(1 skipped)"), "stdout: {out}");
}

#[test]
fn dump_layouts_shows_packed_offsets() {
    let output = raybridge(&["--dump-layouts"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Color (4 bytes)"), "stdout: {out}");
    assert!(out.contains("Font (40 bytes)"), "stdout: {out}");
    assert!(out.contains("+12  texture: Texture"), "stdout: {out}");
    assert!(out.contains("Texture2D = Texture"), "stdout: {out}");
}

#[test]
fn dump_catalog_lists_only_exported_functions() {
    let output = raybridge(&["--dump-catalog"]);
    assert!(output.status.success());
    let out = stdout(&output);
    let clear = out
        .lines()
        .find(|l| l.starts_with("ClearBackground"))
        .expect("ClearBackground missing from catalog");
    assert!(clear.contains("adapted"));
    let begin = out
        .lines()
        .find(|l| l.starts_with("BeginDrawing"))
        .expect("BeginDrawing missing from catalog");
    assert!(begin.contains("raw"));
    assert!(!out.contains("DrawLine"));
    assert!(!out.contains("SetTraceLogCallback"));
}

#[test]
fn dump_tokens_then_parse() {
    let output = raybridge(&["--dump-tokens", "const char *"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Const @ 0..5"), "stdout: {out}");
    assert!(out.contains("Star @ 11..12"), "stdout: {out}");
    assert!(out.contains("Eof @ 12..12"), "stdout: {out}");
}

#[test]
fn type_syntax_errors_are_reported_with_a_label() {
    let output = raybridge(&["--dump-tokens", "const *"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Type syntax error"), "stderr: {err}");
    assert!(err.contains("<type>"), "stderr: {err}");
}

#[test]
fn missing_api_file_fails() {
    let output = raybridge(&["/nonexistent/raylib_api.json", "--check"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("cannot read"));
}

#[test]
fn config_file_is_applied() {
    let dir = unique_dir();
    let path = dir.join("raybridge.json");
    std::fs::write(&path, r#"{ "palette": "manual" }"#).unwrap();

    let output = raybridge(&["--config", path.to_str().unwrap(), "--frames", "1"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("0 live blocks"));
}

#[test]
fn bad_config_fails() {
    let dir = unique_dir();
    let path = dir.join("raybridge.json");
    std::fs::write(&path, r#"{ "palette": "sometimes" }"#).unwrap();

    let output = raybridge(&["--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("API error"));
}
