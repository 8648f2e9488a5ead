#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/ifrrpc-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn ifrrpc() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ifrrpc"));
    cmd.arg("--log-level").arg("error").arg("--format").arg("json");
    cmd
}

fn spawn_frame(sock_path: &Path) -> Child {
    let child = ifrrpc()
        .arg("frame")
        .arg(sock_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("frame command should start");
    wait_for_socket(sock_path, Duration::from_secs(3));
    child
}

// The frame accepts a single page, so readiness is checked without connecting.
fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket {} never appeared", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn finish(child: Child) -> Output {
    child.wait_with_output().expect("child should exit")
}

#[test]
fn call_ping_prints_pong() {
    let dir = unique_temp_dir("ping");
    let sock_path = dir.join("frame.sock");
    let frame = spawn_frame(&sock_path);

    let output = ifrrpc()
        .arg("call")
        .arg(&sock_path)
        .arg("ping")
        .arg("--wait")
        .arg("--timeout")
        .arg("3s")
        .output()
        .expect("call should run");

    assert!(output.status.success(), "call failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"event\":\"replied\""), "stdout: {stdout}");
    assert!(stdout.contains("\"payload\":\"pong\""), "stdout: {stdout}");

    // The caller closes with `quit`, which ends the frame.
    let frame_output = finish(frame);
    assert!(frame_output.status.success());
    assert!(String::from_utf8_lossy(&frame_output.stdout).contains("\"event\":\"quit\""));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn call_without_reply_times_out_with_124() {
    let dir = unique_temp_dir("timeout");
    let sock_path = dir.join("frame.sock");
    let frame = spawn_frame(&sock_path);

    let output = ifrrpc()
        .arg("call")
        .arg(&sock_path)
        .arg("history")
        .arg("--params")
        .arg("[\"home\"]")
        .arg("--wait")
        .arg("--timeout")
        .arg("300ms")
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(124));
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"event\":\"timed_out\""));

    let frame_output = finish(frame);
    let frame_stdout = String::from_utf8_lossy(&frame_output.stdout);
    assert!(frame_stdout.contains("\"event\":\"history\""), "frame: {frame_stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn page_pushes_prefs_and_history_then_receives_suggestions() {
    let dir = unique_temp_dir("page");
    let sock_path = dir.join("frame.sock");
    let frame = spawn_frame(&sock_path);

    let output = ifrrpc()
        .arg("page")
        .arg(&sock_path)
        .arg("--hostname")
        .arg("example.com")
        .arg("--canonical")
        .arg("https://example.com/story")
        .arg("--cookie")
        .arg("theme=dark; _gid=GA1.2.42")
        .arg("--linger")
        .arg("1s")
        .output()
        .expect("page should run");

    assert!(output.status.success(), "page failed: {output:?}");
    let page_stdout = String::from_utf8_lossy(&output.stdout);
    assert!(page_stdout.contains("\"event\":\"suggestions\""), "page: {page_stdout}");
    assert!(
        page_stdout.contains("related:https://example.com/story"),
        "page: {page_stdout}"
    );

    let frame_output = finish(frame);
    assert!(frame_output.status.success());
    let frame_stdout = String::from_utf8_lossy(&frame_output.stdout);
    assert!(frame_stdout.contains("\"gid\":\"GA1.2.42\""), "frame: {frame_stdout}");
    assert!(
        frame_stdout.contains("\"payload\":\"https://example.com/story\""),
        "frame: {frame_stdout}"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn call_to_missing_socket_returns_transport_error() {
    let missing = unique_temp_dir("missing").join("none.sock");

    let output = ifrrpc()
        .arg("call")
        .arg(&missing)
        .arg("ping")
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn invalid_params_return_usage() {
    let output = ifrrpc()
        .arg("call")
        .arg("/tmp/ifrrpc-unused.sock")
        .arg("ping")
        .arg("--params")
        .arg("[1,")
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_reports_crate_version() {
    let output = ifrrpc()
        .arg("version")
        .arg("--extended")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    assert!(stdout.contains("protocol: jsonrpc 2.0"));
}
