//! CLI integration tests
//!
//! Drives the gpgsym binary end-to-end with a fake gpg on `PATH`.

mod common;

use common::{install_fake_gpg, recorded_argvs};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const BEGIN: &str = "-----BEGIN PGP MESSAGE-----";
const END: &str = "-----END PGP MESSAGE-----";

/// Get path to the gpgsym binary
fn gpgsym_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gpgsym"))
}

/// `PATH` with `tool_dir` first, followed by the usual system directories
/// so the fake tool's own helpers resolve.
fn search_path(tool_dir: &Path) -> String {
    format!("{}:/usr/bin:/bin", tool_dir.display())
}

/// Run gpgsym with passphrases taken from stdin and the given script as input
fn run_gpgsym(path: &str, args: &[&str], script: &str) -> Output {
    let mut child = Command::new(gpgsym_bin())
        .args(args)
        .env("PATH", path)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start gpgsym");

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        let _ = stdin.write_all(script.as_bytes());
    }

    child.wait_with_output().expect("failed to wait for gpgsym")
}

fn run_interactive(tool_dir: &Path, script: &str) -> String {
    let output = run_gpgsym(
        &search_path(tool_dir),
        &["--nocolor", "--passphrase-stdin"],
        script,
    );
    assert!(
        output.status.success(),
        "gpgsym failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

/// Pull the armored block out of an encryption transcript.
fn armored_block(transcript: &str) -> String {
    let start = transcript.find(BEGIN).expect("no armor header in output");
    let end = transcript[start..].find(END).expect("no armor footer in output") + start;
    transcript[start..end + END.len()].to_string()
}

#[test]
fn test_encrypt_then_decrypt() {
    let temp_dir = TempDir::new().unwrap();
    install_fake_gpg(temp_dir.path(), "gpg");

    let transcript = run_interactive(
        temp_dir.path(),
        "e\nhello world\nsecond line\n;;;\ntest\ntest\nq\n",
    );
    assert!(transcript.contains("Encrypted message follows:"));
    let armored = armored_block(&transcript);

    let transcript = run_interactive(temp_dir.path(), &format!("d\n{}\ntest\nq\n", armored));
    assert!(
        transcript.contains("Decrypted message follows:\n\nhello world\nsecond line\n"),
        "unexpected transcript: {}",
        transcript
    );
}

#[test]
fn test_decrypt_retry_with_new_passphrase() {
    let temp_dir = TempDir::new().unwrap();
    install_fake_gpg(temp_dir.path(), "gpg");

    let transcript = run_interactive(temp_dir.path(), "e\nretry me\n;;;\ngood\ngood\nq\n");
    let armored = armored_block(&transcript);

    let transcript = run_interactive(
        temp_dir.path(),
        &format!("d\n{}\nbad\nY\ngood\nq\n", armored),
    );
    let failure = transcript.find("Error in decryption process!").unwrap();
    let success = transcript.find("Decrypted message follows:").unwrap();
    assert!(failure < success);
    assert!(transcript.contains("retry me"));

    // encrypt once, decrypt twice
    assert_eq!(recorded_argvs(temp_dir.path()).len(), 3);
}

#[test]
fn test_passphrase_not_on_command_line() {
    let temp_dir = TempDir::new().unwrap();
    install_fake_gpg(temp_dir.path(), "gpg");

    run_interactive(
        temp_dir.path(),
        "e\nmsg\n;;;\nunguessable-9f2c\nunguessable-9f2c\nq\n",
    );

    let argvs = recorded_argvs(temp_dir.path());
    assert_eq!(argvs.len(), 1);
    assert!(argvs[0].iter().all(|arg| !arg.contains("unguessable")));
}

#[test]
fn test_end_of_input_exits_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    install_fake_gpg(temp_dir.path(), "gpg");

    let transcript = run_interactive(temp_dir.path(), "");
    assert!(transcript.contains("]uit?"));
    assert!(recorded_argvs(temp_dir.path()).is_empty());
}

#[test]
fn test_missing_tool_is_fatal() {
    let temp_dir = TempDir::new().unwrap();

    let output = run_gpgsym(
        temp_dir.path().to_str().unwrap(),
        &["--nocolor"],
        "q\n",
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("gpg or gpg2"), "stderr: {}", stderr);
    // the menu is never shown
    assert!(output.stdout.is_empty());
}

#[test]
fn test_piped_stdin_without_passphrase_flag_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    install_fake_gpg(temp_dir.path(), "gpg");

    let output = run_gpgsym(
        &search_path(temp_dir.path()),
        &["--nocolor"],
        "e\nlong message\n;;;\n",
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--passphrase-stdin"), "stderr: {}", stderr);
    // refused before the menu, so no message was collected
    assert!(output.stdout.is_empty());
    assert!(recorded_argvs(temp_dir.path()).is_empty());
}

#[test]
fn test_unknown_argument_prints_usage() {
    let temp_dir = TempDir::new().unwrap();
    install_fake_gpg(temp_dir.path(), "gpg");

    let output = run_gpgsym(&search_path(temp_dir.path()), &["colorful"], "");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {}", stderr);
}
