use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;

fn keybox_cmd(path: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("keybox").expect("binary exists");
    cmd.env("KEYBOX_TEST_KDF", "1").args(["--path", path.to_str().unwrap()]);
    cmd
}

#[test]
fn init_creates_file_with_expected_magic() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("correct horse battery staple\ncorrect horse battery staple\n")
        .assert()
        .success();

    assert!(path.exists(), "keybox file created");
    let bytes = fs::read(&path).expect("read keybox bytes");
    assert!(bytes.starts_with(b"[K]\0"));
}

#[test]
fn init_twice_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("correct horse battery staple\ncorrect horse battery staple\n")
        .assert()
        .success();

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("correct horse battery staple\ncorrect horse battery staple\n")
        .assert()
        .failure();
}

#[test]
fn add_get_list_and_find_round_trip() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("hunter2\nhunter2\n")
        .assert()
        .success();

    keybox_cmd(&path)
        .args(["add", "--site", "example.com", "--user", "alice", "--password", "s3cr3t"])
        .write_stdin("hunter2\n")
        .assert()
        .success();

    let list_output = keybox_cmd(&path)
        .args(["list", "--json"])
        .write_stdin("hunter2\n")
        .output()
        .expect("list output");
    assert!(list_output.status.success());
    let json: Value = serde_json::from_slice(&list_output.stdout).expect("valid json");
    assert_eq!(json["meta"]["count"].as_u64(), Some(1));

    let get_output = keybox_cmd(&path)
        .args(["get", "0", "--reveal", "--json"])
        .write_stdin("hunter2\n")
        .output()
        .expect("get output");
    assert!(get_output.status.success());
    let json: Value = serde_json::from_slice(&get_output.stdout).expect("valid json");
    assert_eq!(json["meta"]["password"].as_str(), Some("s3cr3t"));
    assert_eq!(json["meta"]["site"].as_str(), Some("example.com"));

    keybox_cmd(&path)
        .args(["find", "example"])
        .write_stdin("hunter2\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("example.com"));
}

#[test]
fn open_with_wrong_passphrase_exits_with_auth_failure_code() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("hunter2\nhunter2\n")
        .assert()
        .success();

    keybox_cmd(&path)
        .arg("list")
        .write_stdin("wrong-passphrase\n")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn passwd_changes_passphrase_and_reencrypts_passwords() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("old-pass\nold-pass\n")
        .assert()
        .success();

    keybox_cmd(&path)
        .args(["add", "--site", "example.com", "--password", "topsecret"])
        .write_stdin("old-pass\n")
        .assert()
        .success();

    keybox_cmd(&path)
        .arg("passwd")
        .write_stdin("old-pass\nnew-pass\nnew-pass\n")
        .assert()
        .success();

    keybox_cmd(&path)
        .arg("list")
        .write_stdin("old-pass\n")
        .assert()
        .failure();

    let get_output = keybox_cmd(&path)
        .args(["get", "0", "--reveal", "--json"])
        .write_stdin("new-pass\n")
        .output()
        .expect("get output");
    assert!(get_output.status.success());
    let json: Value = serde_json::from_slice(&get_output.stdout).expect("valid json");
    assert_eq!(json["meta"]["password"].as_str(), Some("topsecret"));
}

#[test]
fn export_plain_then_import_into_new_keybox_preserves_password() {
    let dir = tempfile::tempdir().expect("temp dir");
    let source = dir.path().join("source.safe");
    let target = dir.path().join("target.safe");
    let export_path = dir.path().join("export.tsv");

    keybox_cmd(&source)
        .arg("init")
        .write_stdin("hunter2\nhunter2\n")
        .assert()
        .success();
    keybox_cmd(&source)
        .args(["add", "--site", "example.com", "--password", "s3cr3t"])
        .write_stdin("hunter2\n")
        .assert()
        .success();
    keybox_cmd(&source)
        .args(["export", "--plain", "--output", export_path.to_str().unwrap()])
        .write_stdin("hunter2\n")
        .assert()
        .success();

    keybox_cmd(&target)
        .arg("init")
        .write_stdin("newpass\nnewpass\n")
        .assert()
        .success();
    keybox_cmd(&target)
        .args(["import", "--plain", "--input", export_path.to_str().unwrap()])
        .write_stdin("newpass\n")
        .assert()
        .success();

    let get_output = keybox_cmd(&target)
        .args(["get", "0", "--reveal", "--json"])
        .write_stdin("newpass\n")
        .output()
        .expect("get output");
    assert!(get_output.status.success());
    let json: Value = serde_json::from_slice(&get_output.stdout).expect("valid json");
    assert_eq!(json["meta"]["password"].as_str(), Some("s3cr3t"));
}
