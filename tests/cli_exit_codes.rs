use assert_cmd::Command;
use predicates::prelude::*;

fn keybox_cmd(path: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("keybox").expect("binary exists");
    cmd.env("KEYBOX_TEST_KDF", "1").args(["--path", path.to_str().unwrap()]);
    cmd
}

#[test]
fn init_succeeds() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("hunter2\nhunter2\n")
        .assert()
        .success();
}

#[test]
fn get_on_missing_keybox_fails_with_usage_code() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .args(["get", "0"])
        .write_stdin("hunter2\n")
        .assert()
        .failure()
        .code(64)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn open_with_wrong_passphrase_fails_with_auth_failure_code() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("hunter2\nhunter2\n")
        .assert()
        .success();

    keybox_cmd(&path)
        .arg("list")
        .write_stdin("wrong\n")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn get_out_of_range_index_fails_with_usage_code() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("hunter2\nhunter2\n")
        .assert()
        .success();

    keybox_cmd(&path)
        .args(["get", "5"])
        .write_stdin("hunter2\n")
        .assert()
        .failure()
        .code(64)
        .stderr(predicate::str::contains("no record at index 5"));
}

#[test]
fn corrupted_keybox_file_fails_with_file_format_code() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("hunter2\nhunter2\n")
        .assert()
        .success();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    keybox_cmd(&path)
        .arg("list")
        .write_stdin("hunter2\n")
        .assert()
        .failure();
}

#[test]
fn missing_arguments_fail_with_clap_usage_code() {
    Command::cargo_bin("keybox")
        .expect("binary exists")
        .arg("get")
        .assert()
        .failure()
        .code(64);
}
