use assert_cmd::Command;
use serde_json::Value;

fn keybox_cmd(path: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("keybox").expect("binary exists");
    cmd.env("KEYBOX_TEST_KDF", "1").args(["--path", path.to_str().unwrap()]);
    cmd
}

#[test]
fn init_json_mode_wraps_value_and_meta() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    let output = keybox_cmd(&path)
        .args(["init", "--json"])
        .write_stdin("hunter2\nhunter2\n")
        .output()
        .expect("init json output");

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["meta"]["kind"].as_str(), Some("init"));
    assert_eq!(json["value"].as_str(), Some(path.display().to_string().as_str()));
}

#[test]
fn init_text_mode_prints_raw_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    let output = keybox_cmd(&path)
        .arg("init")
        .write_stdin("hunter2\nhunter2\n")
        .output()
        .expect("init output");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1, "expected a single-line output");
    assert_eq!(stdout.trim_end(), path.display().to_string());
}

#[test]
fn list_json_mode_reports_record_count() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("keybox.safe");

    keybox_cmd(&path)
        .arg("init")
        .write_stdin("hunter2\nhunter2\n")
        .assert()
        .success();
    keybox_cmd(&path)
        .args(["add", "--site", "example.com", "--password", "s3cr3t"])
        .write_stdin("hunter2\n")
        .assert()
        .success();

    let output = keybox_cmd(&path)
        .args(["list", "--json"])
        .write_stdin("hunter2\n")
        .output()
        .expect("list json output");

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["meta"]["kind"].as_str(), Some("list"));
    assert_eq!(json["meta"]["count"].as_u64(), Some(1));
}
