use assert_cmd::Command;

/// `tso status` against a cold data directory prints a report without
/// error and without requiring the pipeline to be running.
#[test]
fn status_on_cold_data_dir_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::cargo_bin("tso")
        .unwrap()
        .args(["--data-dir", dir.path().to_str().unwrap(), "status"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("oracle ceiling:"));
}

/// `tso status --json` emits a JSON object with the documented fields.
#[test]
fn status_json_has_expected_shape() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::cargo_bin("tso")
        .unwrap()
        .args([
            "--data-dir",
            dir.path().to_str().unwrap(),
            "status",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(parsed.get("oracle_ceiling").is_some());
    assert!(parsed.get("low_watermark").is_some());
    assert!(parsed.get("metrics").is_some());
}

/// `tso completions bash` prints a nonempty completion script naming the
/// binary.
#[test]
fn completions_subcommand_emits_a_script() {
    let output = Command::cargo_bin("tso")
        .unwrap()
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tso"));
}
