use assert_cmd::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;

fn hostcheck(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hostcheck").expect("binary exists");
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

#[test]
fn prints_default_config() {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let out = hostcheck(tmpdir.path())
        .arg("--print-default-config")
        .output()
        .expect("run");
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("tcp_endpoints:"));
    assert!(text.contains("max_lines: 100"));
    assert!(!tmpdir.path().join("system_health.log").exists());
}

#[test]
fn missing_disk_path_is_reported_not_fatal() {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let out = hostcheck(tmpdir.path())
        .args(["--no-network", "--disk", "/nonexistent/hostcheck-disk"])
        .output()
        .expect("run");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let report: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json report");
    for key in ["timestamp", "platform", "cpu", "memory", "disk", "uptime", "network"] {
        assert!(report.get(key).is_some(), "missing {key}");
    }
    let disk_error = report["disk"]["error"].as_str().expect("disk error");
    assert!(disk_error.contains("does not exist"), "{disk_error}");
    assert_eq!(
        report["network"]["error"].as_str(),
        Some("network check disabled")
    );

    let log = fs::read_to_string(tmpdir.path().join("system_health.log")).expect("log written");
    assert!(log.lines().count() <= 100);
    assert!(log.contains("disk: unavailable"));
}

#[test]
fn unwritable_output_fails_without_side_effects() {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let report_path = tmpdir.path().join("missing").join("dir").join("report.json");
    let out = hostcheck(tmpdir.path())
        .args(["--no-network", "--top", "0", "--no-critical", "--output"])
        .arg(&report_path)
        .output()
        .expect("run");

    assert_eq!(out.status.code(), Some(1));
    assert!(!report_path.exists());
    assert!(!tmpdir.path().join("system_health.log").exists());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(stderr.matches("failed to create").count(), 1, "{stderr}");
}

#[test]
fn invalid_settings_exit_with_config_code() {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let out = hostcheck(tmpdir.path())
        .args(["--no-network", "--log-max-lines", "0"])
        .output()
        .expect("run");
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());

    let cfg = tmpdir.path().join("bad.yaml");
    fs::write(&cfg, "network: [oops").expect("write config");
    let out = hostcheck(tmpdir.path())
        .arg("--config")
        .arg(&cfg)
        .output()
        .expect("run");
    assert_eq!(out.status.code(), Some(2));
    assert!(!tmpdir.path().join("system_health.log").exists());
}

#[test]
fn yaml_settings_are_overridden_by_flags() {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let cfg = tmpdir.path().join("hostcheck.yaml");
    fs::write(
        &cfg,
        "output:\n  format: text\nlog:\n  path: from-yaml.log\nnetwork:\n  enabled: true\n  tcp_endpoints: []\n",
    )
    .expect("write config");

    // The YAML alone would fail validation; --no-network makes it valid.
    let out = hostcheck(tmpdir.path())
        .arg("--config")
        .arg(&cfg)
        .args(["--no-network", "--top", "0", "--no-critical"])
        .output()
        .expect("run");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.starts_with('['), "{text}");
    assert!(text.contains("network: unavailable (network check disabled)"));
    assert!(tmpdir.path().join("from-yaml.log").exists());
}

#[test]
fn log_stays_bounded_across_runs() {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let log = tmpdir.path().join("health.log");
    for _ in 0..4 {
        let out = hostcheck(tmpdir.path())
            .args(["--no-network", "--top", "0", "--no-critical", "--log-max-lines", "12", "--log-file"])
            .arg(&log)
            .output()
            .expect("run");
        assert!(out.status.success());
        let text = fs::read_to_string(&log).expect("log");
        assert!(text.lines().count() <= 12, "{text}");
        assert!(text.starts_with('['), "{text}");
    }
}

#[test]
fn no_log_flag_skips_log_file() {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let report = tmpdir.path().join("report.txt");
    let out = hostcheck(tmpdir.path())
        .args(["--no-network", "--top", "0", "--no-critical", "--no-log", "--format", "text", "--output"])
        .arg(&report)
        .output()
        .expect("run");
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    assert!(fs::read_to_string(&report).expect("report").ends_with("\n\n"));
    assert!(!tmpdir.path().join("system_health.log").exists());
}
