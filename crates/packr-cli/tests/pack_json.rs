//! Integration tests for `packr --json pack` and `packr --json build`.

use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "packr-cli", "--bin", "packr", "--"]);
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| {
        panic!(
            "stdout should be valid JSON: {e}\nstdout: {stdout}\nstderr: {}",
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

#[test]
fn test_pack_json_success() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.js"), "var _secret = 1;\n").unwrap();
    fs::write(
        dir.path().join("b.js"),
        "function read(value) {\n  return value + _secret;\n}\n",
    )
    .unwrap();

    let output = cargo_bin()
        .args(["--json", "--cwd"])
        .arg(dir.path())
        .args([
            "pack",
            "a.js",
            "b.js",
            "-o",
            "dist/app.js",
            "--shrink-vars",
            "--private",
            "--header",
            "/* app */",
        ])
        .output()
        .expect("Failed to run pack command");

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], true);
    assert!(json.get("error").is_none());
    assert!(json["map"].as_str().unwrap().ends_with("app.js.map"));

    let packed = fs::read_to_string(dir.path().join("dist/app.js")).unwrap();
    assert_eq!(
        packed,
        "/* app */\nvar _0=1;function read(a){return a+_0}"
    );
    assert!(dir.path().join("dist/app.js.map").exists());
}

#[test]
fn test_pack_json_missing_input() {
    let dir = tempdir().unwrap();

    let output = cargo_bin()
        .args(["--json", "--cwd"])
        .arg(dir.path())
        .args(["pack", "missing.js", "-o", "out.js"])
        .output()
        .expect("Failed to run pack command");

    assert!(!output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "READ_ERROR");
    assert!(json["error"]["path"]
        .as_str()
        .unwrap()
        .ends_with("missing.js"));
}

#[test]
fn test_pack_json_lex_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("bad.js"), "var s = 'open;\n").unwrap();

    let output = cargo_bin()
        .args(["--json", "--cwd"])
        .arg(dir.path())
        .args(["pack", "bad.js", "-o", "out.js"])
        .output()
        .expect("Failed to run pack command");

    assert!(!output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["error"]["code"], "LEX_ERROR");
    assert!(!dir.path().join("out.js").exists());
}

#[test]
fn test_build_json_runs_manifest() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.js"), "var a = 1;").unwrap();
    fs::write(
        dir.path().join("packr.json"),
        r#"{"bundles": [{"inputs": ["a.js"], "output": "out/a.js", "options": {"base62": true}}]}"#,
    )
    .unwrap();

    let output = cargo_bin()
        .args(["--json", "--cwd"])
        .arg(dir.path())
        .arg("build")
        .output()
        .expect("Failed to run build command");

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["bundles"].as_array().unwrap().len(), 1);

    let packed = fs::read_to_string(dir.path().join("out/a.js")).unwrap();
    assert!(packed.starts_with("eval(function(p,a,c,k,e,r)"));
}

#[test]
fn test_build_json_missing_manifest() {
    let dir = tempdir().unwrap();

    let output = cargo_bin()
        .args(["--json", "--cwd"])
        .arg(dir.path())
        .arg("build")
        .output()
        .expect("Failed to run build command");

    assert!(!output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "READ_ERROR");
}

#[test]
fn test_version() {
    let output = cargo_bin()
        .arg("version")
        .output()
        .expect("Failed to run version command");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("packr "));
}
