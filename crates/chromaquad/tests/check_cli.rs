use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn write_config(root: &std::path::Path, extra: &str) -> std::path::PathBuf {
    let path = root.join("chromaquad.toml");
    fs::write(&path, format!("version = 1\n{extra}")).unwrap();
    path
}

#[test]
fn check_links_builtin_shaders() {
    let root = TempDir::new().unwrap();
    let config = write_config(root.path(), "");

    let output = Command::new(env!("CARGO_BIN_EXE_chromaquad"))
        .env("CHROMAQUAD_CONFIG", &config)
        .env("RUST_LOG", "warn")
        .arg("--check")
        .output()
        .expect("failed to spawn chromaquad");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("shader program linked"));
    assert!(stdout.contains("aVertexPosition"));
    assert!(stdout.contains("uColor"));
}

#[test]
fn check_reports_broken_fragment_shader() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("broken.frag"),
        "#version 450\nvoid main() { not valid glsl }\n",
    )
    .unwrap();
    let config = write_config(root.path(), "[shaders]\nfragment = \"broken.frag\"\n");

    let output = Command::new(env!("CARGO_BIN_EXE_chromaquad"))
        .env("CHROMAQUAD_CONFIG", &config)
        .env("RUST_LOG", "off")
        .arg("--check")
        .output()
        .expect("failed to spawn chromaquad");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to compile fragment shader"),
        "stderr: {stderr}"
    );
}

#[test]
fn startup_failure_is_logged_once() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("broken.frag"),
        "#version 450\nvoid main() { not valid glsl }\n",
    )
    .unwrap();
    let config = write_config(root.path(), "[shaders]\nfragment = \"broken.frag\"\n");

    let output = Command::new(env!("CARGO_BIN_EXE_chromaquad"))
        .env("CHROMAQUAD_CONFIG", &config)
        .env("RUST_LOG", "error")
        .env("NO_COLOR", "1")
        .arg("--check")
        .output()
        .expect("failed to spawn chromaquad");

    assert!(!output.status.success());
    let logs = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        logs.matches("failed to compile fragment shader").count(),
        1,
        "logs: {logs}"
    );
}

#[test]
fn strict_policy_rejects_fragment_without_fill_color() {
    let root = TempDir::new().unwrap();
    let fragment = root.path().join("plain.frag");
    fs::write(
        &fragment,
        "#version 450\nlayout(location = 0) out vec4 fragColor;\nvoid main() { fragColor = vec4(1.0); }\n",
    )
    .unwrap();
    let config = write_config(root.path(), "");

    let skipped = Command::new(env!("CARGO_BIN_EXE_chromaquad"))
        .env("CHROMAQUAD_CONFIG", &config)
        .env("RUST_LOG", "off")
        .arg("--check")
        .arg("--fragment-shader")
        .arg(&fragment)
        .output()
        .expect("failed to spawn chromaquad");
    assert!(skipped.status.success());
    assert!(String::from_utf8_lossy(&skipped.stdout).contains("unresolved"));

    let strict = Command::new(env!("CARGO_BIN_EXE_chromaquad"))
        .env("CHROMAQUAD_CONFIG", &config)
        .env("RUST_LOG", "off")
        .args(["--check", "--missing-uniform", "fail", "--fragment-shader"])
        .arg(&fragment)
        .output()
        .expect("failed to spawn chromaquad");
    assert!(!strict.status.success());
    assert!(String::from_utf8_lossy(&strict.stderr).contains("failed to link shader program"));
}

#[test]
fn invalid_config_file_is_rejected() {
    let root = TempDir::new().unwrap();
    let config = write_config(root.path(), "[render]\nframe_quantum = 0.0\n");

    let output = Command::new(env!("CARGO_BIN_EXE_chromaquad"))
        .env("CHROMAQUAD_CONFIG", &config)
        .env("RUST_LOG", "off")
        .arg("--check")
        .output()
        .expect("failed to spawn chromaquad");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("frame_quantum"));
}
