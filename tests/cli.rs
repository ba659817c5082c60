//! Black-box tests for the `easyserve` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn easyserve_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_easyserve"))
}

fn write_config(root: &Path) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("easyserve.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[db]
path = "{}"

[chunking]
max_chars = 200
overlap_chars = 20

[embedding]
provider = "hashing"
dims = 128

[logging]
level = "warn"
"#,
            root.join("data/easyserve.sqlite").display()
        ),
    )
    .unwrap();
    config_path
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(easyserve_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run easyserve")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn init_creates_database() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());

    let output = run(&config, &["init"]);
    assert!(output.status.success());
    assert!(tmp.path().join("data/easyserve.sqlite").exists());

    // Idempotent.
    assert!(run(&config, &["init"]).status.success());
}

#[test]
fn upload_then_status_then_delete() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    let doc = tmp.path().join("shipping.txt");
    fs::write(&doc, "Standard shipping takes three to five days.\n\nExpress ships next day.").unwrap();

    let uploaded = stdout_json(&run(
        &config,
        &["upload", doc.to_str().unwrap(), "--tenant", "3"],
    ));
    assert_eq!(uploaded["processed"], true);
    assert_eq!(uploaded["stage"], "done");
    assert_eq!(uploaded["file_type"], "text/plain");
    let id = uploaded["id"].as_i64().unwrap().to_string();

    let status = stdout_json(&run(&config, &["status", &id]));
    assert_eq!(status["chunk_count"], 1);
    assert_eq!(status["embedding_model"], "hashing-128");

    let deleted = stdout_json(&run(&config, &["delete", &id]));
    assert_eq!(deleted["records_purged"], 1);

    assert!(!run(&config, &["status", &id]).status.success());
}

#[test]
fn ask_without_documents_returns_not_found_answer() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());

    let answer = stdout_json(&run(&config, &["ask", "How long is shipping?", "--tenant", "9"]));
    assert_eq!(answer["retrieved"].as_array().unwrap().len(), 0);
    assert!(answer["answer"]
        .as_str()
        .unwrap()
        .contains("could not find"));
}

#[test]
fn upload_of_unsupported_file_reports_failure() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    let file = tmp.path().join("image.png");
    fs::write(&file, b"\x89PNG").unwrap();

    let output = run(
        &config,
        &[
            "upload",
            file.to_str().unwrap(),
            "--tenant",
            "1",
            "--mime",
            "image/png",
        ],
    );
    assert!(!output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["stage"], "failed");
    assert_eq!(status["processed"], false);
}

#[test]
fn invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bad.toml");
    fs::write(
        &config,
        "[db]\npath = \"x.sqlite\"\n[chunking]\nmax_chars = 10\noverlap_chars = 10\n",
    )
    .unwrap();

    let output = run(&config, &["init"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("overlap_chars"));
}
