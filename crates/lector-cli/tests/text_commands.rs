use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

const SAMPLE: &str = "First sentence here. Second sentence here. Third one.";

#[test]
fn test_normalize_reads_stdin() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("lector")
        .env("LECTOR_HOME", dir.path())
        .arg("normalize")
        .write_stdin("r e a d i n g is fun .")
        .assert()
        .success()
        .stdout("reading is fun.\n");
}

#[test]
fn test_normalize_reads_file() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("doc.txt");
    std::fs::write(&file, "a well - known fact").unwrap();

    cargo_bin_cmd!("lector")
        .env("LECTOR_HOME", dir.path())
        .arg("normalize")
        .arg(&file)
        .assert()
        .success()
        .stdout("a well-known fact\n");
}

#[test]
fn test_split_prints_numbered_chunks() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("lector")
        .env("LECTOR_HOME", dir.path())
        .args(["split", "--max-length", "25", "--first-length", "20"])
        .write_stdin(SAMPLE)
        .assert()
        .success()
        .stdout(predicate::str::contains("[0] First sentence here.\n"))
        .stdout(predicate::str::contains(
            "[1] Second sentence here. Third one.\n",
        ));
}

#[test]
fn test_split_json_output() {
    let dir = tempdir().unwrap();

    let output = cargo_bin_cmd!("lector")
        .env("LECTOR_HOME", dir.path())
        .args(["split", "-", "--max-length", "25", "--first-length", "20", "--json"])
        .write_stdin(SAMPLE)
        .output()
        .unwrap();
    assert!(output.status.success());

    let chunks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let chunks = chunks.as_array().unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0]["content"], "First sentence here.");
    assert_eq!(chunks[0]["is_first"], true);
    assert_eq!(chunks[1]["ordinal"], 1);
}

#[test]
fn test_split_rejects_zero_length() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("lector")
        .env("LECTOR_HOME", dir.path())
        .args(["split", "--max-length", "0"])
        .write_stdin(SAMPLE)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--max-length"));
}

#[test]
fn test_titles_reports_heading_end() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("lector")
        .env("LECTOR_HOME", dir.path())
        .arg("titles")
        .write_stdin("INTRODUCTION This is the body of the text.")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("13\tThis is the body"));
}

#[test]
fn test_translate_without_keys_prints_cleaned_text() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("lector")
        .env("LECTOR_HOME", dir.path())
        .env_remove("GEMINI_API_KEY")
        .env_remove("GEMINI_API_KEYS")
        .args(["translate", "--to", "German"])
        .write_stdin("don ' t stop")
        .assert()
        .success()
        .stdout("don't stop\n");
}

#[test]
fn test_summarize_without_keys_fails() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("lector")
        .env("LECTOR_HOME", dir.path())
        .env_remove("GEMINI_API_KEY")
        .env_remove("GEMINI_API_KEYS")
        .arg("summarize")
        .write_stdin("Some long text.")
        .assert()
        .failure()
        .stderr(predicate::str::contains("credential"));
}
