//! Exit codes of the job binary for failures that happen before any network call

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

const PIPELINE: &str = r#"
submission_mode = "combined"
completeness = "strict"

[batches]
1 = ["test0"]

[[schemas.test0]]
columnName = "Key_Number"
columnObjectTypeId = "0-8"
propertyName = "key_number"
"#;

fn job() -> Command {
    let mut cmd = Command::cargo_bin("stageport-job").unwrap();
    cmd.env_remove("HUBSPOT_API_KEY")
        .env_remove("STAGEPORT_PIPELINE_CONFIG")
        .env_remove("STAGEPORT_RUN_ID")
        .env("LOG_LEVEL", "error");
    cmd
}

fn pipeline_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_help_lists_flags() {
    job()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--run-id"))
        .stdout(predicate::str::contains("--batch-num"))
        .stdout(predicate::str::contains("--pipeline-config"));
}

#[test]
fn test_invalid_batch_num_exits_1() {
    job()
        .args(["--batch-num", "two"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--batch-num"));
}

#[test]
fn test_missing_pipeline_file_exits_1() {
    job()
        .args(["--pipeline-config", "/nonexistent/pipeline.toml", "--batch-num", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("/nonexistent/pipeline.toml"));
}

#[test]
fn test_invalid_pipeline_exits_1() {
    let file = pipeline_file("submission_mode = \"sometimes\"\n");

    job()
        .arg("--pipeline-config")
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_missing_api_key_exits_1() {
    let file = pipeline_file(PIPELINE);

    job()
        .arg("--pipeline-config")
        .arg(file.path())
        .args(["--run-id", "2025-05-22", "--batch-num", "1"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("HUBSPOT_API_KEY"));
}

#[test]
fn test_unreachable_database_exits_1() {
    let file = pipeline_file(PIPELINE);

    job()
        .arg("--pipeline-config")
        .arg(file.path())
        .env("HUBSPOT_API_KEY", "test-token")
        .env("DATABASE_URL", "postgresql://stageport@127.0.0.1:1/stageport")
        .env("DATABASE_CONNECT_TIMEOUT", "1")
        .env("DATABASE_MIN_CONNECTIONS", "0")
        .args(["--run-id", "2025-05-22", "--batch-num", "1"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}
