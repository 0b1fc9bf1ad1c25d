//! End-to-end command runs against a temporary redb database.

use std::path::Path;

use cinder_cli::{Cli, CliError, run};
use clap::Parser;
use serde_json::Value;
use tempfile::tempdir;

const KEK_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

fn cinder(db: &Path, args: &[&str]) -> Result<Value, CliError> {
    let db = db.to_str().unwrap();
    let mut argv = vec!["cinder", "--db", db, "--kek-id", "kek-cli", "--kek-hex", KEK_HEX];
    argv.extend_from_slice(args);
    run_argv(&argv)
}

fn run_argv(argv: &[&str]) -> Result<Value, CliError> {
    let cli = Cli::try_parse_from(argv).unwrap();
    let mut out = Vec::new();
    run(&cli, &mut out)?;

    let text = String::from_utf8(out).unwrap();
    assert!(text.ends_with('\n'));
    Ok(serde_json::from_str(text.trim_end()).unwrap())
}

#[test]
fn create_post_list_round_trip() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cinder.redb");

    let created = cinder(&db, &["create", "--as", "1", "--members", "2,3", "--title", "ops"]).unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["title"], "ops");
    assert_eq!(created["members"], serde_json::json!([1, 2, 3]));
    assert!(created["autodestruct_at"].is_null());

    let posted = cinder(&db, &["post", "--as", "2", "--conversation", &id, "--text", "hi"]).unwrap();
    assert_eq!(posted["sender"], 2);

    let listed = cinder(&db, &["list", "--as", "3", "--conversation", &id]).unwrap();
    let messages = listed["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "hi");
    assert_eq!(messages[0]["readable"], true);
    assert_eq!(messages[0]["id"], posted["id"]);

    let seen = cinder(&db, &["seen", "--as", "3", "--conversation", &id]).unwrap();
    assert_eq!(seen["marked"], 1);

    let conversations = cinder(&db, &["conversations", "--as", "3"]).unwrap();
    assert_eq!(conversations["conversations"][0]["id"].as_str(), Some(id.as_str()));
}

#[test]
fn arm_reports_deadline_and_rejects_other_delays() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cinder.redb");
    let created = cinder(&db, &["create", "--as", "1"]).unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let armed = cinder(&db, &["arm", "--as", "1", "--conversation", &id, "--minutes", "5"]).unwrap();
    assert!(armed["autodestruct_at"].is_string());

    let err = cinder(&db, &["arm", "--as", "1", "--conversation", &id, "--minutes", "2"]).unwrap_err();
    assert!(matches!(err, CliError::Gateway(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn non_member_is_refused() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cinder.redb");
    let created = cinder(&db, &["create", "--as", "1", "--members", "2"]).unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let err = cinder(&db, &["list", "--as", "9", "--conversation", &id]).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("not a member"));
}

#[test]
fn bad_key_is_reported_without_echo_and_before_storage() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("never-created.redb");
    let bad = "zz0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    let err = run_argv(&[
        "cinder",
        "--db",
        db.to_str().unwrap(),
        "--kek-id",
        "kek-cli",
        "--kek-hex",
        bad,
        "conversations",
        "--as",
        "1",
    ])
    .unwrap_err();

    assert!(matches!(err, CliError::Config(_)));
    assert_eq!(err.exit_code(), 2);
    assert!(!err.to_string().contains(bad));
    assert!(!err.to_string().contains("0102030405"));
    assert!(!db.exists());
}

#[test]
fn missing_key_is_a_configuration_error() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cinder.redb");

    let err = run_argv(&[
        "cinder",
        "--db",
        db.to_str().unwrap(),
        "--kek-id",
        "kek-cli",
        "conversations",
        "--as",
        "1",
    ]);

    // CINDER_KEK_HEX may be set by the caller's shell
    if std::env::var_os("CINDER_KEK_HEX").is_none() {
        assert!(matches!(err, Err(CliError::Config(_))));
    }
}

#[test]
fn keygen_output_is_a_usable_kek() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cinder.redb");

    let generated = run_argv(&["cinder", "keygen"]).unwrap();
    let kek_hex = generated["kek_hex"].as_str().unwrap().to_string();
    assert_eq!(kek_hex.len(), 64);
    assert!(kek_hex.bytes().all(|b| b.is_ascii_hexdigit()));

    let created = run_argv(&[
        "cinder",
        "--db",
        db.to_str().unwrap(),
        "--kek-id",
        "kek-new",
        "--kek-hex",
        &kek_hex,
        "create",
        "--as",
        "4",
    ])
    .unwrap();
    assert_eq!(created["members"], serde_json::json!([4]));
}

#[test]
fn retired_key_opens_messages_after_rotation() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cinder.redb");
    let created = cinder(&db, &["create", "--as", "1"]).unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    cinder(&db, &["post", "--as", "1", "--conversation", &id, "--text", "old key"]).unwrap();

    let next_hex = "ff".repeat(32);
    let retired = format!("kek-cli={KEK_HEX}");
    let listed = run_argv(&[
        "cinder",
        "--db",
        db.to_str().unwrap(),
        "--kek-id",
        "kek-next",
        "--kek-hex",
        &next_hex,
        "--retired-kek",
        &retired,
        "list",
        "--as",
        "1",
        "--conversation",
        &id,
    ])
    .unwrap();

    assert_eq!(listed["messages"][0]["text"], "old key");
}
