mod test_support;

use std::path::Path;
use std::process::{Command, Output};
use test_support::temp_dir;

fn run(workspace: &Path, args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_classboard-migrate");
    Command::new(exe)
        .arg("--workspace")
        .arg(workspace)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn classboard-migrate")
}

#[test]
fn migrate_check_and_rollback_through_the_cli() {
    let workspace = temp_dir("classboard-cli");

    let out = run(&workspace, &["migrate"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let result: serde_json::Value = serde_json::from_slice(&out.stdout).expect("result json");
    assert_eq!(result["success"], serde_json::json!(true));
    assert_eq!(result["summary"]["students"], serde_json::json!(4));
    assert_eq!(result["summary"]["enrollments"], serde_json::json!(5));
    let backup_id = result["backupId"].as_str().expect("backupId").to_string();

    assert!(workspace.join("classboard.sqlite3").is_file());
    assert!(workspace.join("logs").join("migration.log").is_file());

    let out = run(&workspace, &["check"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = run(&workspace, &["backups"]);
    assert!(String::from_utf8_lossy(&out.stdout).contains(&backup_id));

    // The demo data is already present, so a second run is rejected.
    let out = run(&workspace, &["migrate"]);
    assert!(!out.status.success());

    let out = run(&workspace, &["rollback", &backup_id]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let out = run(&workspace, &["check"]);
    assert!(!out.status.success(), "store is empty after rollback");

    let out = run(&workspace, &["rollback", "backup-does-not-exist"]);
    assert!(!out.status.success());

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn validate_mode_never_touches_the_database() {
    let workspace = temp_dir("classboard-cli-validate");
    let input = workspace.join("broken.json");
    std::fs::write(
        &input,
        r#"{"students":[{"id":"1","name":"A","email":"bad"}],
            "classes":[{"id":"c1","name":"C","subject":"S","capacity":0,"enrolledStudents":["1"]}]}"#,
    )
    .expect("write input");

    let out = run(&workspace, &["validate", "--input", input.to_str().expect("utf8 path")]);
    assert!(!out.status.success());
    let errors: serde_json::Value = serde_json::from_slice(&out.stdout).expect("errors json");
    assert_eq!(errors.as_array().map(|a| a.len()), Some(2));
    assert!(!workspace.join("classboard.sqlite3").exists());

    let out = run(&workspace, &["demo"]);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("demo fixture: 0 validation error(s)"));
    assert!(text.contains("broken fixture: 3 validation error(s)"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn validate_mode_checks_against_the_populated_workspace() {
    let workspace = temp_dir("classboard-cli-validate-db");
    let seed = workspace.join("seed.json");
    std::fs::write(
        &seed,
        r#"{"students":[{"id":"1","name":"A","email":"a@school.org"}]}"#,
    )
    .expect("write seed");
    let followup = workspace.join("followup.json");
    std::fs::write(
        &followup,
        r#"{"classes":[{"id":"c1","name":"C","subject":"S","capacity":5,"enrolledStudents":["1"]}]}"#,
    )
    .expect("write followup");

    let out = run(&workspace, &["migrate", "--input", seed.to_str().expect("utf8 path")]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let db_path = workspace.join("classboard.sqlite3");
    let before = std::fs::read(&db_path).expect("read db");

    // Student "1" lives only in storage; the enrollment must resolve against it.
    let out = run(&workspace, &["validate", "--input", followup.to_str().expect("utf8 path")]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stdout));

    let out = run(&workspace, &["validate", "--input", seed.to_str().expect("utf8 path")]);
    assert!(!out.status.success());
    let errors: serde_json::Value = serde_json::from_slice(&out.stdout).expect("errors json");
    let errors = errors.as_array().expect("error list");
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["message"]
        .as_str()
        .unwrap_or_default()
        .contains("already exists"));

    assert_eq!(std::fs::read(&db_path).expect("read db"), before);

    let _ = std::fs::remove_dir_all(workspace);
}
