//! Failure modes and unusual inputs

use crate::checkpoint;
use crate::common::TestProject;
use anyhow::Result;

#[test]
fn test_create_before_init_fails() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    let result =
        checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_failure()?;
    assert!(result.contains_stderr("not initialized"));
    assert!(!project.join(".checkpoint").exists());
    Ok(())
}

#[test]
fn test_missing_name() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    let result = checkpoint!(project.path(), "-a", "create", "-p", &path).assert_failure()?;
    assert!(result.contains_stderr("requires a checkpoint name"));
    Ok(())
}

#[test]
fn test_reserved_names_rejected() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    for name in ["tmp", "config.toml", ".hidden", "a/b"] {
        checkpoint!(project.path(), "-a", "create", "-n", name, "-p", &path).assert_failure()?;
    }
    let listed = checkpoint!(project.path(), "-a", "list", "-p", &path, "--json").assert_success()?;
    assert_eq!(listed.json()?["checkpoints"], serde_json::json!([]));
    Ok(())
}

#[test]
fn test_restore_unknown_checkpoint() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    let result =
        checkpoint!(project.path(), "-a", "restore", "-n", "ghost", "-p", &path).assert_failure()?;
    assert!(result.contains_stderr("checkpoint not found"));
    Ok(())
}

#[test]
fn test_restore_with_replaced_key_changes_nothing() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_success()?;
    project.write("a.txt", "goodbye")?;
    project.write(".checkpoint/crypt.key", &"11".repeat(32))?;

    let result =
        checkpoint!(project.path(), "-a", "restore", "-n", "cp1", "-p", &path).assert_failure()?;
    assert!(result.contains_stderr("key does not match"));
    assert_eq!(project.read("a.txt")?, "goodbye");
    Ok(())
}

#[test]
fn test_strict_readers_reject_unknown_extension() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();
    project.write_bytes("model.weights", &[1, 2, 3, 4])?;

    checkpoint!(project.path(), "-a", "init", "-p", &path, "--strict-readers").assert_success()?;
    let result =
        checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_failure()?;
    assert!(result.contains_stderr("unsupported file extension"));
    assert!(!project.join(".checkpoint/cp1").exists());
    Ok(())
}

#[test]
fn test_permissive_readers_capture_unknown_extension() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();
    project.write_bytes("model.weights", &[1, 2, 3, 4])?;

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_success()?;
    project.write_bytes("model.weights", &[9])?;
    checkpoint!(project.path(), "-a", "restore", "-n", "cp1", "-p", &path).assert_success()?;
    assert_eq!(project.read_bytes("model.weights")?, vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn test_validate_path() -> Result<()> {
    let project = TestProject::new()?;
    let missing = project.join("missing").display().to_string();

    checkpoint!(project.path(), "-a", "validate", "-p", &project.arg()).assert_success()?;
    checkpoint!(project.path(), "-a", "validate", "-p", &missing).assert_failure()?;
    Ok(())
}

#[test]
fn test_logs_are_drained() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_success()?;

    let logs = checkpoint!(project.path(), "-a", "logs", "-p", &path).assert_success()?;
    assert!(logs.contains_stdout("Created checkpoint"));

    let again = checkpoint!(project.path(), "-a", "logs", "-p", &path).assert_success()?;
    assert!(!again.contains_stdout("Created checkpoint"));
    Ok(())
}

#[test]
fn test_init_records_reach_the_log() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path)
        .env("RUST_LOG", "info")
        .assert_success()?;

    let logs = checkpoint!(project.path(), "-a", "logs", "-p", &path)
        .env("RUST_LOG", "info")
        .assert_success()?;
    assert!(logs.contains_stdout("Initialized project"));
    Ok(())
}

#[test]
fn test_unknown_action() -> Result<()> {
    let project = TestProject::new()?;
    let result = checkpoint!(project.path(), "-a", "explode").assert_failure()?;
    assert_eq!(result.exit_code, 2);
    Ok(())
}
