//! Init, create, list, tree and delete through the binary

use crate::checkpoint;
use crate::common::TestProject;
use anyhow::Result;

#[test]
fn test_init_then_empty_list() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    let result = checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    assert!(result.contains_stdout("Initialized checkpoint store"));
    assert!(project.join(".checkpoint/config.toml").is_file());
    assert!(project.join(".checkpoint/crypt.key").is_file());

    let listed = checkpoint!(project.path(), "-a", "list", "-p", &path, "--json").assert_success()?;
    let value = listed.json()?;
    assert_eq!(value["checkpoints"], serde_json::json!([]));
    assert!(value["current"].is_null());
    Ok(())
}

#[test]
fn test_init_twice_fails() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    let result = checkpoint!(project.path(), "-a", "init", "-p", &path).assert_failure()?;
    assert_eq!(result.exit_code, 1);
    assert!(result.contains_stderr("already initialized"));
    Ok(())
}

#[test]
fn test_path_defaults_to_working_directory() -> Result<()> {
    let project = TestProject::sample()?;

    checkpoint!(project.path(), "-a", "init").assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "here").assert_success()?;

    let listed = checkpoint!(project.path(), "-a", "list", "--json").assert_success()?;
    assert_eq!(listed.json()?["checkpoints"], serde_json::json!(["here"]));
    Ok(())
}

#[test]
fn test_create_and_tree() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    let created =
        checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_success()?;
    assert!(created.contains_stdout("cp1"));
    assert!(created.contains_stdout("v1"));
    assert!(project.join(".checkpoint/cp1/v1/.metadata").is_file());

    let tree = checkpoint!(project.path(), "-a", "tree", "-n", "cp1", "-p", &path, "--json")
        .assert_success()?
        .json()?;
    assert_eq!(tree["."]["files"], serde_json::json!(["README.md", "a.txt"]));
    assert_eq!(tree["."]["folders"], serde_json::json!(["assets", "src"]));
    assert_eq!(tree["src/util"]["files"], serde_json::json!(["mod.rs"]));

    let keys: Vec<&String> = tree.as_object().unwrap().keys().collect();
    assert!(keys.iter().all(|k| !k.contains(".git") && !k.contains("node_modules")));
    Ok(())
}

#[test]
fn test_versions_accumulate() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    for expected in ["v1", "v2", "v3"] {
        let result =
            checkpoint!(project.path(), "-a", "create", "-n", "daily", "-p", &path).assert_success()?;
        assert!(result.contains_stdout(expected));
    }

    assert!(project.join(".checkpoint/daily/v3").is_dir());
    let listed = checkpoint!(project.path(), "-a", "list", "-p", &path, "--json").assert_success()?;
    assert_eq!(listed.json()?["checkpoints"], serde_json::json!(["daily"]));
    Ok(())
}

#[test]
fn test_delete_checkpoint() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp2", "-p", &path).assert_success()?;

    checkpoint!(project.path(), "-a", "delete", "-n", "cp1", "-p", &path).assert_success()?;
    assert!(!project.join(".checkpoint/cp1").exists());

    let listed = checkpoint!(project.path(), "-a", "list", "-p", &path, "--json").assert_success()?;
    assert_eq!(listed.json()?["checkpoints"], serde_json::json!(["cp2"]));

    checkpoint!(project.path(), "-a", "delete", "-n", "cp1", "-p", &path).assert_failure()?;
    Ok(())
}

#[test]
fn test_ignore_dirs_round_trip() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path, "-i", ".git node_modules assets")
        .assert_success()?;
    let dirs = checkpoint!(project.path(), "-a", "ignore-dirs", "-p", &path, "--json")
        .assert_success()?
        .json()?;
    assert_eq!(dirs, serde_json::json!([".git", "node_modules", "assets"]));

    checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_success()?;
    let tree = checkpoint!(project.path(), "-a", "tree", "-n", "cp1", "-p", &path, "--json")
        .assert_success()?
        .json()?;
    assert!(tree.get("assets").is_none());
    Ok(())
}

#[test]
fn test_version_action() -> Result<()> {
    let project = TestProject::new()?;
    let result = checkpoint!(project.path(), "-a", "version").assert_success()?;
    assert!(result.contains_stdout(env!("CARGO_PKG_VERSION")));
    Ok(())
}
