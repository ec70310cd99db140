//! Restore round trips through the binary

use crate::checkpoint;
use crate::common::TestProject;
use anyhow::Result;

#[test]
fn test_restore_after_modification() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_success()?;

    project.write("a.txt", "goodbye")?;
    let result =
        checkpoint!(project.path(), "-a", "restore", "-n", "cp1", "-p", &path).assert_success()?;
    assert!(result.contains_stdout("Restored"));
    assert_eq!(project.read("a.txt")?, "hello");

    let current = checkpoint!(project.path(), "-a", "current", "-p", &path, "--json")
        .assert_success()?
        .json()?;
    assert_eq!(current, "cp1");
    Ok(())
}

#[test]
fn test_restore_is_byte_exact() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();
    let binary: Vec<u8> = (0..=255u8).rev().cycle().take(10_000).collect();
    project.write_bytes("data/blob.bin", &binary)?;
    project.write_bytes("data/legacy.txt", &[0x6e, 0x61, 0xef, 0x76, 0x65])?;

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "snap", "-p", &path).assert_success()?;

    let originals: Vec<(String, Vec<u8>)> = [
        "a.txt",
        "README.md",
        "src/main.rs",
        "src/util/mod.rs",
        "assets/logo.png",
        "data/blob.bin",
        "data/legacy.txt",
    ]
    .iter()
    .map(|rel| -> Result<(String, Vec<u8>)> { Ok((rel.to_string(), project.read_bytes(rel)?)) })
    .collect::<Result<_>>()?;

    for (rel, _) in &originals {
        project.write(rel, "overwritten")?;
    }
    checkpoint!(project.path(), "-a", "restore", "-n", "snap", "-p", &path).assert_success()?;

    for (rel, content) in &originals {
        assert_eq!(&project.read_bytes(rel)?, content, "{} differs after restore", rel);
    }
    Ok(())
}

#[test]
fn test_restore_older_version() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp", "-p", &path).assert_success()?;
    project.write("a.txt", "second")?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp", "-p", &path).assert_success()?;
    project.write("a.txt", "third")?;

    checkpoint!(project.path(), "-a", "restore", "-n", "cp", "-p", &path, "--version-tag", "v1")
        .assert_success()?;
    assert_eq!(project.read("a.txt")?, "hello");

    checkpoint!(project.path(), "-a", "restore", "-n", "cp", "-p", &path).assert_success()?;
    assert_eq!(project.read("a.txt")?, "second");

    checkpoint!(project.path(), "-a", "restore", "-n", "cp", "-p", &path, "--version-tag", "7")
        .assert_failure()?;
    Ok(())
}

#[test]
fn test_restore_recreates_deleted_files() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_success()?;
    std::fs::remove_dir_all(project.join("src"))?;

    checkpoint!(project.path(), "-a", "restore", "-n", "cp1", "-p", &path).assert_success()?;
    assert!(project.read("src/util/mod.rs")?.contains("pub fn add"));
    Ok(())
}

#[test]
fn test_delete_current_clears_pointer() -> Result<()> {
    let project = TestProject::sample()?;
    let path = project.arg();

    checkpoint!(project.path(), "-a", "init", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp1", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "create", "-n", "cp2", "-p", &path).assert_success()?;
    checkpoint!(project.path(), "-a", "restore", "-n", "cp1", "-p", &path).assert_success()?;

    checkpoint!(project.path(), "-a", "delete", "-n", "cp2", "-p", &path).assert_success()?;
    let current = checkpoint!(project.path(), "-a", "current", "-p", &path, "--json")
        .assert_success()?
        .json()?;
    assert_eq!(current, "cp1");

    checkpoint!(project.path(), "-a", "delete", "-n", "cp1", "-p", &path).assert_success()?;
    let current = checkpoint!(project.path(), "-a", "current", "-p", &path, "--json")
        .assert_success()?
        .json()?;
    assert!(current.is_null());
    Ok(())
}
