//! Shared rendering helpers for CLI output

use anyhow::{Context, Result};
use journal::{CheckpointMetadata, TreeNode};
use owo_colors::OwoColorize;
use std::collections::BTreeMap;

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// One-line summary of a checkpoint version
pub fn describe_version(verb: &str, metadata: &CheckpointMetadata) -> String {
    let total: u64 = metadata.files.iter().map(|f| f.size).sum();
    format!(
        "{} {} {} {} ({} files, {}) {}",
        "✓".green(),
        verb,
        metadata.name.cyan(),
        metadata.version_tag().yellow(),
        metadata.files.len(),
        format_size(total),
        metadata
            .created_at
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .dimmed()
    )
}

/// Checkpoint list, current one marked
pub fn render_list(checkpoints: &[String], current: Option<&str>, json: bool) -> Result<Vec<String>> {
    if json {
        let value = serde_json::json!({
            "checkpoints": checkpoints,
            "current": current,
        });
        return Ok(vec![serde_json::to_string(&value).context("Failed to encode checkpoint list")?]);
    }

    if checkpoints.is_empty() {
        return Ok(vec!["No checkpoints".dimmed().to_string()]);
    }
    Ok(checkpoints
        .iter()
        .map(|name| {
            if Some(name.as_str()) == current {
                format!("{} {}", "*".green(), name.green())
            } else {
                format!("  {}", name)
            }
        })
        .collect())
}

/// Current checkpoint or a placeholder
pub fn render_current(current: Option<&str>, json: bool) -> Result<Vec<String>> {
    if json {
        return Ok(vec![serde_json::to_string(&current).context("Failed to encode current checkpoint")?]);
    }
    Ok(vec![match current {
        Some(name) => name.to_string(),
        None => "(none)".dimmed().to_string(),
    }])
}

/// Captured tree, depth first from the root
pub fn render_tree(tree: &BTreeMap<String, TreeNode>, json: bool) -> Result<Vec<String>> {
    if json {
        return Ok(vec![serde_json::to_string(tree).context("Failed to encode tree")?]);
    }

    let mut lines = Vec::new();
    render_node(tree, ".", 0, &mut lines);
    Ok(lines)
}

fn render_node(tree: &BTreeMap<String, TreeNode>, key: &str, depth: usize, lines: &mut Vec<String>) {
    let Some(node) = tree.get(key) else {
        return;
    };
    let indent = "  ".repeat(depth);
    lines.push(format!("{}{}/", indent, node.name.blue().bold()));

    for folder in &node.folders {
        let child = if key == "." {
            folder.clone()
        } else {
            format!("{}/{}", key, folder)
        };
        render_node(tree, &child, depth + 1, lines);
    }
    for file in &node.files {
        lines.push(format!("{}  {}", indent, file));
    }
}

/// Ignore list, one entry per line
pub fn render_ignore_dirs(dirs: &[String], json: bool) -> Result<Vec<String>> {
    if json {
        return Ok(vec![serde_json::to_string(dirs).context("Failed to encode ignore list")?]);
    }
    Ok(dirs.to_vec())
}
