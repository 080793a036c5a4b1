//! Persistent CLI job-file store.
//!
//! An in-progress queue definition is a JSON list of rows on disk. Each row
//! is either a `header` (a raw shell line sourced before any job runs) or a
//! `command` (a prospective [`crate::domain::entities::Job`]), with an
//! optional `name` and `depends` list on the command variant. This is
//! intentionally the *entire* persistence model — a richer, fully
//! featured CLI job store (sqlite state, rich TUI widgets) is out of
//! scope here and left as an external collaborator.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Row {
    Header {
        header: String,
    },
    Command {
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        depends: Option<Vec<String>>,
    },
}

/// Resolves the on-disk path for a named queue's row store under
/// `store_dir`.
pub fn rows_path(store_dir: &Path, name: &str) -> PathBuf {
    store_dir.join(format!("{name}.json"))
}

/// Creates an empty row list for `name`, failing if one already exists.
pub fn create(store_dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(store_dir)
        .with_context(|| format!("failed to create store directory {}", store_dir.display()))?;
    let path = rows_path(store_dir, name);
    if path.exists() {
        anyhow::bail!("a queue named {name:?} already exists at {}", path.display());
    }
    write_rows(&path, &[])?;
    Ok(path)
}

pub fn load(path: &Path) -> Result<Vec<Row>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read row store {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse row store {}", path.display()))
}

pub fn write_rows(path: &Path, rows: &[Row]) -> Result<()> {
    let text = serde_json::to_string_pretty(rows)?;
    fs::write(path, text).with_context(|| format!("failed to write row store {}", path.display()))
}

pub fn append(path: &Path, row: Row) -> Result<()> {
    let mut rows = load(path)?;
    rows.push(row);
    write_rows(path, &rows)
}

/// Lists every queue name with a row store under `store_dir`.
pub fn list_queues(store_dir: &Path) -> Result<Vec<String>> {
    if !store_dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(store_dir)
        .with_context(|| format!("failed to read store directory {}", store_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("jobweaver-rowstore-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn create_then_load_round_trips_empty_store() {
        let dir = tmp_dir();
        let path = create(&dir, "pipeline").unwrap();
        assert_eq!(load(&path).unwrap(), Vec::new());
    }

    #[test]
    fn create_rejects_duplicate_name() {
        let dir = tmp_dir();
        create(&dir, "pipeline").unwrap();
        let err = create(&dir, "pipeline").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn append_persists_command_rows_with_name_and_depends() {
        let dir = tmp_dir();
        let path = create(&dir, "pipeline").unwrap();
        append(
            &path,
            Row::Command {
                command: "echo a".to_string(),
                name: Some("a".to_string()),
                depends: None,
            },
        )
        .unwrap();
        append(
            &path,
            Row::Command {
                command: "echo b".to_string(),
                name: Some("b".to_string()),
                depends: Some(vec!["a".to_string()]),
            },
        )
        .unwrap();
        let rows = load(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1],
            Row::Command { command: "echo b".to_string(), name: Some("b".to_string()), depends: Some(vec!["a".to_string()]) }
        );
    }

    #[test]
    fn list_queues_finds_every_json_store() {
        let dir = tmp_dir();
        create(&dir, "a").unwrap();
        create(&dir, "b").unwrap();
        let mut names = list_queues(&dir).unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
