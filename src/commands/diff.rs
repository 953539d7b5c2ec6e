use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use framework_storage::storage::StorageBackend;
use framework_storage::{DirWorkspace, FrameworkStorage, TaskWorkspace};

/// Compare the snapshot of `commit_hash` with the files under `dir`
pub fn handle<S: StorageBackend, W: Write>(
    storage: &FrameworkStorage<S>,
    output: &mut W,
    commit_hash: &str,
    dir: &Path,
    json: bool,
) -> Result<()> {
    let live = DirWorkspace::new(dir)
        .read_files()
        .with_context(|| format!("Failed to read task files from {:?}", dir))?;
    let changes = storage
        .history()
        .diff_against_live(commit_hash, &live)
        .with_context(|| format!("Failed to diff against commit {}", commit_hash))?;

    if json {
        serde_json::to_writer_pretty(&mut *output, &changes)?;
        writeln!(output)?;
    } else {
        for change in &changes {
            writeln!(output, "{}", change)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{populated, text};
    use tempfile::TempDir;

    #[test]
    fn test_diff_against_directory() -> Result<()> {
        let (_dir, storage) = populated()?;
        let head = storage.resolve_ref("stage_1")?.expect("head");

        let task = TempDir::new()?;
        std::fs::write(task.path().join("fizz.kt"), "fun fizz() = 1000")?;
        std::fs::write(task.path().join("notes.md"), "todo")?;

        let mut output = Vec::new();
        handle(&storage, &mut output, &head, task.path(), false)?;
        assert_eq!(text(output), "A notes.md\nM fizz.kt (+1/-1)\n");
        Ok(())
    }

    #[test]
    fn test_json_uses_uppercase_change_types() -> Result<()> {
        let (_dir, storage) = populated()?;
        let head = storage.resolve_ref("stage_1")?.expect("head");
        let task = TempDir::new()?;

        let mut output = Vec::new();
        handle(&storage, &mut output, &head, task.path(), true)?;
        let value: serde_json::Value = serde_json::from_slice(&output)?;
        assert_eq!(value[0]["change_type"], "REMOVED");
        assert_eq!(value[0]["path"], "fizz.kt");
        Ok(())
    }
}
