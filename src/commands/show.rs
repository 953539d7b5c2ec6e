use anyhow::{Context, Result};
use std::io::Write;

use framework_storage::storage::StorageBackend;
use framework_storage::FrameworkStorage;

use super::format_time;

/// Print one commit
pub fn handle<S: StorageBackend, W: Write>(
    storage: &FrameworkStorage<S>,
    output: &mut W,
    commit_hash: &str,
    json: bool,
) -> Result<()> {
    let commit = storage
        .get_commit(commit_hash)
        .with_context(|| format!("Failed to read commit {}", commit_hash))?;

    if json {
        serde_json::to_writer_pretty(&mut *output, &commit)?;
        writeln!(output)?;
        return Ok(());
    }

    writeln!(output, "commit {}", commit.hash)?;
    writeln!(output, "snapshot {}", commit.snapshot_hash)?;
    for parent in &commit.parent_hashes {
        writeln!(output, "parent {}", parent)?;
    }
    writeln!(output, "date {}", format_time(commit.timestamp_millis))?;
    writeln!(output)?;
    for line in commit.message.lines() {
        writeln!(output, "    {}", line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{populated, text};

    #[test]
    fn test_show_commit() -> Result<()> {
        let (_dir, storage) = populated()?;
        let head = storage.resolve_ref("stage_2")?.expect("head");
        let parent = storage.resolve_ref("stage_1")?.expect("head");

        let mut output = Vec::new();
        handle(&storage, &mut output, &head, false)?;
        let text = text(output);

        assert!(text.starts_with(&format!("commit {}\n", head)));
        assert!(text.contains(&format!("parent {}\n", parent)));
        assert!(text.ends_with("    Navigate to 'Buzz'\n"));
        Ok(())
    }

    #[test]
    fn test_show_missing_commit() -> Result<()> {
        let (_dir, storage) = populated()?;
        let mut output = Vec::new();
        assert!(handle(&storage, &mut output, "abcdef", true).is_err());
        Ok(())
    }
}
