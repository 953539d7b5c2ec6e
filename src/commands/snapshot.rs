use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

use framework_storage::storage::StorageBackend;
use framework_storage::FrameworkStorage;

#[derive(Serialize)]
struct Entry<'a> {
    path: &'a str,
    size: usize,
}

/// List the files of a snapshot, or write the content of one file
pub fn handle<S: StorageBackend, W: Write>(
    storage: &FrameworkStorage<S>,
    output: &mut W,
    hash: &str,
    file: Option<&str>,
    json: bool,
) -> Result<()> {
    let files = storage
        .get_snapshot_by_hash(hash)
        .with_context(|| format!("Failed to read snapshot {}", hash))?;

    if let Some(path) = file {
        let content = files
            .get(path)
            .with_context(|| format!("{} is not part of snapshot {}", path, hash))?;
        output.write_all(content)?;
        return Ok(());
    }

    let entries: Vec<Entry> = files
        .iter()
        .map(|(path, content)| Entry {
            path,
            size: content.len(),
        })
        .collect();

    if json {
        serde_json::to_writer_pretty(&mut *output, &entries)?;
        writeln!(output)?;
    } else {
        for entry in &entries {
            writeln!(output, "{:>8}  {}", entry.size, entry.path)?;
        }
    }
    Ok(())
}
