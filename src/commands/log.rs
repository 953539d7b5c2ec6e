use anyhow::Result;
use std::io::Write;

use framework_storage::storage::StorageBackend;
use framework_storage::{render, FrameworkStorage};

/// Print the history of `ref_name`, newest first
pub fn handle<S: StorageBackend, W: Write>(
    storage: &FrameworkStorage<S>,
    output: &mut W,
    ref_name: &str,
    json: bool,
) -> Result<()> {
    if !storage.has_ref(ref_name)? {
        anyhow::bail!("unknown ref: {}", ref_name);
    }
    let history = storage.history().history(ref_name)?;

    if json {
        serde_json::to_writer_pretty(&mut *output, &history)?;
        writeln!(output)?;
    } else {
        write!(output, "{}", render(&history))?;
    }
    Ok(())
}
