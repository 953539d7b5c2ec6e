use anyhow::Result;
use std::io::Write;

use framework_storage::storage::StorageBackend;
use framework_storage::FrameworkStorage;

/// List every ref with its head commit, marking the current stage with `*`
pub fn handle<S: StorageBackend, W: Write>(
    storage: &FrameworkStorage<S>,
    output: &mut W,
    json: bool,
) -> Result<()> {
    let refs = storage.all_refs()?;

    if json {
        serde_json::to_writer_pretty(&mut *output, &refs)?;
        writeln!(output)?;
        return Ok(());
    }

    for info in &refs {
        let marker = if info.is_current { '*' } else { ' ' };
        writeln!(
            output,
            "{} {} {} {}",
            marker,
            info.ref_name,
            &info.commit.hash[..7.min(info.commit.hash.len())],
            info.commit.message
        )?;
    }

    Ok(())
}
