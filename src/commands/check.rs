use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::io::Write;

use framework_storage::storage::{StorageBackend, STORAGE_VERSION};
use framework_storage::FrameworkStorage;

#[derive(Debug, Serialize)]
struct RefReport {
    ref_name: String,
    commits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Walk every ref's full history and load each snapshot it reaches.
///
/// Fails if any ref is broken, after reporting all of them.
pub fn handle<S: StorageBackend, W: Write>(
    storage: &FrameworkStorage<S>,
    output: &mut W,
    json: bool,
) -> Result<()> {
    let version = storage.version()?;
    if version != STORAGE_VERSION {
        tracing::warn!("storage version {} differs from {}", version, STORAGE_VERSION);
    }

    let mut reports = Vec::new();
    let mut verified_snapshots = HashSet::new();
    for (ref_name, _) in storage.refs().all_refs()? {
        let report = match check_ref(storage, &ref_name, &mut verified_snapshots) {
            Ok(commits) => RefReport {
                ref_name,
                commits,
                error: None,
            },
            Err(e) => RefReport {
                ref_name,
                commits: 0,
                error: Some(e.to_string()),
            },
        };
        reports.push(report);
    }

    if json {
        serde_json::to_writer_pretty(&mut *output, &reports)?;
        writeln!(output)?;
    } else {
        for report in &reports {
            match &report.error {
                None => writeln!(output, "ok      {} ({} commits)", report.ref_name, report.commits)?,
                Some(error) => writeln!(output, "broken  {}: {}", report.ref_name, error)?,
            }
        }
    }

    let broken = reports.iter().filter(|r| r.error.is_some()).count();
    if broken > 0 {
        anyhow::bail!("{} of {} refs are broken", broken, reports.len());
    }
    Ok(())
}

fn check_ref<S: StorageBackend>(
    storage: &FrameworkStorage<S>,
    ref_name: &str,
    verified_snapshots: &mut HashSet<String>,
) -> framework_storage::Result<usize> {
    let Some(head) = storage.resolve_ref(ref_name)? else {
        return Ok(0);
    };
    let commits = storage.commits().ancestors(&head, usize::MAX)?;
    for commit in &commits {
        for parent in &commit.parent_hashes {
            storage.get_commit(parent)?;
        }
        if verified_snapshots.insert(commit.snapshot_hash.clone()) {
            storage.get_snapshot_by_hash(&commit.snapshot_hash)?;
        }
    }
    Ok(commits.len())
}
