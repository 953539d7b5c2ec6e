use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::fileset::FileSet;

/// Kind of change for one path. Ordering is the grouping order of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl ChangeType {
    pub fn marker(self) -> char {
        match self {
            ChangeType::Added => 'A',
            ChangeType::Removed => 'D',
            ChangeType::Modified => 'M',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub change_type: ChangeType,
    /// Distinct lines only in the new version; `None` for binary files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_lines: Option<usize>,
}

impl FileChange {
    fn new(path: &str, change_type: ChangeType) -> Self {
        FileChange {
            path: path.to_string(),
            change_type,
            added_lines: None,
            removed_lines: None,
        }
    }
}

impl fmt::Display for FileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.change_type.marker(), self.path)?;
        if let (Some(added), Some(removed)) = (self.added_lines, self.removed_lines) {
            write!(f, " (+{}/-{})", added, removed)?;
        }
        Ok(())
    }
}

/// Compare two file sets.
///
/// Output is grouped added, removed, modified, each group sorted by path, so
/// the same inputs always give the same list.
pub fn diff(old: &FileSet, new: &FileSet) -> Vec<FileChange> {
    let mut changes = Vec::new();

    for path in new.paths().filter(|path| !old.contains(path)) {
        changes.push(FileChange::new(path, ChangeType::Added));
    }
    for path in old.paths().filter(|path| !new.contains(path)) {
        changes.push(FileChange::new(path, ChangeType::Removed));
    }
    for (path, old_content) in old.iter() {
        let Some(new_content) = new.get(path) else {
            continue;
        };
        if old_content == new_content {
            continue;
        }
        let mut change = FileChange::new(path, ChangeType::Modified);
        if let (Some(before), Some(after)) = (old.text(path), new.text(path)) {
            let (added, removed) = line_counts(before, after);
            change.added_lines = Some(added);
            change.removed_lines = Some(removed);
        }
        changes.push(change);
    }

    changes
}

/// Distinct lines gained and lost between two texts.
fn line_counts(before: &str, after: &str) -> (usize, usize) {
    let old_lines: HashSet<&str> = before.lines().collect();
    let new_lines: HashSet<&str> = after.lines().collect();
    (
        new_lines.difference(&old_lines).count(),
        old_lines.difference(&new_lines).count(),
    )
}
