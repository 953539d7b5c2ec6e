use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::diff::{diff, FileChange};
use crate::fileset::FileSet;

/// How much attention a file (or stage) needs before a stage switch.
///
/// Ordered so that aggregating is taking the maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncState {
    #[default]
    None,
    /// The next stage could take the learner's change
    Info,
    /// The next stage was edited too; a swap could lose work
    Warning,
}

impl SyncState {
    pub fn aggregate<I: IntoIterator<Item = SyncState>>(states: I) -> SyncState {
        states.into_iter().max().unwrap_or_default()
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::None => "none",
            SyncState::Info => "info",
            SyncState::Warning => "warning",
        };
        f.write_str(name)
    }
}

/// Per-file state tracked by the navigation controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    #[default]
    Clean,
    /// Edited since the last commit
    Dirty,
    SyncInfo,
    SyncWarning,
}

impl From<SyncState> for FileState {
    fn from(state: SyncState) -> Self {
        match state {
            SyncState::None => FileState::Clean,
            SyncState::Info => FileState::SyncInfo,
            SyncState::Warning => FileState::SyncWarning,
        }
    }
}

/// What is known about the two stages of a transition.
#[derive(Debug, Clone, Copy)]
pub struct SyncInput<'a> {
    /// Every file of the current stage's template
    pub current_template: &'a FileSet,
    /// Propagatable files currently in the task folder
    pub current_live: &'a FileSet,
    /// Propagatable files of the target template
    pub target_template: &'a FileSet,
    /// Non-propagatable files of the target template
    pub target_hidden: &'a FileSet,
    /// Propagatable files last recorded for the target, if it was visited
    pub target_recorded: Option<&'a FileSet>,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub state: SyncState,
    pub changes: Vec<FileChange>,
    pub per_file: BTreeMap<String, SyncState>,
    /// Live files the target stage can take over
    pub incoming: FileSet,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl SyncInput<'_> {
    /// Whether the target can take the learner's version of `path`: it is
    /// propagatable there, or the learner created it and the target does not
    /// hide a file under the same name.
    pub fn can_receive(&self, path: &str) -> bool {
        self.target_template.contains(path)
            || (!self.current_template.contains(path) && !self.target_hidden.contains(path))
    }

    /// Whether the target was edited after its template was laid down
    pub fn target_diverged(&self) -> bool {
        self.target_recorded
            .is_some_and(|recorded| recorded != self.target_template)
    }
}

/// Compare the learner's live files with what the target stage expects.
pub fn compute_sync(input: &SyncInput<'_>) -> SyncReport {
    let incoming = input.current_live.restrict(|path| input.can_receive(path));
    let shared_target = input
        .target_template
        .restrict(|path| input.current_template.contains(path));
    let changes = diff(&shared_target, &incoming);

    let diverged = input.target_diverged();
    let per_file: BTreeMap<String, SyncState> = changes
        .iter()
        .map(|change| {
            let recorded = input.target_recorded.and_then(|r| r.get(&change.path));
            let state = if diverged && recorded != incoming.get(&change.path) {
                SyncState::Warning
            } else {
                SyncState::Info
            };
            (change.path.clone(), state)
        })
        .collect();

    SyncReport {
        state: SyncState::aggregate(per_file.values().copied()),
        changes,
        per_file,
        incoming,
    }
}

/// The target's propagatable files after the learner chose to replace them.
///
/// Files the learner deleted from the current stage are dropped, every file
/// the target can receive takes the learner's content, and target-only files
/// are left alone.
pub fn replace_with_incoming(
    target: &FileSet,
    current_template: &FileSet,
    current_live: &FileSet,
    incoming: &FileSet,
) -> FileSet {
    let mut result =
        target.restrict(|path| !current_template.contains(path) || current_live.contains(path));
    result.overlay(incoming);
    result
}
