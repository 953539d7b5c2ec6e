use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;
use crate::diff::FileChange;
use crate::error::{Error, Result};
use crate::fileset::FileSet;
use crate::history::CommitSummary;
use crate::lesson::{FrameworkLesson, Stage};
use crate::repository::FrameworkStorage;
use crate::storage::{FilesystemStorage, ObjectId, StorageBackend};
use crate::sync::{compute_sync, replace_with_incoming, FileState, SyncInput, SyncReport, SyncState};
use crate::workspace::TaskWorkspace;

/// Key under which failures to move the current-stage pointer are tracked
const HEAD: &str = "HEAD";

/// The learner's answer to a propagation conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Leave the target stage's files as they were
    Keep,
    /// Overwrite the target's propagatable files with the current versions
    Replace,
}

/// Everything the Keep/Replace dialog shows.
#[derive(Debug)]
pub struct ConflictRequest<'a> {
    pub current_stage: &'a str,
    pub target_stage: &'a str,
    pub state: SyncState,
    pub changes: &'a [FileChange],
    pub current_files: &'a FileSet,
    pub target_files: &'a FileSet,
}

/// Asks the learner how to resolve a conflict. `None` means the dialog was
/// dismissed.
pub trait ConflictResolver {
    fn resolve(&mut self, request: &ConflictRequest<'_>) -> Option<Resolution>;
}

impl<F> ConflictResolver for F
where
    F: FnMut(&ConflictRequest<'_>) -> Option<Resolution>,
{
    fn resolve(&mut self, request: &ConflictRequest<'_>) -> Option<Resolution> {
        self(request)
    }
}

/// The editor changed a task file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditEvent {
    pub path: String,
}

impl EditEvent {
    pub fn new(path: impl Into<String>) -> Self {
        EditEvent { path: path.into() }
    }
}

/// Result of moving one stage.
#[derive(Debug, Clone)]
pub struct NavigationOutcome {
    pub from: usize,
    pub to: usize,
    pub sync_state: SyncState,
    pub changes: Vec<FileChange>,
    /// Set when the step had to resolve a conflict
    pub resolution: Option<Resolution>,
    /// Commits written during the step, oldest first
    pub commits: Vec<ObjectId>,
}

/// Moves a learner between the stages of one lesson.
///
/// History is best effort: without a store, or for a ref whose history turned
/// out to be corrupt, stages are still swapped but nothing is recorded.
pub struct NavigationController<W, R, S = FilesystemStorage> {
    lesson: FrameworkLesson,
    workspace: W,
    resolver: R,
    storage: Option<FrameworkStorage<S>>,
    broken_refs: BTreeSet<String>,
    file_states: BTreeMap<String, FileState>,
    edits_tx: UnboundedSender<EditEvent>,
    edits_rx: UnboundedReceiver<EditEvent>,
    show_conflict_dialog: bool,
    /// Set after a Keep until the current jump ends
    auto_keep: bool,
}

impl<W, R> NavigationController<W, R, FilesystemStorage>
where
    W: TaskWorkspace,
    R: ConflictResolver,
{
    /// Open the store at `storage_path`; if that fails, run without history.
    pub fn open(
        lesson: FrameworkLesson,
        workspace: W,
        resolver: R,
        storage_path: &Path,
        config: &StorageConfig,
    ) -> Self {
        let storage = match FrameworkStorage::open_with_config(storage_path, config) {
            Ok(storage) => Some(storage),
            Err(e) => {
                warn!(
                    path = %storage_path.display(),
                    "Framework storage unavailable, navigating without history: {}",
                    e
                );
                None
            }
        };
        Self::new(lesson, workspace, resolver, storage)
            .with_conflict_dialog(config.show_conflict_dialog)
    }
}

impl<W, R, S> NavigationController<W, R, S>
where
    W: TaskWorkspace,
    R: ConflictResolver,
    S: StorageBackend,
{
    pub fn new(
        lesson: FrameworkLesson,
        workspace: W,
        resolver: R,
        storage: Option<FrameworkStorage<S>>,
    ) -> Self {
        let (edits_tx, edits_rx) = unbounded_channel();
        NavigationController {
            lesson,
            workspace,
            resolver,
            storage,
            broken_refs: BTreeSet::new(),
            file_states: BTreeMap::new(),
            edits_tx,
            edits_rx,
            show_conflict_dialog: true,
            auto_keep: false,
        }
    }

    /// When disabled, conflicts resolve to Keep without asking.
    pub fn with_conflict_dialog(mut self, show: bool) -> Self {
        self.show_conflict_dialog = show;
        self
    }

    pub fn lesson(&self) -> &FrameworkLesson {
        &self.lesson
    }

    pub fn current_index(&self) -> usize {
        self.lesson.current_index
    }

    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut W {
        &mut self.workspace
    }

    pub fn storage(&self) -> Option<&FrameworkStorage<S>> {
        self.storage.as_ref()
    }

    /// Whether commits are being recorded for `ref_name`
    pub fn has_history(&self, ref_name: &str) -> bool {
        self.storage.is_some() && !self.broken_refs.contains(ref_name)
    }

    /// Sender for editor change notifications.
    pub fn edit_sender(&self) -> UnboundedSender<EditEvent> {
        self.edits_tx.clone()
    }

    /// Drain pending edit notifications, marking propagatable files dirty.
    pub fn process_edits(&mut self) -> usize {
        let mut marked = 0;
        while let Ok(event) = self.edits_rx.try_recv() {
            if self
                .lesson
                .should_be_propagated(self.lesson.current_index, &event.path)
            {
                debug!(path = %event.path, "task file dirty");
                self.file_states.insert(event.path, FileState::Dirty);
                marked += 1;
            }
        }
        marked
    }

    pub fn file_state(&self, path: &str) -> FileState {
        self.file_states.get(path).copied().unwrap_or_default()
    }

    pub fn next(&mut self) -> Result<Option<NavigationOutcome>> {
        let target = self.lesson.current_index + 1;
        if target >= self.lesson.stages.len() {
            return Ok(None);
        }
        Ok(self.navigate_to(target)?.pop())
    }

    pub fn previous(&mut self) -> Result<Option<NavigationOutcome>> {
        let Some(target) = self.lesson.current_index.checked_sub(1) else {
            return Ok(None);
        };
        Ok(self.navigate_to(target)?.pop())
    }

    /// Move to stage `index` one step at a time.
    ///
    /// Once the learner keeps a target's changes, the remaining steps of the
    /// same jump keep theirs too without asking again.
    pub fn navigate_to(&mut self, index: usize) -> Result<Vec<NavigationOutcome>> {
        if index >= self.lesson.stages.len() {
            return Err(Error::NoSuchStage(index));
        }

        self.auto_keep = false;
        let mut outcomes = Vec::new();
        while self.lesson.current_index != index {
            let next = if index > self.lesson.current_index {
                self.lesson.current_index + 1
            } else {
                self.lesson.current_index - 1
            };
            match self.step(next) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    self.auto_keep = false;
                    return Err(e);
                }
            }
        }
        self.auto_keep = false;
        Ok(outcomes)
    }

    fn step(&mut self, to: usize) -> Result<NavigationOutcome> {
        let from = self.lesson.current_index;
        let current = self.stage(from)?.clone();
        let target = self.stage(to)?.clone();
        let current_ref = current.storage_ref();
        let target_ref = target.storage_ref();
        let forward = to > from;

        self.process_edits();
        let (live, _) = self.lesson.split(from, &self.workspace.read_files()?);

        let mut commits = Vec::new();
        let message = format!(
            "Save changes before navigating from '{}' to '{}'",
            current.name, target.name
        );
        let parent_ref = self.usable_ref(self.lesson.previous_ref(from));
        if let Some(Some(commit)) = self.with_storage(&current_ref, |storage| {
            storage.save_snapshot(&current_ref, &live, parent_ref.as_deref(), &message)
        }) {
            commits.push(commit);
        }

        let (target_template, target_hidden) = self.lesson.split(to, &target.template());
        let recorded = self.recorded_files(&target_ref);
        let report = self.sync_report(&current, &live, &target_template, &target_hidden, recorded.as_ref());

        // From here on the current ref only serves as a parent
        let source_ref = self.usable_ref(Some(current_ref.clone()));
        let already_propagated = match &source_ref {
            Some(source_ref) => self
                .with_storage(&target_ref, |storage| storage.is_ancestor(source_ref, &target_ref))
                .unwrap_or(false),
            None => false,
        };
        let needs_resolution = forward
            && self.lesson.propagate_files_on_navigation
            && report.state != SyncState::None
            && !already_propagated;

        let target_files = recorded.unwrap_or(target_template);
        let resolution = needs_resolution.then(|| {
            self.ask(&ConflictRequest {
                current_stage: &current.name,
                target_stage: &target.name,
                state: report.state,
                changes: &report.changes,
                current_files: &live,
                target_files: &target_files,
            })
        });

        let resolved = match resolution {
            Some(Resolution::Replace) => {
                replace_with_incoming(&target_files, &current.template(), &live, &report.incoming)
            }
            _ => target_files,
        };

        let mut on_disk = resolved.clone();
        on_disk.overlay(&target_hidden);
        self.workspace.replace_files(&on_disk)?;

        let commit = match resolution {
            Some(resolution) => {
                let message = match resolution {
                    Resolution::Replace => {
                        format!("Merge from '{}': Replace with propagated changes", current.name)
                    }
                    Resolution::Keep => format!("Merge from '{}': Keep target changes", current.name),
                };
                // Either answer makes the source head an ancestor of the target head
                let mut parents = vec![target_ref.as_str()];
                parents.extend(source_ref.as_deref());
                self.with_storage(&target_ref, |storage| {
                    storage
                        .save_merge_snapshot(&target_ref, &resolved, &parents, &message)
                        .map(Some)
                })
            }
            None => {
                let message = format!("Navigate to '{}'", target.name);
                self.with_storage(&target_ref, |storage| {
                    storage.save_snapshot(&target_ref, &resolved, source_ref.as_deref(), &message)
                })
            }
        };
        commits.extend(commit.flatten());

        self.with_storage(HEAD, |storage| storage.set_current_stage(Some(&target_ref)));
        if resolution == Some(Resolution::Keep) {
            self.auto_keep = true;
        }

        self.lesson.current_index = to;
        self.file_states.clear();
        info!(
            from = %current.name,
            to = %target.name,
            sync = %report.state,
            commits = commits.len(),
            "navigated"
        );

        Ok(NavigationOutcome {
            from,
            to,
            sync_state: report.state,
            changes: report.changes,
            resolution,
            commits,
        })
    }

    fn ask(&mut self, request: &ConflictRequest<'_>) -> Resolution {
        if self.auto_keep {
            info!(stage = %request.target_stage, "keeping target changes for the rest of the jump");
            return Resolution::Keep;
        }
        if !self.show_conflict_dialog {
            info!(stage = %request.target_stage, "conflict dialog disabled, keeping target changes");
            return Resolution::Keep;
        }
        match self.resolver.resolve(request) {
            Some(resolution) => resolution,
            None => {
                info!(stage = %request.target_stage, "conflict dialog dismissed, keeping target changes");
                Resolution::Keep
            }
        }
    }

    /// Commit the current stage's files if they changed since its last commit.
    pub fn save_current(&mut self) -> Result<Option<ObjectId>> {
        let index = self.lesson.current_index;
        let stage = self.stage(index)?.clone();
        self.process_edits();
        let (live, _) = self.lesson.split(index, &self.workspace.read_files()?);

        let ref_name = stage.storage_ref();
        let parent_ref = self.usable_ref(self.lesson.previous_ref(index));
        let message = format!("Auto-save changes for '{}'", stage.name);
        let commit = self
            .with_storage(&ref_name, |storage| {
                storage.save_snapshot(&ref_name, &live, parent_ref.as_deref(), &message)
            })
            .flatten();

        if commit.is_some() {
            self.file_states.clear();
        }
        Ok(commit)
    }

    /// Record files obtained elsewhere (a server submission, say) as the
    /// state of stage `index`. Only propagatable files are kept; the task
    /// folder is not touched.
    pub fn save_external_state(&mut self, index: usize, files: &FileSet) -> Result<Option<ObjectId>> {
        let stage = self.stage(index)?.clone();
        let (propagatable, _) = self.lesson.split(index, files);
        let ref_name = stage.storage_ref();
        let parent_ref = self.usable_ref(self.lesson.previous_ref(index));
        let message = format!("Load submission for '{}'", stage.name);
        Ok(self
            .with_storage(&ref_name, |storage| {
                storage.save_snapshot(&ref_name, &propagatable, parent_ref.as_deref(), &message)
            })
            .flatten())
    }

    /// Full file set of stage `index`: the task folder for the current
    /// stage, otherwise its recorded files (or template) plus its hidden
    /// template files.
    pub fn stage_state(&mut self, index: usize) -> Result<FileSet> {
        if index == self.lesson.current_index {
            return self.workspace.read_files();
        }
        let stage = self.stage(index)?.clone();
        let (template, hidden) = self.lesson.split(index, &stage.template());
        let mut files = self
            .recorded_files(&stage.storage_ref())
            .unwrap_or(template);
        files.overlay(&hidden);
        Ok(files)
    }

    /// When stage `index` was last committed
    pub fn changes_timestamp(&mut self, index: usize) -> Result<Option<i64>> {
        let ref_name = self.stage(index)?.storage_ref();
        Ok(self
            .with_storage(&ref_name, |storage| storage.snapshot_timestamp(&ref_name))
            .flatten())
    }

    /// Re-evaluate dirty files against the next stage.
    ///
    /// Returns the aggregate state of the dirty files.
    pub fn refresh_sync_states(&mut self) -> Result<SyncState> {
        self.process_edits();
        let index = self.lesson.current_index;
        let Some(target) = self.lesson.stage(index + 1).cloned() else {
            return Ok(SyncState::None);
        };
        if !self.lesson.propagate_files_on_navigation {
            return Ok(SyncState::None);
        }
        let current = self.stage(index)?.clone();
        let (live, _) = self.lesson.split(index, &self.workspace.read_files()?);
        let (target_template, target_hidden) = self.lesson.split(index + 1, &target.template());
        let recorded = self.recorded_files(&target.storage_ref());
        let report = self.sync_report(&current, &live, &target_template, &target_hidden, recorded.as_ref());

        let mut states = Vec::new();
        for (path, state) in self.file_states.iter_mut() {
            if *state == FileState::Clean {
                continue;
            }
            let sync = report.per_file.get(path).copied().unwrap_or_default();
            *state = match sync {
                SyncState::None => FileState::Dirty,
                other => FileState::from(other),
            };
            states.push(sync);
        }
        Ok(SyncState::aggregate(states))
    }

    /// Point `current_index` at the stage recorded as current in the store.
    ///
    /// Returns true if the index changed.
    pub fn sync_current_index_from_storage(&mut self) -> bool {
        let Some(storage) = &self.storage else {
            return false;
        };
        let head = match storage.current_stage() {
            Ok(head) => head,
            Err(e) => {
                warn!("cannot read current stage: {}", e);
                return false;
            }
        };
        match head.and_then(|ref_name| self.lesson.index_of_ref(&ref_name)) {
            Some(index) if index != self.lesson.current_index => {
                info!(
                    from = self.lesson.current_index,
                    to = index,
                    "restored current stage from storage"
                );
                self.lesson.current_index = index;
                self.file_states.clear();
                true
            }
            _ => false,
        }
    }

    /// History of the current stage, newest first
    pub fn history(&self) -> Vec<CommitSummary> {
        let Some(stage) = self.lesson.current_stage() else {
            return Vec::new();
        };
        let ref_name = stage.storage_ref();
        match &self.storage {
            Some(storage) if !self.broken_refs.contains(&ref_name) => {
                storage.history().history_or_empty(&ref_name)
            }
            _ => Vec::new(),
        }
    }

    /// What changed in the task folder since `commit_hash`.
    pub fn diff_against_commit(&self, commit_hash: &str) -> Result<Vec<FileChange>> {
        let Some(storage) = &self.storage else {
            return Ok(Vec::new());
        };
        let (live, _) = self
            .lesson
            .split(self.lesson.current_index, &self.workspace.read_files()?);
        storage.history().diff_against_live(commit_hash, &live)
    }

    fn stage(&self, index: usize) -> Result<&Stage> {
        self.lesson.stage(index).ok_or(Error::NoSuchStage(index))
    }

    /// `ref_name` unless its history is known to be broken
    fn usable_ref(&self, ref_name: Option<String>) -> Option<String> {
        ref_name.filter(|name| !self.broken_refs.contains(name))
    }

    fn recorded_files(&mut self, ref_name: &str) -> Option<FileSet> {
        self.with_storage(ref_name, |storage| storage.get_snapshot(ref_name))
            .flatten()
    }

    fn sync_report(
        &self,
        current: &Stage,
        live: &FileSet,
        target_template: &FileSet,
        target_hidden: &FileSet,
        target_recorded: Option<&FileSet>,
    ) -> SyncReport {
        compute_sync(&SyncInput {
            current_template: &current.template(),
            current_live: live,
            target_template,
            target_hidden,
            target_recorded,
        })
    }

    /// Run a store operation for `ref_name`, recovering from every failure.
    ///
    /// Corruption disables history for that ref from then on.
    fn with_storage<T, F>(&mut self, ref_name: &str, op: F) -> Option<T>
    where
        F: FnOnce(&FrameworkStorage<S>) -> Result<T>,
    {
        if self.broken_refs.contains(ref_name) {
            return None;
        }
        let storage = self.storage.as_ref()?;
        match op(storage) {
            Ok(value) => Some(value),
            Err(e) if e.is_corruption() => {
                error!(ref_name, "history disabled for ref: {}", e);
                self.broken_refs.insert(ref_name.to_string());
                None
            }
            Err(e) => {
                warn!(ref_name, "framework storage operation failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::TemplateFile;
    use crate::workspace::MemoryWorkspace;
    use tempfile::TempDir;

    type Resolver = fn(&ConflictRequest<'_>) -> Option<Resolution>;

    fn lesson() -> FrameworkLesson {
        FrameworkLesson::new(
            "FizzBuzz",
            vec![
                Stage::new(1, "Fizz")
                    .with_file("Main.kt", TemplateFile::new("fizz"))
                    .with_file("test/Tests.kt", TemplateFile::hidden("test fizz")),
                Stage::new(2, "Buzz")
                    .with_file("Main.kt", TemplateFile::new("fizz"))
                    .with_file("test/Tests.kt", TemplateFile::hidden("test buzz")),
                Stage::new(3, "FizzBuzz")
                    .with_file("Main.kt", TemplateFile::new("fizz"))
                    .with_file("test/Tests.kt", TemplateFile::hidden("test fizzbuzz")),
            ],
        )
    }

    fn controller(
        dir: &TempDir,
        resolver: Resolver,
    ) -> Result<NavigationController<MemoryWorkspace, Resolver>> {
        let lesson = lesson();
        let mut start = lesson.stages[0].template();
        start.insert("test/Tests.kt", "test fizz");
        let storage = FrameworkStorage::open(dir.path())?;
        Ok(NavigationController::new(
            lesson,
            MemoryWorkspace::new(start),
            resolver,
            Some(storage),
        ))
    }

    fn replace(_: &ConflictRequest<'_>) -> Option<Resolution> {
        Some(Resolution::Replace)
    }

    fn dismiss(_: &ConflictRequest<'_>) -> Option<Resolution> {
        None
    }

    #[test]
    fn test_edit_events_mark_propagatable_files_dirty() -> Result<()> {
        let dir = TempDir::new()?;
        let mut nav = controller(&dir, dismiss)?;
        let sender = nav.edit_sender();
        sender.send(EditEvent::new("Main.kt")).unwrap();
        sender.send(EditEvent::new("test/Tests.kt")).unwrap();

        assert_eq!(nav.process_edits(), 1);
        assert_eq!(nav.file_state("Main.kt"), FileState::Dirty);
        assert_eq!(nav.file_state("test/Tests.kt"), FileState::Clean);
        Ok(())
    }

    #[test]
    fn test_refresh_sync_states() -> Result<()> {
        let dir = TempDir::new()?;
        let mut nav = controller(&dir, dismiss)?;
        nav.workspace_mut().edit("Main.kt", "fizz!");
        nav.edit_sender().send(EditEvent::new("Main.kt")).unwrap();

        assert_eq!(nav.refresh_sync_states()?, SyncState::Info);
        assert_eq!(nav.file_state("Main.kt"), FileState::SyncInfo);
        Ok(())
    }

    #[test]
    fn test_next_with_replace_carries_edits_and_swaps_tests() -> Result<()> {
        let dir = TempDir::new()?;
        let mut nav = controller(&dir, replace)?;
        nav.workspace_mut().edit("Main.kt", "fizz!");

        let outcome = nav.next()?.unwrap();
        assert_eq!(outcome.resolution, Some(Resolution::Replace));
        assert_eq!(outcome.sync_state, SyncState::Info);
        assert_eq!(outcome.commits.len(), 2);
        assert_eq!(nav.current_index(), 1);

        let files = nav.workspace().files();
        assert_eq!(files.text("Main.kt"), Some("fizz!"));
        assert_eq!(files.text("test/Tests.kt"), Some("test buzz"));

        let storage = nav.storage().unwrap();
        assert_eq!(storage.current_stage()?.as_deref(), Some("stage_2"));
        assert!(storage.is_ancestor("stage_1", "stage_2")?);
        Ok(())
    }

    #[test]
    fn test_dismissed_dialog_keeps_target() -> Result<()> {
        let dir = TempDir::new()?;
        let mut nav = controller(&dir, dismiss)?;
        nav.workspace_mut().edit("Main.kt", "fizz!");

        let outcome = nav.next()?.unwrap();
        assert_eq!(outcome.resolution, Some(Resolution::Keep));
        assert_eq!(nav.workspace().files().text("Main.kt"), Some("fizz"));
        Ok(())
    }

    #[test]
    fn test_previous_restores_recorded_state_without_asking() -> Result<()> {
        let dir = TempDir::new()?;
        let mut nav = controller(&dir, replace)?;
        nav.workspace_mut().edit("Main.kt", "fizz!");
        nav.next()?;
        nav.workspace_mut().edit("Main.kt", "buzz!");

        let outcome = nav.previous()?.unwrap();
        assert_eq!(outcome.resolution, None);
        assert_eq!(nav.workspace().files().text("Main.kt"), Some("fizz!"));
        assert_eq!(nav.workspace().files().text("test/Tests.kt"), Some("test fizz"));
        assert!(nav.previous()?.is_none());
        Ok(())
    }

    #[test]
    fn test_navigate_to_out_of_range() -> Result<()> {
        let dir = TempDir::new()?;
        let mut nav = controller(&dir, dismiss)?;
        assert!(matches!(nav.navigate_to(7), Err(Error::NoSuchStage(7))));
        assert_eq!(nav.current_index(), 0);
        Ok(())
    }

    #[test]
    fn test_save_current_and_timestamp() -> Result<()> {
        let dir = TempDir::new()?;
        let mut nav = controller(&dir, dismiss)?;

        assert_eq!(nav.changes_timestamp(0)?, None);
        assert!(nav.save_current()?.is_some());
        assert!(nav.save_current()?.is_none());
        assert!(nav.changes_timestamp(0)?.is_some());

        let history = nav.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "Auto-save changes for 'Fizz'");
        Ok(())
    }

    #[test]
    fn test_external_state_keeps_propagatable_files() -> Result<()> {
        let dir = TempDir::new()?;
        let mut nav = controller(&dir, dismiss)?;
        let submission: FileSet = [("Main.kt", "solved"), ("test/Tests.kt", "server tests")]
            .into_iter()
            .collect();

        assert!(nav.save_external_state(1, &submission)?.is_some());
        let state = nav.stage_state(1)?;
        assert_eq!(state.text("Main.kt"), Some("solved"));
        assert_eq!(state.text("test/Tests.kt"), Some("test buzz"));
        Ok(())
    }

    #[test]
    fn test_sync_current_index_from_storage() -> Result<()> {
        let dir = TempDir::new()?;
        let mut nav = controller(&dir, replace)?;
        nav.navigate_to(2)?;
        drop(nav);

        let mut reopened = controller(&dir, replace)?;
        assert_eq!(reopened.current_index(), 0);
        assert!(reopened.sync_current_index_from_storage());
        assert_eq!(reopened.current_index(), 2);
        assert!(!reopened.sync_current_index_from_storage());
        Ok(())
    }
}
