use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::Result;
use crate::fileset::FileSet;
use crate::history::HistoryView;
use crate::storage::{
    Commit, CommitGraph, FilesystemStorage, ObjectId, RefTable, SnapshotStore, StorageBackend,
    DEFAULT_HISTORY_DEPTH, STORAGE_VERSION,
};

/// A ref together with the commit it points to
#[derive(Debug, Clone, Serialize)]
pub struct RefInfo {
    pub ref_name: String,
    pub commit: Commit,
    /// True for the stage the learner is currently on
    pub is_current: bool,
}

/// Snapshot store, commit graph and ref table over one backend.
pub struct FrameworkStorage<S = FilesystemStorage> {
    backend: S,
    history_depth: usize,
}

impl FrameworkStorage<FilesystemStorage> {
    /// Open (creating if needed) a file-backed store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_backend(FilesystemStorage::new(path))
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &StorageConfig) -> Result<Self> {
        let backend = FilesystemStorage::with_compression(path, config.compression_level);
        let mut storage = Self::with_backend(backend)?;
        storage.history_depth = config.history_depth;
        Ok(storage)
    }
}

impl<S: StorageBackend> FrameworkStorage<S> {
    /// Initialize `backend` and bring its format version up to date.
    pub fn with_backend(backend: S) -> Result<Self> {
        backend.initialize()?;
        RefTable::new(&backend).migrate(STORAGE_VERSION)?;
        Ok(FrameworkStorage {
            backend,
            history_depth: DEFAULT_HISTORY_DEPTH,
        })
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn snapshots(&self) -> SnapshotStore<'_, S> {
        SnapshotStore::new(&self.backend)
    }

    pub fn commits(&self) -> CommitGraph<'_, S> {
        CommitGraph::new(&self.backend)
    }

    pub fn refs(&self) -> RefTable<'_, S> {
        RefTable::new(&self.backend)
    }

    pub fn history(&self) -> HistoryView<'_, S> {
        HistoryView::new(self)
    }

    pub fn history_depth(&self) -> usize {
        self.history_depth
    }

    pub fn get_commit(&self, hash: &str) -> Result<Commit> {
        self.commits().get(hash)
    }

    pub fn get_snapshot_by_hash(&self, hash: &str) -> Result<FileSet> {
        self.snapshots().get(hash)
    }

    pub fn resolve_ref(&self, ref_name: &str) -> Result<Option<ObjectId>> {
        self.refs().resolve(ref_name)
    }

    pub fn has_ref(&self, ref_name: &str) -> Result<bool> {
        self.refs().has_ref(ref_name)
    }

    /// Files recorded by the head commit of `ref_name`
    pub fn get_snapshot(&self, ref_name: &str) -> Result<Option<FileSet>> {
        match self.resolve_ref(ref_name)? {
            Some(hash) => {
                let commit = self.get_commit(&hash)?;
                Ok(Some(self.get_snapshot_by_hash(&commit.snapshot_hash)?))
            }
            None => Ok(None),
        }
    }

    /// When the head commit of `ref_name` was made
    pub fn snapshot_timestamp(&self, ref_name: &str) -> Result<Option<i64>> {
        match self.resolve_ref(ref_name)? {
            Some(hash) => Ok(Some(self.get_commit(&hash)?.timestamp_millis)),
            None => Ok(None),
        }
    }

    /// Store `files`, commit them with `parents` and move `ref_name` onto
    /// the new commit.
    pub fn commit_files(
        &self,
        ref_name: &str,
        files: &FileSet,
        parents: &[ObjectId],
        message: &str,
    ) -> Result<ObjectId> {
        let snapshot = self.snapshots().put(files)?;
        let commit = self.commits().commit(&snapshot, parents, message)?;
        self.refs().set_head(ref_name, &commit)?;
        info!(ref_name, commit = %commit, "{}", message);
        Ok(commit)
    }

    /// Record `files` as the new state of `ref_name`.
    ///
    /// The parent is the ref's current head, or on the ref's first commit the
    /// head of `parent_ref` (the previous stage), so stage histories chain.
    /// Returns `None` without writing a commit when the files equal what the
    /// head already records.
    pub fn save_snapshot(
        &self,
        ref_name: &str,
        files: &FileSet,
        parent_ref: Option<&str>,
        message: &str,
    ) -> Result<Option<ObjectId>> {
        let parents = match self.resolve_ref(ref_name)? {
            Some(head) => {
                let snapshot = self.snapshots().put(files)?;
                if self.get_commit(&head)?.snapshot_hash == snapshot {
                    debug!(ref_name, "snapshot unchanged, no commit");
                    return Ok(None);
                }
                vec![head]
            }
            None => match parent_ref {
                Some(parent_ref) => self.resolve_ref(parent_ref)?.into_iter().collect(),
                None => Vec::new(),
            },
        };

        self.commit_files(ref_name, files, &parents, message).map(Some)
    }

    /// Record `files` for `ref_name` with the heads of `parent_refs` as
    /// parents (refs without a head are skipped, duplicates collapse).
    ///
    /// Always writes a commit.
    pub fn save_merge_snapshot(
        &self,
        ref_name: &str,
        files: &FileSet,
        parent_refs: &[&str],
        message: &str,
    ) -> Result<ObjectId> {
        let mut parents: Vec<ObjectId> = Vec::new();
        for parent_ref in parent_refs {
            if let Some(hash) = self.resolve_ref(parent_ref)? {
                if !parents.contains(&hash) {
                    parents.push(hash);
                }
            }
        }
        self.commit_files(ref_name, files, &parents, message)
    }

    /// Whether the head of `ancestor_ref` is reachable from the head of
    /// `descendant_ref`. False when either ref has no head.
    pub fn is_ancestor(&self, ancestor_ref: &str, descendant_ref: &str) -> Result<bool> {
        let ancestor = self.resolve_ref(ancestor_ref)?;
        let descendant = self.resolve_ref(descendant_ref)?;
        match (ancestor, descendant) {
            (Some(ancestor), Some(descendant)) => {
                self.commits().is_ancestor(&ancestor, &descendant)
            }
            _ => Ok(false),
        }
    }

    /// Every ref with its head commit; unreadable refs are skipped.
    pub fn all_refs(&self) -> Result<Vec<RefInfo>> {
        let refs = self.refs();
        let current = refs.current_stage()?;
        let mut infos = Vec::new();
        for (ref_name, hash) in refs.all_refs()? {
            match self.get_commit(&hash) {
                Ok(commit) => infos.push(RefInfo {
                    is_current: current.as_deref() == Some(ref_name.as_str()),
                    ref_name,
                    commit,
                }),
                Err(e) => warn!(ref_name = %ref_name, "skipping ref: {}", e),
            }
        }
        Ok(infos)
    }

    pub fn current_stage(&self) -> Result<Option<String>> {
        self.refs().current_stage()
    }

    pub fn set_current_stage(&self, ref_name: Option<&str>) -> Result<()> {
        self.refs().set_current_stage(ref_name)
    }

    pub fn version(&self) -> Result<u32> {
        self.refs().version()
    }
}
