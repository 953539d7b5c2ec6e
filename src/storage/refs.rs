use tracing::{debug, info};

use super::object::ObjectKind;
use super::{CommitGraph, ObjectId, StorageBackend};
use crate::error::{Error, Result};

/// Storage format version written by this crate.
pub const STORAGE_VERSION: u32 = 3;

/// Mutable index of stage refs, backed by the storage's state file.
pub struct RefTable<'a, S> {
    backend: &'a S,
}

impl<'a, S: StorageBackend> RefTable<'a, S> {
    pub fn new(backend: &'a S) -> Self {
        RefTable { backend }
    }

    /// Head commit of `ref_name`, `None` if the ref was never written.
    ///
    /// A ref whose commit is missing from the store is a `DanglingRef`.
    pub fn resolve(&self, ref_name: &str) -> Result<Option<ObjectId>> {
        let state = self.backend.read_state()?;
        match state.refs.get(ref_name) {
            None => Ok(None),
            Some(hash) if self.backend.object_exists(hash)? => Ok(Some(hash.clone())),
            Some(hash) => Err(Error::DanglingRef {
                ref_name: ref_name.to_string(),
                hash: hash.clone(),
            }),
        }
    }

    pub fn has_ref(&self, ref_name: &str) -> Result<bool> {
        Ok(self.backend.read_state()?.refs.contains_key(ref_name))
    }

    /// Point `ref_name` at `commit_hash`.
    ///
    /// The commit must already be stored: the ref index is only rewritten
    /// after the object it names is durable.
    pub fn set_head(&self, ref_name: &str, commit_hash: &str) -> Result<()> {
        if !CommitGraph::new(self.backend).contains(commit_hash)? {
            return Err(Error::NotFound {
                kind: ObjectKind::Commit,
                hash: commit_hash.to_string(),
            });
        }

        self.backend.update_state(|state| {
            state
                .refs
                .insert(ref_name.to_string(), commit_hash.to_string());
            Ok(())
        })?;
        debug!(ref_name, commit = %commit_hash, "moved ref");
        Ok(())
    }

    /// All refs sorted by name
    pub fn all_refs(&self) -> Result<Vec<(String, ObjectId)>> {
        Ok(self.backend.read_state()?.refs.into_iter().collect())
    }

    /// Ref of the stage the learner is on, if recorded
    pub fn current_stage(&self) -> Result<Option<String>> {
        Ok(self.backend.read_state()?.head)
    }

    pub fn set_current_stage(&self, ref_name: Option<&str>) -> Result<()> {
        self.backend.update_state(|state| {
            state.head = ref_name.map(str::to_string);
            Ok(())
        })
    }

    pub fn version(&self) -> Result<u32> {
        Ok(self.backend.read_state()?.version)
    }

    pub fn set_version(&self, version: u32) -> Result<()> {
        self.backend.update_state(|state| {
            state.version = version;
            Ok(())
        })
    }

    /// Raise the stored format version; never lowers it.
    pub fn migrate(&self, version: u32) -> Result<()> {
        let current = self.version()?;
        if current >= version {
            return Ok(());
        }
        self.set_version(version)?;
        info!("Framework storage migrated from version {} to {}", current, version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileset::FileSet;
    use crate::storage::{FilesystemStorage, MutableState, SnapshotStore};
    use tempfile::TempDir;

    fn setup() -> Result<(TempDir, FilesystemStorage, ObjectId)> {
        let dir = TempDir::new()?;
        let backend = FilesystemStorage::new(dir.path());
        backend.initialize()?;
        let snap = SnapshotStore::new(&backend).put(&FileSet::new())?;
        let commit = CommitGraph::new(&backend).commit(&snap, &[], "init")?;
        Ok((dir, backend, commit))
    }

    #[test]
    fn test_set_head_and_resolve() -> Result<()> {
        let (_dir, backend, commit) = setup()?;
        let refs = RefTable::new(&backend);

        assert_eq!(refs.resolve("stage_1")?, None);
        assert!(!refs.has_ref("stage_1")?);

        refs.set_head("stage_1", &commit)?;
        assert_eq!(refs.resolve("stage_1")?, Some(commit.clone()));
        assert!(refs.has_ref("stage_1")?);
        assert_eq!(refs.all_refs()?, vec![("stage_1".to_string(), commit)]);
        Ok(())
    }

    #[test]
    fn test_set_head_refuses_unstored_commit() -> Result<()> {
        let (_dir, backend, commit) = setup()?;
        let refs = RefTable::new(&backend);
        refs.set_head("stage_1", &commit)?;

        assert!(refs.set_head("stage_1", "0123abcd").is_err());
        assert_eq!(refs.resolve("stage_1")?, Some(commit));
        Ok(())
    }

    #[test]
    fn test_set_head_refuses_non_commit_object() -> Result<()> {
        let (_dir, backend, _commit) = setup()?;
        let snap = SnapshotStore::new(&backend).put(&FileSet::new())?;

        let refs = RefTable::new(&backend);
        assert!(refs.set_head("stage_1", &snap).is_err());
        assert!(!refs.has_ref("stage_1")?);
        Ok(())
    }

    #[test]
    fn test_dangling_ref_is_reported() -> Result<()> {
        let (_dir, backend, _commit) = setup()?;
        backend.update_state(|state| {
            state.refs.insert("stage_9".to_string(), "feedface".to_string());
            Ok(())
        })?;

        let refs = RefTable::new(&backend);
        assert!(refs.has_ref("stage_9")?);
        assert!(matches!(
            refs.resolve("stage_9"),
            Err(Error::DanglingRef { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_current_stage_and_version() -> Result<()> {
        let (_dir, backend, _commit) = setup()?;
        let refs = RefTable::new(&backend);

        assert_eq!(refs.current_stage()?, None);
        refs.set_current_stage(Some("stage_2"))?;
        assert_eq!(refs.current_stage()?.as_deref(), Some("stage_2"));
        refs.set_current_stage(None)?;
        assert_eq!(refs.current_stage()?, None);

        assert_eq!(refs.version()?, 0);
        refs.migrate(STORAGE_VERSION)?;
        refs.migrate(1)?;
        assert_eq!(refs.version()?, STORAGE_VERSION);
        Ok(())
    }
}
