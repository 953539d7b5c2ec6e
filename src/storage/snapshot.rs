use tracing::debug;

use super::object::{load_object, ObjectKind, ObjectReader, ObjectWriter, MAX_BLOB_SIZE, MAX_SNAPSHOT_ENTRIES};
use super::{ObjectId, StorageBackend};
use crate::error::{Error, Result};
use crate::fileset::FileSet;

/// Content-addressed store of full file sets.
///
/// A snapshot object lists `(path, blob id)` pairs in path order; each blob
/// holds one file's bytes. Identical file sets always map to the same id and
/// identical files are stored once no matter how many snapshots share them.
pub struct SnapshotStore<'a, S> {
    backend: &'a S,
}

impl<'a, S: StorageBackend> SnapshotStore<'a, S> {
    pub fn new(backend: &'a S) -> Self {
        SnapshotStore { backend }
    }

    /// Store a file set and return its snapshot hash.
    pub fn put(&self, files: &FileSet) -> Result<ObjectId> {
        if files.len() > MAX_SNAPSHOT_ENTRIES {
            return Err(Error::Corrupt(format!(
                "snapshot of {} files exceeds the limit of {}",
                files.len(),
                MAX_SNAPSHOT_ENTRIES
            )));
        }

        let mut writer = ObjectWriter::new(ObjectKind::Snapshot);
        writer.put_u32(files.len() as u32);
        for (path, content) in files.iter() {
            let blob = self.put_blob(content)?;
            writer.put_str(path).put_str(&blob);
        }

        let hash = self.backend.write_object(&writer.finish())?;
        debug!(snapshot = %hash, files = files.len(), "stored snapshot");
        Ok(hash)
    }

    /// Load the file set stored under `hash`.
    pub fn get(&self, hash: &str) -> Result<FileSet> {
        let raw = load_object(self.backend, hash, ObjectKind::Snapshot)?;
        let mut reader = ObjectReader::open(hash, &raw, ObjectKind::Snapshot)?;

        let count = reader.count(MAX_SNAPSHOT_ENTRIES)?;
        let mut files = FileSet::new();
        for _ in 0..count {
            let path = reader.string()?;
            let blob = reader.string()?;
            files.insert(path, self.get_blob(&blob)?);
        }
        reader.finish()?;

        Ok(files)
    }

    /// Check whether a snapshot object is stored.
    pub fn contains(&self, hash: &str) -> Result<bool> {
        match self.backend.read_object(hash)? {
            Some(raw) => Ok(ObjectKind::of(&raw) == Some(ObjectKind::Snapshot)),
            None => Ok(false),
        }
    }

    fn put_blob(&self, content: &[u8]) -> Result<ObjectId> {
        if content.len() > MAX_BLOB_SIZE {
            return Err(Error::Corrupt(format!(
                "file of {} bytes exceeds the limit of {}",
                content.len(),
                MAX_BLOB_SIZE
            )));
        }
        let mut writer = ObjectWriter::new(ObjectKind::Blob);
        writer.put_bytes(content);
        self.backend.write_object(&writer.finish())
    }

    fn get_blob(&self, hash: &str) -> Result<Vec<u8>> {
        let raw = load_object(self.backend, hash, ObjectKind::Blob)?;
        let mut reader = ObjectReader::open(hash, &raw, ObjectKind::Blob)?;
        let content = reader.bytes(MAX_BLOB_SIZE)?.to_vec();
        reader.finish()?;
        Ok(content)
    }
}
