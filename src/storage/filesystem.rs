use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::object::compute_hash;
use super::traits::{ImmutableStore, MutableState, ObjectId, StorageBackend};
use super::State;
use crate::error::{Error, Result};

const DEFAULT_COMPRESSION: u32 = 6;

/// Filesystem-based storage backend using SHA-256 content addressing.
///
/// Objects live zlib-compressed under `objects/ab/cdef...` (hash computed on
/// the uncompressed bytes). The ref index is a single `state.yaml` replaced
/// atomically on every update.
pub struct FilesystemStorage {
    base_path: PathBuf,
    compression: Compression,
}

impl FilesystemStorage {
    /// Create a new filesystem storage backend
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self::with_compression(base_path, DEFAULT_COMPRESSION)
    }

    /// Create a backend with an explicit zlib level (0-9, clamped)
    pub fn with_compression<P: AsRef<Path>>(base_path: P, level: u32) -> Self {
        FilesystemStorage {
            base_path: base_path.as_ref().to_path_buf(),
            compression: Compression::new(level.min(9)),
        }
    }

    /// Get the path to the objects directory
    fn objects_dir(&self) -> PathBuf {
        self.base_path.join("objects")
    }

    /// Get the path to the state file
    fn state_path(&self) -> PathBuf {
        self.base_path.join("state.yaml")
    }

    /// Path of object `id`, or `None` when `id` is not a lowercase hex id
    /// and so cannot name a stored object.
    fn object_path(&self, id: &str) -> Option<PathBuf> {
        let valid = id.len() > 2 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return None;
        }
        let (dir, file) = id.split_at(2);
        Some(self.objects_dir().join(dir).join(file))
    }

    /// Write `content` to `path` through a temp file in the store directory,
    /// so readers never observe a partially written file.
    fn write_atomically(&self, path: &Path, content: &[u8]) -> Result<()> {
        let mut temp = NamedTempFile::new_in(&self.base_path)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// List the ids of every stored object
    pub fn object_ids(&self) -> Result<Vec<ObjectId>> {
        let objects_dir = self.objects_dir();
        if !objects_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in walkdir::WalkDir::new(&objects_dir).min_depth(2).max_depth(2) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let prefix = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str());
            let rest = entry.file_name().to_str();
            match (prefix, rest) {
                (Some(prefix), Some(rest)) => ids.push(format!("{}{}", prefix, rest)),
                _ => warn!("Skipping unreadable object path {:?}", entry.path()),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ImmutableStore for FilesystemStorage {
    fn write_object(&self, content: &[u8]) -> Result<ObjectId> {
        // 1. Compute SHA-256 hash of the uncompressed encoding
        let id = compute_hash(content);
        let path = self
            .object_path(&id)
            .ok_or_else(|| Error::Corrupt(format!("computed object id {} is not hex", id)))?;

        // 2. Only write if doesn't exist (immutable)
        if path.exists() {
            return Ok(id);
        }

        // 3. Compress and move into place
        let mut encoder = ZlibEncoder::new(Vec::new(), self.compression);
        encoder.write_all(content)?;
        let compressed = encoder.finish()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.write_atomically(&path, &compressed)?;
        debug!(object = %id, bytes = content.len(), "wrote object");

        Ok(id)
    }

    fn read_object(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.object_path(id) else {
            debug!(object = id, "not an object id");
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let compressed = fs::read(&path)?;
        let mut content = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut content)
            .map_err(|e| Error::Corrupt(format!("object {} failed to decompress: {}", id, e)))?;

        if compute_hash(&content) != id {
            return Err(Error::Corrupt(format!(
                "object {} does not match its content hash",
                id
            )));
        }

        Ok(Some(content))
    }

    fn object_exists(&self, id: &str) -> Result<bool> {
        Ok(self.object_path(id).is_some_and(|path| path.exists()))
    }
}

impl MutableState for FilesystemStorage {
    fn read_state(&self) -> Result<State> {
        let state_path = self.state_path();
        if state_path.exists() {
            let content = fs::read_to_string(&state_path)?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(State::default())
        }
    }

    fn write_state(&self, state: &State) -> Result<()> {
        let yaml = serde_yaml::to_string(state)?;
        self.write_atomically(&self.state_path(), yaml.as_bytes())
    }
}

impl StorageBackend for FilesystemStorage {
    fn initialize(&self) -> Result<()> {
        fs::create_dir_all(self.objects_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_object() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let storage = FilesystemStorage::new(temp_dir.path());
        storage.initialize()?;

        let content = b"\x01Hello, World!";
        let id = storage.write_object(content)?;

        assert_eq!(storage.read_object(&id)?, Some(content.to_vec()));
        assert!(storage.object_exists(&id)?);
        Ok(())
    }

    #[test]
    fn test_object_deduplication() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let storage = FilesystemStorage::new(temp_dir.path());
        storage.initialize()?;

        let content = b"Test content";
        let id1 = storage.write_object(content)?;
        let id2 = storage.write_object(content)?;

        assert_eq!(id1, id2);
        assert_eq!(storage.object_ids()?, vec![id1]);
        Ok(())
    }

    #[test]
    fn test_objects_are_compressed_on_disk() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let storage = FilesystemStorage::new(temp_dir.path());
        storage.initialize()?;

        let content = vec![b'a'; 4096];
        let id = storage.write_object(&content)?;

        let on_disk = fs::read(storage.object_path(&id).expect("hex id"))?;
        assert!(on_disk.len() < content.len());
        Ok(())
    }

    #[test]
    fn test_missing_object_reads_as_none() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let storage = FilesystemStorage::new(temp_dir.path());
        storage.initialize()?;

        assert_eq!(storage.read_object("deadbeef")?, None);
        assert!(!storage.object_exists("deadbeef")?);
        Ok(())
    }

    #[test]
    fn test_non_hex_ids_never_leave_the_objects_dir() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let storage = FilesystemStorage::new(temp_dir.path());
        storage.initialize()?;
        fs::write(temp_dir.path().join("outside"), b"not an object")?;

        for id in ["../outside", "..", "ab/../../outside", "ABCDEF", "a", ""] {
            assert_eq!(storage.read_object(id)?, None, "id {:?}", id);
            assert!(!storage.object_exists(id)?);
        }
        Ok(())
    }

    #[test]
    fn test_tampered_object_is_corrupt() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let storage = FilesystemStorage::new(temp_dir.path());
        storage.initialize()?;

        let id = storage.write_object(b"original")?;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"tampered")?;
        fs::write(storage.object_path(&id).expect("hex id"), encoder.finish()?)?;

        assert!(matches!(storage.read_object(&id), Err(Error::Corrupt(_))));
        Ok(())
    }

    #[test]
    fn test_state_persistence() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let storage = FilesystemStorage::new(temp_dir.path());
        storage.initialize()?;

        assert_eq!(storage.read_state()?, State::default());

        storage.update_state(|state| {
            state.version = 3;
            state.head = Some("stage_1".to_string());
            state.refs.insert("stage_1".to_string(), "abc123".to_string());
            Ok(())
        })?;

        let read_state = storage.read_state()?;
        assert_eq!(read_state.version, 3);
        assert_eq!(read_state.head.as_deref(), Some("stage_1"));
        assert_eq!(
            read_state.refs.get("stage_1"),
            Some(&"abc123".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_initialize_fails_when_path_is_a_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let file_path = temp_dir.path().join("storage_v3");
        fs::write(&file_path, b"not a directory")?;

        let storage = FilesystemStorage::new(&file_path);
        assert!(matches!(storage.initialize(), Err(Error::Io(_))));
        Ok(())
    }
}
