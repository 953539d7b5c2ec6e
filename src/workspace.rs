use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::fileset::FileSet;

/// The task folder shared by every stage of a lesson.
pub trait TaskWorkspace {
    /// Current contents of the folder
    fn read_files(&self) -> Result<FileSet>;

    /// Make the folder hold exactly `files`.
    fn replace_files(&mut self, files: &FileSet) -> Result<()>;
}

/// Task folder on disk.
pub struct DirWorkspace {
    root: PathBuf,
}

impl DirWorkspace {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        DirWorkspace {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_path(&self, path: &Path) -> Result<String> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| Error::Corrupt(format!("{} is outside the task folder", path.display())))?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(parts.join("/"))
    }

    /// Remove the directories above `path` that no longer hold anything,
    /// stopping at the task folder itself.
    fn prune_empty_parents(&self, path: &str) -> Result<()> {
        let mut dir = self.root.join(path).parent().map(Path::to_path_buf);
        while let Some(current) = dir {
            if current == self.root || !current.is_dir() || fs::read_dir(&current)?.next().is_some() {
                break;
            }
            fs::remove_dir(&current)?;
            debug!(dir = %current.display(), "removed empty task directory");
            dir = current.parent().map(Path::to_path_buf);
        }
        Ok(())
    }
}

impl TaskWorkspace for DirWorkspace {
    fn read_files(&self) -> Result<FileSet> {
        let mut files = FileSet::new();
        if !self.root.exists() {
            return Ok(files);
        }
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() {
                let path = self.relative_path(entry.path())?;
                files.insert(path, fs::read(entry.path())?);
            }
        }
        Ok(files)
    }

    fn replace_files(&mut self, files: &FileSet) -> Result<()> {
        let existing = self.read_files()?;

        let removed: Vec<&str> = existing.paths().filter(|path| !files.contains(path)).collect();
        for path in &removed {
            fs::remove_file(self.root.join(path))?;
            debug!(path, "removed task file");
        }

        for (path, content) in files.iter() {
            if existing.get(path) == Some(content) {
                continue;
            }
            let full_path = self.root.join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&full_path, content)?;
            debug!(path, "wrote task file");
        }

        for path in removed {
            self.prune_empty_parents(path)?;
        }
        Ok(())
    }
}

/// Task folder held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryWorkspace {
    files: FileSet,
}

impl MemoryWorkspace {
    pub fn new(files: FileSet) -> Self {
        MemoryWorkspace { files }
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    /// Simulate the learner typing into `path`.
    pub fn edit(&mut self, path: &str, content: impl Into<Vec<u8>>) {
        self.files.insert(path, content);
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(path);
    }
}

impl TaskWorkspace for MemoryWorkspace {
    fn read_files(&self) -> Result<FileSet> {
        Ok(self.files.clone())
    }

    fn replace_files(&mut self, files: &FileSet) -> Result<()> {
        self.files = files.clone();
        Ok(())
    }
}
