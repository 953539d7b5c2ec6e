use std::collections::BTreeMap;

use crate::fileset::FileSet;

/// Directories treated as test sources when the lesson names none.
pub const DEFAULT_TEST_DIRS: &[&str] = &["test", "tests"];

/// One file of a stage template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub content: Vec<u8>,
    pub visible: bool,
    pub editable: bool,
}

impl TemplateFile {
    /// A visible, editable file
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        TemplateFile {
            content: content.into(),
            visible: true,
            editable: true,
        }
    }

    pub fn hidden(content: impl Into<Vec<u8>>) -> Self {
        TemplateFile {
            visible: false,
            ..Self::new(content)
        }
    }

    pub fn read_only(content: impl Into<Vec<u8>>) -> Self {
        TemplateFile {
            editable: false,
            ..Self::new(content)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub id: u64,
    pub name: String,
    pub files: BTreeMap<String, TemplateFile>,
}

impl Stage {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Stage {
            id,
            name: name.into(),
            files: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, path: impl Into<String>, file: TemplateFile) -> Self {
        self.files.insert(path.into(), file);
        self
    }

    /// Ref under which this stage's history is stored
    pub fn storage_ref(&self) -> String {
        format!("stage_{}", self.id)
    }

    /// The template contents as a file set
    pub fn template(&self) -> FileSet {
        self.files
            .iter()
            .map(|(path, file)| (path.as_str(), file.content.as_slice()))
            .collect()
    }
}

/// Ordered stages sharing one task folder.
#[derive(Debug, Clone)]
pub struct FrameworkLesson {
    pub name: String,
    pub stages: Vec<Stage>,
    pub current_index: usize,
    /// When false, learner changes are never carried to the next stage
    pub propagate_files_on_navigation: bool,
    pub test_dirs: Vec<String>,
}

impl FrameworkLesson {
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        FrameworkLesson {
            name: name.into(),
            stages,
            current_index: 0,
            propagate_files_on_navigation: true,
            test_dirs: DEFAULT_TEST_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.stage(self.current_index)
    }

    pub fn index_of_ref(&self, ref_name: &str) -> Option<usize> {
        self.stages
            .iter()
            .position(|stage| stage.storage_ref() == ref_name)
    }

    /// Ref of the stage before `index`, the parent for a first commit.
    pub fn previous_ref(&self, index: usize) -> Option<String> {
        index
            .checked_sub(1)
            .and_then(|prev| self.stage(prev))
            .map(Stage::storage_ref)
    }

    /// Whether the learner's version of `path` travels between stages.
    ///
    /// Template files must be visible and editable; files the learner
    /// created are carried along. Test files never are.
    pub fn should_be_propagated(&self, stage_index: usize, path: &str) -> bool {
        if is_test_file_path(path, &self.test_dirs) {
            return false;
        }
        match self
            .stage(stage_index)
            .and_then(|stage| stage.files.get(path))
        {
            Some(file) => file.visible && file.editable,
            None => true,
        }
    }

    /// Split `files` into `(propagatable, rest)` for the given stage.
    pub fn split(&self, stage_index: usize, files: &FileSet) -> (FileSet, FileSet) {
        files.split(|path| self.should_be_propagated(stage_index, path))
    }
}

/// Naming and location heuristics for test sources.
pub fn is_test_file_path<S: AsRef<str>>(path: &str, test_dirs: &[S]) -> bool {
    let in_test_dir = test_dirs.iter().any(|dir| {
        let dir = dir.as_ref().trim_matches('/');
        !dir.is_empty()
            && (path.starts_with(&format!("{}/", dir)) || path.contains(&format!("/{}/", dir)))
    });
    if in_test_dir {
        return true;
    }

    let name = path.rsplit('/').next().unwrap_or(path);
    name == "tests.py"
        || name.starts_with("test_")
        || name.ends_with("_test.py")
        || name.ends_with("Test.java")
        || name.ends_with("Test.kt")
        || name.ends_with("Tests.java")
        || name.ends_with("Tests.kt")
}
