#![deny(clippy::mod_module_files)]
//! Content-addressed history for framework lessons: every stage of a lesson
//! shares one task folder, and this crate records each stage's files, carries
//! the learner's edits forward on navigation and shows what changed.

pub mod config;
pub mod diff;
pub mod error;
pub mod fileset;
pub mod history;
pub mod lesson;
pub mod navigation;
pub mod repository;
pub mod storage;
pub mod sync;
pub mod workspace;

pub use config::StorageConfig;
pub use diff::{diff, ChangeType, FileChange};
pub use error::{Error, Result};
pub use fileset::FileSet;
pub use history::{render, CommitSummary, HistoryLink, HistoryView};
pub use lesson::{FrameworkLesson, Stage, TemplateFile};
pub use navigation::{
    ConflictRequest, ConflictResolver, EditEvent, NavigationController, NavigationOutcome,
    Resolution,
};
pub use repository::{FrameworkStorage, RefInfo};
pub use sync::{FileState, SyncState};
pub use workspace::{DirWorkspace, MemoryWorkspace, TaskWorkspace};
