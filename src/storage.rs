mod commit;
mod filesystem;
mod object;
mod refs;
mod snapshot;
mod state;
mod traits;

pub use commit::{Commit, CommitGraph, DEFAULT_HISTORY_DEPTH};
pub use filesystem::FilesystemStorage;
pub use object::{compute_hash, ObjectKind};
pub use refs::{RefTable, STORAGE_VERSION};
pub use snapshot::SnapshotStore;
pub use state::State;
pub use traits::{ImmutableStore, MutableState, ObjectId, StorageBackend};
