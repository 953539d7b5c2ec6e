use super::State;
use crate::error::Result;

/// Hex-encoded SHA-256 digest of an object's uncompressed encoding.
pub type ObjectId = String;

/// Trait for immutable, content-addressed storage operations
pub trait ImmutableStore {
    /// Write an encoded object and return its identifier.
    /// If the object already exists, returns the identifier without writing.
    fn write_object(&self, content: &[u8]) -> Result<ObjectId>;

    /// Read an encoded object by identifier.
    /// Returns `None` if the object doesn't exist.
    fn read_object(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Check if object exists by identifier.
    fn object_exists(&self, id: &str) -> Result<bool>;
}

/// Trait for mutable state management
pub trait MutableState {
    /// Read the current state.
    /// Returns default state if none exists.
    fn read_state(&self) -> Result<State>;

    /// Atomically write new state.
    /// Implementation should ensure atomicity (temp file + rename or equivalent).
    fn write_state(&self, state: &State) -> Result<()>;

    /// Atomically update state using a closure.
    /// Handles read-modify-write with proper atomicity.
    fn update_state<F>(&self, update_fn: F) -> Result<()>
    where
        F: FnOnce(&mut State) -> Result<()>,
    {
        let mut state = self.read_state()?;
        update_fn(&mut state)?;
        self.write_state(&state)
    }
}

/// Combined storage backend trait
pub trait StorageBackend: ImmutableStore + MutableState {
    /// Initialize storage (create directories, verify access, etc.)
    fn initialize(&self) -> Result<()>;
}
