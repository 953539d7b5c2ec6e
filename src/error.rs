use std::fmt;

use crate::storage::ObjectKind;

/// Errors raised by the framework storage.
///
/// None of these are fatal for the process: the navigation controller
/// recovers from every variant by disabling history (for one ref or for the
/// whole store) and carrying on with a best-effort file swap.
#[derive(Debug)]
pub enum Error {
    /// An object hash is absent from the store.
    NotFound { kind: ObjectKind, hash: String },
    /// A ref points at a commit that is not stored.
    DanglingRef { ref_name: String, hash: String },
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    /// An object exists but could not be decoded.
    Corrupt(String),
    InvalidLink(String),
    /// Navigation target outside the lesson.
    NoSuchStage(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the errors that mean "this ref's history is unusable".
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::DanglingRef { .. } | Error::Corrupt(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound { kind, hash } => write!(f, "{} {} not found", kind, hash),
            Error::DanglingRef { ref_name, hash } => {
                write!(f, "Ref {} points to missing commit {}", ref_name, hash)
            }
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Yaml(e) => write!(f, "YAML error: {}", e),
            Error::Corrupt(msg) => write!(f, "Corrupted object: {}", msg),
            Error::InvalidLink(url) => write!(f, "Invalid history link: {}", url),
            Error::NoSuchStage(index) => write!(f, "Lesson has no stage at index {}", index),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Yaml(e)
    }
}
