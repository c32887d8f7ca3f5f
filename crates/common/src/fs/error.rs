use std::io;

use crate::error::{ErrorKind, Fault};

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not a file: {0}")]
    NotAFile(String),
    #[error("directory not empty: {0}")]
    NotEmpty(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid search pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid root {root}: {reason}")]
    InvalidRoot { root: String, reason: String },
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Map an io error raised while touching `path`. Missing files and
    /// existing destinations keep their own kinds, anything else is
    /// reported as an internal failure.
    pub fn from_io(path: impl Into<String>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::PathNotFound(path),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path),
            io::ErrorKind::DirectoryNotEmpty => Self::NotEmpty(path),
            _ => Self::Io { path, source: err },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::PathNotFound(_) => ErrorKind::PathNotFound,
            FsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            FsError::NotAFile(_) => ErrorKind::NotAFile,
            FsError::NotEmpty(_) => ErrorKind::NotEmpty,
            FsError::InvalidPath(_) => ErrorKind::InvalidPath,
            FsError::InvalidPattern { .. } => ErrorKind::InvalidPattern,
            FsError::InvalidRoot { .. } => ErrorKind::InvalidRoot,
            FsError::Io { .. } => ErrorKind::Internal,
        }
    }
}

impl From<FsError> for Fault {
    fn from(err: FsError) -> Self {
        Fault::new(err.kind(), err.to_string())
    }
}
