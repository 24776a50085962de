//! Error taxonomy shared by every file system implementation

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse category of an [`FsError`], for callers that branch on the kind
/// rather than on the full error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPath,
    NotFound,
    AlreadyExists,
    NotADirectory,
    NotAFile,
    DirectoryNotEmpty,
    AccessDenied,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidPath => "invalid path",
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::NotADirectory => "not a directory",
            ErrorKind::NotAFile => "not a file",
            ErrorKind::DirectoryNotEmpty => "directory not empty",
            ErrorKind::AccessDenied => "access denied",
            ErrorKind::Io => "i/o error",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum FsError {
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("No such file or directory: {0}")]
    NotFound(PathBuf),

    #[error("Path already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Not a file: {0}")]
    NotAFile(PathBuf),

    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(PathBuf),

    #[error("Access denied: {0}")]
    AccessDenied(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl FsError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        FsError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::InvalidPath { .. } => ErrorKind::InvalidPath,
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            FsError::NotADirectory(_) => ErrorKind::NotADirectory,
            FsError::NotAFile(_) => ErrorKind::NotAFile,
            FsError::DirectoryNotEmpty(_) => ErrorKind::DirectoryNotEmpty,
            FsError::AccessDenied(_) => ErrorKind::AccessDenied,
            FsError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Maps an OS error onto the taxonomy, keeping the raw error only when no
    /// category fits.
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path),
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists(path),
            io::ErrorKind::PermissionDenied => FsError::AccessDenied(path),
            io::ErrorKind::InvalidInput => FsError::invalid_path(
                path.display().to_string(),
                err.to_string(),
            ),
            _ => FsError::Io { path, source: err },
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        if let FsError::Io { source, .. } = err {
            return source;
        }
        let kind = match err.kind() {
            ErrorKind::InvalidPath => io::ErrorKind::InvalidInput,
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::AlreadyExists => io::ErrorKind::AlreadyExists,
            ErrorKind::AccessDenied => io::ErrorKind::PermissionDenied,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
