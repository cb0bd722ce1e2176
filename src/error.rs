//! Error taxonomy shared by the normalizer, the enumerator and the tree engine.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[cfg(windows)]
const ERROR_PATH_NOT_FOUND: i32 = 3;
#[cfg(windows)]
const ERROR_DIR_NOT_EMPTY: i32 = 145;

pub type Result<T, E = FsError> = std::result::Result<T, E>;

/// Coarse classification of an [`FsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPath,
    NotFound,
    AccessDenied,
    DirectoryNotEmpty,
    AlreadyExists,
    CrossVolumeNotSupported,
    Unexpected,
}

/// Failure of a path, enumeration or tree operation.
///
/// Every variant carries the path the failure was observed on.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("file not found: '{}'", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("path not found: '{}'", .path.display())]
    PathNotFound { path: PathBuf },

    #[error("access denied: '{}'", .path.display())]
    AccessDenied { path: PathBuf },

    #[error("directory is not empty: '{}'", .path.display())]
    DirectoryNotEmpty { path: PathBuf },

    #[error("already exists: '{}'", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error(
        "cannot move across volumes without copy fallback: '{}' -> '{}'",
        .source_path.display(),
        .destination.display()
    )]
    CrossVolumeNotSupported {
        source_path: PathBuf,
        destination: PathBuf,
    },

    #[error("unexpected I/O error on '{}': {source}", .path.display())]
    Unexpected {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn file_not_found(path: impl AsRef<Path>) -> Self {
        Self::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path_not_found(path: impl AsRef<Path>) -> Self {
        Self::PathNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn access_denied(path: impl AsRef<Path>) -> Self {
        Self::AccessDenied {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn directory_not_empty(path: impl AsRef<Path>) -> Self {
        Self::DirectoryNotEmpty {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn already_exists(path: impl AsRef<Path>) -> Self {
        Self::AlreadyExists {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Classify a host I/O error observed on `path`.
    pub fn from_io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();

        #[cfg(windows)]
        match source.raw_os_error() {
            Some(ERROR_PATH_NOT_FOUND) => return Self::PathNotFound { path },
            Some(ERROR_DIR_NOT_EMPTY) => return Self::DirectoryNotEmpty { path },
            _ => {}
        }

        match source.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound { path },
            io::ErrorKind::NotADirectory => Self::PathNotFound { path },
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                Self::AccessDenied { path }
            }
            io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            io::ErrorKind::DirectoryNotEmpty => Self::DirectoryNotEmpty { path },
            _ => Self::Unexpected { path, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::FileNotFound { .. } | Self::PathNotFound { .. } => ErrorKind::NotFound,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::DirectoryNotEmpty { .. } => ErrorKind::DirectoryNotEmpty,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::CrossVolumeNotSupported { .. } => ErrorKind::CrossVolumeNotSupported,
            Self::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Path the error is attached to. For cross-volume failures this is the source.
    pub fn path(&self) -> &Path {
        match self {
            Self::InvalidPath { path, .. } => Path::new(path.as_str()),
            Self::FileNotFound { path }
            | Self::PathNotFound { path }
            | Self::AccessDenied { path }
            | Self::DirectoryNotEmpty { path }
            | Self::AlreadyExists { path }
            | Self::Unexpected { path, .. } => path,
            Self::CrossVolumeNotSupported { source_path, .. } => source_path,
        }
    }
}
