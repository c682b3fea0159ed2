//! Error types shared by the tree, the dispatcher and the remote collaborators

use libc::c_int;
use thiserror::Error;

/// Failure reported by the resource catalog or the message transport.
///
/// Collaborator implementations classify their native errors into these
/// variants once; nothing above them inspects service-specific payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("resource already exists: {0}")]
    AlreadyExists(String),
    #[error("throttled: {0}")]
    Throttled(String),
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
    #[error("service failure: {0}")]
    Service(String),
}

/// POSIX-facing error taxonomy of the virtual filesystem.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("file exists")]
    AlreadyExists,
    #[error("no space left")]
    NoSpace,
    #[error("permission denied")]
    PermissionDenied,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("resource busy")]
    Busy,
    #[error("no such device")]
    NoSuchDevice,
    #[error("input/output error")]
    Io,
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// Positive errno value handed to the filesystem driver.
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NoSpace => libc::ENOSPC,
            FsError::PermissionDenied => libc::EACCES,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::Busy => libc::EBUSY,
            FsError::NoSuchDevice => libc::ENODEV,
            FsError::Io => libc::EIO,
        }
    }
}

impl From<RemoteError> for FsError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(_) => FsError::NoSuchDevice,
            RemoteError::Unauthorized(_) => FsError::PermissionDenied,
            RemoteError::InvalidRequest(_) => FsError::InvalidArgument,
            RemoteError::Conflict(_) | RemoteError::Throttled(_) => FsError::Busy,
            RemoteError::AlreadyExists(_) => FsError::AlreadyExists,
            RemoteError::Unsupported(_) | RemoteError::Service(_) => FsError::Io,
        }
    }
}
