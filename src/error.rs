//! Error types for patch and container operations

use std::io;
use thiserror::Error;

/// Result type alias for patching operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for patching operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input or output file could not be opened
    #[error("Failed to open {0}")]
    OpenFailed(String),

    /// Container header or records fail bounds or magic checks
    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    /// Container absent and creation was not permitted
    #[error("Missing container: {0}")]
    MissingContainer(String),

    /// Patch archive has a wrong magic or is truncated
    #[error("Corrupt patch archive: {0}")]
    CorruptPatch(String),

    /// Parsing succeeded structurally but produced zero usable entries
    #[error("Patch archive contains no usable entries")]
    NoEntries,

    /// Zlib inflation failed
    #[error("Corrupt zlib stream: {0}")]
    CorruptStream(String),

    /// Filesystem or container write failed
    #[error("Write failed: {0}")]
    WriteFailed(String),
}

impl Error {
    /// Create a new OpenFailed error
    pub fn open_failed<S: Into<String>>(msg: S) -> Self {
        Error::OpenFailed(msg.into())
    }

    /// Create a new CorruptContainer error
    pub fn corrupt_container<S: Into<String>>(msg: S) -> Self {
        Error::CorruptContainer(msg.into())
    }

    /// Create a new MissingContainer error
    pub fn missing_container<S: Into<String>>(msg: S) -> Self {
        Error::MissingContainer(msg.into())
    }

    /// Create a new CorruptPatch error
    pub fn corrupt_patch<S: Into<String>>(msg: S) -> Self {
        Error::CorruptPatch(msg.into())
    }

    /// Create a new CorruptStream error
    pub fn corrupt_stream<S: Into<String>>(msg: S) -> Self {
        Error::CorruptStream(msg.into())
    }

    /// Create a new WriteFailed error
    pub fn write_failed<S: Into<String>>(msg: S) -> Self {
        Error::WriteFailed(msg.into())
    }

    /// Check if this error indicates corrupted input data
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CorruptContainer(_) | Error::CorruptPatch(_) | Error::CorruptStream(_)
        )
    }
}
