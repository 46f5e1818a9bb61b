use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Represents all possible errors reported by a walk.
///
/// None of these stop a traversal. Each one describes a path (or a pattern)
/// whose subtree or entry was left out of the results.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Hash, Eq)]
pub enum Error {
    /// Failed to stat a path.
    #[error("stat {path}: {how}")]
    Stat {
        /// The path that could not be stat'ed.
        path: String,
        /// The reason for the failure.
        how: String,
    },

    /// Failed to open or list a directory.
    #[error("readdir {path}: {how}")]
    ReadDir {
        /// The directory that could not be read.
        path: String,
        /// The reason for the failure.
        how: String,
    },

    /// Failed to resolve a symlink to its target.
    #[error("resolve symlink {path}: {how}")]
    Resolve {
        /// The symlink that could not be resolved.
        path: String,
        /// The reason for the failure.
        how: String,
    },

    /// A directory holds a child whose name is not valid UTF-8. The child is
    /// left out.
    #[error("{parent}: child {name:?} has a name that is not valid UTF-8")]
    InvalidName {
        /// The directory being listed.
        parent: String,
        /// The name with invalid sequences replaced by U+FFFD.
        name: String,
    },

    /// The resolution primitive handed back a path that is still a symlink.
    ///
    /// This means the platform primitive is broken; only the branch rooted
    /// at `path` is abandoned.
    #[error("symlink {path} resolved to another symlink {target}")]
    ResolvedToSymlink {
        /// The symlink being resolved.
        path: String,
        /// What the resolver returned.
        target: String,
    },

    /// An exclude pattern could not be compiled.
    #[error("bad exclude pattern {pattern:?}: {how}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// The reason for the failure.
        how: String,
    },

    /// Failed to read, write or delete extended attributes.
    #[error("xattr {path}: {how}")]
    Xattr {
        /// The path whose attributes were accessed.
        path: String,
        /// The reason for the failure.
        how: String,
    },

    /// The operation is not supported on this platform.
    #[error("{what}: unsupported on this platform")]
    Unsupported {
        /// The unsupported operation.
        what: String,
    },

    /// Error indicating an invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Error indicating a failure to read data.
    #[error("Failed to read {what}: {how}")]
    Read {
        /// The item that failed to be read.
        what: String,
        /// The reason for the failure.
        how: String,
    },

    /// Error indicating a failure to create a file or directory.
    #[error("Failed to create {what}: {how}")]
    Create {
        /// The item that failed to be created.
        what: String,
        /// The reason for the failure.
        how: String,
    },

    /// An error returned by a caller-supplied callback.
    #[error("{path}: {how}")]
    Callback {
        /// Path of the entry the callback was invoked with.
        path: String,
        /// The reason for the failure.
        how: String,
    },
}

impl Error {
    /// Returns the filesystem path this error is about, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Stat { path, .. }
            | Error::ReadDir { path, .. }
            | Error::Resolve { path, .. }
            | Error::ResolvedToSymlink { path, .. }
            | Error::Xattr { path, .. }
            | Error::Callback { path, .. } => Some(path),
            Error::InvalidName { parent, .. } => Some(parent),
            Error::Pattern { .. }
            | Error::Unsupported { .. }
            | Error::InvalidArgument(_)
            | Error::Read { .. }
            | Error::Create { .. } => None,
        }
    }
}
