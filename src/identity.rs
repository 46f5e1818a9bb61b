use dashmap::DashSet;
use serde::Deserialize;
use serde::Serialize;

/// Identifies one underlying filesystem object. Hard links and a symlink's
/// resolved target share the key of the object they point at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Hash, Eq, PartialOrd, Ord)]
pub struct IdentityKey {
    /// Device holding the object.
    pub dev: u64,
    /// Device the object represents (device nodes only).
    pub rdev: u64,
    /// Inode number.
    pub ino: u64,
}

/// Identifies a filesystem, used for mount-boundary checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Hash, Eq, PartialOrd, Ord)]
pub struct DeviceKey {
    /// Device id.
    pub dev: u64,
    /// Raw device id.
    pub rdev: u64,
}

/// Per-walk record of seen objects and of the filesystems the roots live on.
///
/// Both sets are sharded; callers never need an outer lock.
#[derive(Debug, Default)]
pub(crate) struct IdentityTracker {
    seen: DashSet<IdentityKey>,
    filesystems: DashSet<DeviceKey>,
}

impl IdentityTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Atomically checks and records `key`. Only the first caller for a given
    /// key gets `false`.
    pub(crate) fn was_seen(&self, key: IdentityKey) -> bool {
        !self.seen.insert(key)
    }

    /// Registers the filesystem of a root. Only called before any directory is
    /// queued.
    pub(crate) fn track_filesystem(&self, key: DeviceKey) {
        self.filesystems.insert(key);
    }

    pub(crate) fn is_on_tracked_filesystem(&self, key: DeviceKey) -> bool {
        self.filesystems.contains(&key)
    }
}
