use std::fmt;
use std::ops::BitOr;
use std::ops::BitOrAssign;
use std::time::SystemTime;

#[cfg(feature = "json_schema")]
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::errors::Error;
use crate::identity::DeviceKey;
use crate::identity::IdentityKey;
use crate::utils::parse_system_time;
use crate::xattr::Xattr;

/// Classification of a single stat result.
#[cfg_attr(feature = "json_schema", derive(JsonSchema))]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Hash, Eq)]
pub enum FileType {
    /// A directory.
    Dir,
    /// A symbolic link, not resolved.
    Symlink,
    /// A block or character device.
    Device,
    /// A fifo or a socket.
    Special,
    /// Anything else. Regular files end up here because there is no
    /// portable "is regular" bit to test for.
    File,
}

impl FileType {
    /// The mask bit this type is matched against.
    pub fn entry_type(self) -> EntryType {
        match self {
            FileType::Dir => EntryType::DIR,
            FileType::Symlink => EntryType::SYMLINK,
            FileType::Device => EntryType::DEVICE,
            FileType::Special => EntryType::SPECIAL,
            FileType::File => EntryType::FILE,
        }
    }
}

/// Bit mask selecting which kinds of entries a walk returns.
///
/// ```
/// use pwalk::EntryType;
///
/// let mask = EntryType::FILE | EntryType::SYMLINK;
/// assert!(mask.contains(EntryType::FILE));
/// assert!(!mask.contains(EntryType::DIR));
/// assert!(EntryType::ALL.contains(mask));
/// ```
#[cfg_attr(feature = "json_schema", derive(JsonSchema))]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Hash, Eq)]
#[serde(transparent)]
pub struct EntryType(u8);

impl EntryType {
    /// Matches nothing.
    pub const NONE: EntryType = EntryType(0);
    /// Regular files.
    pub const FILE: EntryType = EntryType(1 << 0);
    /// Directories.
    pub const DIR: EntryType = EntryType(1 << 1);
    /// Symlinks, reported as-is.
    pub const SYMLINK: EntryType = EntryType(1 << 2);
    /// Block and character devices.
    pub const DEVICE: EntryType = EntryType(1 << 3);
    /// Fifos and sockets.
    pub const SPECIAL: EntryType = EntryType(1 << 4);
    /// Everything above.
    pub const ALL: EntryType = EntryType(0b1_1111);

    /// Returns true if every bit of `other` is set in `self`.
    pub fn contains(self, other: EntryType) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if entries of type `ft` are selected by this mask.
    pub fn wants(self, ft: FileType) -> bool {
        self.contains(ft.entry_type())
    }
}

impl Default for EntryType {
    fn default() -> Self {
        EntryType::ALL
    }
}

impl BitOr for EntryType {
    type Output = EntryType;

    fn bitor(self, rhs: EntryType) -> EntryType {
        EntryType(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntryType {
    fn bitor_assign(&mut self, rhs: EntryType) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(EntryType, &str); 5] = [
            (EntryType::FILE, "FILE"),
            (EntryType::DIR, "DIR"),
            (EntryType::SYMLINK, "SYMLINK"),
            (EntryType::DEVICE, "DEVICE"),
            (EntryType::SPECIAL, "SPECIAL"),
        ];
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Represents the metadata of a filesystem object as returned by stat(2).
#[cfg_attr(feature = "json_schema", derive(JsonSchema))]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Hash, Eq)]
pub struct FileStat {
    /// What kind of object this is.
    pub file_type: FileType,
    /// Raw mode bits, including the type bits on unix.
    pub mode: u32,
    /// The size in bytes. For directories, this is implementation-defined.
    pub size: u64,
    /// The last modification time in RFC 3339 - Z format.
    /// For example "2018-01-26T18:30:09.453Z"
    pub mtime: String,
    /// The last access time in RFC 3339 - Z format.
    pub atime: String,
    /// The last status change time in RFC 3339 - Z format.
    pub ctime: String,
    /// Id of the device holding this object.
    pub dev: u64,
    /// Device id this object represents, for device nodes.
    pub rdev: u64,
    /// Inode number.
    pub ino: u64,
    /// Number of hard links.
    pub nlink: u64,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
}

impl FileStat {
    /// Returns true for directories.
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Dir
    }

    /// Returns true for unresolved symlinks.
    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::Symlink
    }

    /// The identity of the underlying object.
    pub fn identity(&self) -> IdentityKey {
        IdentityKey {
            dev: self.dev,
            rdev: self.rdev,
            ino: self.ino,
        }
    }

    /// The device this object lives on.
    pub fn device(&self) -> DeviceKey {
        DeviceKey {
            dev: self.dev,
            rdev: self.rdev,
        }
    }

    /// Parses `mtime` back into a `SystemTime`.
    pub fn modified(&self) -> Result<SystemTime, Error> {
        parse_system_time(&self.mtime)
    }
}

/// A filesystem object discovered by a walk.
#[cfg_attr(feature = "json_schema", derive(JsonSchema))]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    /// Path of the object, starting with the root it was found under.
    pub path: String,
    /// lstat(2) of the object, or stat(2) of the target for followed
    /// symlinks.
    pub stat: FileStat,
    /// Extended attributes. Only present when they were asked for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xattrs: Option<Xattr>,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_utils::synthetic_stat;

    #[test]
    fn file_types_map_to_mask_bits() {
        assert!(EntryType::FILE.wants(FileType::File));
        assert!(!EntryType::FILE.wants(FileType::Dir));
        assert!(EntryType::ALL.wants(FileType::Device));
        assert!(!(EntryType::DIR | EntryType::SYMLINK).wants(FileType::Special));
        assert!(EntryType::NONE.is_empty());
        assert!(!EntryType::NONE.wants(FileType::File));
    }

    #[test]
    fn mask_or_assign_and_debug() {
        let mut mask = EntryType::NONE;
        assert_eq!(format!("{mask:?}"), "NONE");
        mask |= EntryType::DIR;
        mask |= EntryType::DEVICE;
        assert_eq!(format!("{mask:?}"), "DIR | DEVICE");
        assert_eq!(EntryType::default(), EntryType::ALL);
    }

    #[test]
    fn mask_serializes_as_number() {
        let mask = EntryType::FILE | EntryType::DIR;
        assert_eq!(serde_json::to_string(&mask).unwrap(), "3");
        let back: EntryType = serde_json::from_str("3").unwrap();
        assert_eq!(back, mask);
    }

    #[test]
    fn modified_parses_mtime() {
        let mut stat = synthetic_stat(FileType::File, 1, 2);
        assert_eq!(stat.modified().unwrap(), SystemTime::UNIX_EPOCH);

        stat.mtime = "2018-01-26T18:30:09.453Z".into();
        let expected = SystemTime::UNIX_EPOCH + Duration::from_millis(1_516_991_409_453);
        assert_eq!(stat.modified().unwrap(), expected);

        stat.mtime = "yesterday".into();
        assert!(matches!(stat.modified(), Err(Error::InvalidArgument(_))));
    }
}
