use std::fs::Metadata;

use crate::FileStat;
use crate::FileType;

impl FileType {
    /// Classifies a `std::fs::FileType`. Anything that is not a directory,
    /// symlink, device, fifo or socket is a `File`.
    pub fn from_std(ft: std::fs::FileType) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            if ft.is_block_device() || ft.is_char_device() {
                return FileType::Device;
            }
            if ft.is_fifo() || ft.is_socket() {
                return FileType::Special;
            }
        }
        if ft.is_dir() {
            FileType::Dir
        } else if ft.is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        }
    }
}

impl FileStat {
    /// Create a `FileStat` from a `Metadata` value.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        use crate::utils::format_unix_time;

        FileStat {
            file_type: FileType::from_std(metadata.file_type()),
            mode: metadata.mode(),
            size: metadata.size(),
            mtime: format_unix_time(metadata.mtime(), metadata.mtime_nsec()),
            atime: format_unix_time(metadata.atime(), metadata.atime_nsec()),
            ctime: format_unix_time(metadata.ctime(), metadata.ctime_nsec()),
            dev: metadata.dev(),
            rdev: metadata.rdev(),
            ino: metadata.ino(),
            nlink: metadata.nlink(),
            uid: metadata.uid(),
            gid: metadata.gid(),
        }
    }

    /// Create a `FileStat` from a `Metadata` value.
    ///
    /// Identity fields are zero on this platform, so symlink-loop and
    /// mount-point detection degrade to "never seen" and "same filesystem".
    #[cfg(not(unix))]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        use std::time::SystemTime;

        use crate::utils::format_system_time;

        let time = |t: std::io::Result<SystemTime>| {
            format_system_time(t.unwrap_or(SystemTime::UNIX_EPOCH))
        };
        FileStat {
            file_type: FileType::from_std(metadata.file_type()),
            mode: if metadata.permissions().readonly() { 0o444 } else { 0o644 },
            size: metadata.len(),
            mtime: time(metadata.modified()),
            atime: time(metadata.accessed()),
            ctime: time(metadata.created()),
            dev: 0,
            rdev: 0,
            ino: 0,
            nlink: 1,
            uid: 0,
            gid: 0,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::utils::format_system_time;

    #[test]
    fn classifies_file_dir_and_symlink() {
        let root = TempDir::new("file").unwrap();
        let f = root.path().join("f");
        std::fs::write(&f, "hello").unwrap();
        let l = root.path().join("l");
        std::os::unix::fs::symlink(&f, &l).unwrap();

        let st = FileStat::from_metadata(&std::fs::symlink_metadata(&f).unwrap());
        assert_eq!(st.file_type, FileType::File);
        assert_eq!(st.size, 5);
        assert_eq!(
            st.mtime,
            format_system_time(std::fs::metadata(&f).unwrap().modified().unwrap())
        );

        let st = FileStat::from_metadata(&std::fs::symlink_metadata(&l).unwrap());
        assert_eq!(st.file_type, FileType::Symlink);

        let st = FileStat::from_metadata(&std::fs::symlink_metadata(root.path()).unwrap());
        assert!(st.is_dir());
        assert_ne!(st.ino, 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn dev_null_is_a_device() {
        let st = FileStat::from_metadata(&std::fs::symlink_metadata("/dev/null").unwrap());
        assert_eq!(st.file_type, FileType::Device);
        assert_ne!(st.rdev, 0);
    }
}
