use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::fs;
use std::fs::create_dir_all;
use std::path::Path as StdPath;

use async_walkdir::WalkDir;
use futures_lite::StreamExt;
use similar::ChangeTag;
use similar::TextDiff;
use tempdir::TempDir;

use crate::Entry;
use crate::Error;
use crate::FileStat;
use crate::FileType;
use crate::WalkFs;
use crate::Xattr;
use crate::utils::join_path;
use crate::walk_fs::Child;

// Relative paths and whether they are directories. `link -> sub` is added
// separately.
pub(crate) static TEMP_FILES: &[(&str, bool)] =
    &[("a.txt", false), ("sub", true), ("sub/b.txt", false)];

/// A temporary directory tree for walk tests.
///
/// [`TestRoot::new`] builds `a.txt`, `sub/`, `sub/b.txt` and `link -> sub`.
#[derive(Debug)]
pub struct TestRoot {
    /// Root of the temporary test directory.
    pub root: TempDir,
    /// The root as a walk root string.
    pub path: String,
}

impl TestRoot {
    /// Creates a root with the default tree.
    pub fn new() -> Result<Self, Error> {
        let ret = Self::empty()?;
        for (relative_path, is_dir) in TEMP_FILES {
            if *is_dir {
                ret.create_dir(relative_path)?;
            } else {
                ret.create_file(relative_path, relative_path)?;
            }
        }
        ret.symlink("sub", "link")?;
        Ok(ret)
    }

    /// Creates an empty root.
    pub fn empty() -> Result<Self, Error> {
        let root = TempDir::new("pwalk").map_err(|e| Error::Create {
            what: "temporary directory".into(),
            how: e.to_string(),
        })?;
        let path = root.path().to_string_lossy().into_owned();
        Ok(Self { root, path })
    }

    /// The walk path of `relative`.
    pub fn path_of(&self, relative: &str) -> String {
        join_path(&self.path, relative)
    }

    /// Creates a file, and its parents, with `content`.
    pub fn create_file(&self, relative_path: &str, content: &str) -> Result<(), Error> {
        let full_path = self.root.path().join(relative_path);
        if let Some(parent) = full_path.parent() {
            create_dir_all(parent).map_err(|e| create_err(parent, e))?;
        }
        fs::write(&full_path, content).map_err(|e| create_err(&full_path, e))
    }

    /// Creates a directory and its parents.
    pub fn create_dir(&self, relative_path: &str) -> Result<(), Error> {
        let full_path = self.root.path().join(relative_path);
        create_dir_all(&full_path).map_err(|e| create_err(&full_path, e))
    }

    /// Creates a symlink at `relative_path` pointing at `target`, verbatim.
    #[cfg(unix)]
    pub fn symlink(&self, target: &str, relative_path: &str) -> Result<(), Error> {
        let full_path = self.root.path().join(relative_path);
        std::os::unix::fs::symlink(target, &full_path).map_err(|e| create_err(&full_path, e))
    }

    /// Symlinks are only created on unix.
    #[cfg(not(unix))]
    pub fn symlink(&self, _target: &str, relative_path: &str) -> Result<(), Error> {
        Err(Error::Unsupported {
            what: format!("creating symlink {relative_path}"),
        })
    }

    /// Creates `files` files in each of `dirs` directories spread over two
    /// levels.
    pub fn populate(&self, dirs: usize, files: usize) -> Result<(), Error> {
        for d in 0..dirs {
            let dir = if d % 3 == 0 {
                format!("d{d}")
            } else {
                format!("d{}/n{d}", d - d % 3)
            };
            self.create_dir(&dir)?;
            for f in 0..files {
                self.create_file(&format!("{dir}/f{f}.dat"), "x")?;
            }
        }
        Ok(())
    }

    /// Paths of `entries` relative to this root. The root itself maps to "".
    pub fn relative<'a, I>(&self, entries: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        let prefix = format!("{}/", self.path);
        entries
            .into_iter()
            .map(|e| {
                if e.path == self.path {
                    String::new()
                } else {
                    e.path.strip_prefix(&prefix).unwrap_or(&e.path).to_string()
                }
            })
            .collect()
    }

    /// Walks the tree sequentially with `async-walkdir`, without following
    /// symlinks. Returns paths relative to the root, root excluded.
    pub async fn reference_walk(&self) -> Result<BTreeSet<String>, Error> {
        let mut found = BTreeSet::new();
        let mut entries = WalkDir::new(self.root.path());
        loop {
            match entries.next().await {
                Some(Ok(entry)) => {
                    let path = entry.path();
                    let relative = path.strip_prefix(self.root.path()).map_err(|e| Error::Read {
                        what: "strip_prefix".into(),
                        how: e.to_string(),
                    })?;
                    found.insert(relative.to_string_lossy().into_owned());
                }
                Some(Err(e)) => {
                    return Err(Error::Read {
                        what: "reading directory entry".into(),
                        how: e.to_string(),
                    });
                }
                None => break,
            }
        }
        Ok(found)
    }
}

fn create_err(path: &StdPath, e: std::io::Error) -> Error {
    Error::Create {
        what: path.display().to_string(),
        how: e.to_string(),
    }
}

/// Returns none if the two sets are identical, or a line diff otherwise.
pub fn diff_paths(expected: &BTreeSet<String>, actual: &BTreeSet<String>) -> Option<String> {
    let expected = expected.iter().cloned().collect::<Vec<_>>().join("\n") + "\n";
    let actual = actual.iter().cloned().collect::<Vec<_>>().join("\n") + "\n";
    let diff = TextDiff::from_lines(&expected, &actual);
    let mut diffs = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => continue,
        };
        diffs.push_str(&format!("{sign}{change}"));
    }
    if diffs.is_empty() { None } else { Some(diffs) }
}

/// A stat result with the given type and identity and plausible mode bits.
pub fn synthetic_stat(file_type: FileType, dev: u64, ino: u64) -> FileStat {
    let mode = match file_type {
        FileType::Dir => 0o040755,
        FileType::Symlink => 0o120777,
        FileType::Device => 0o020666,
        FileType::Special => 0o010644,
        FileType::File => 0o100644,
    };
    FileStat {
        file_type,
        mode,
        size: 0,
        mtime: "1970-01-01T00:00:00.000Z".into(),
        atime: "1970-01-01T00:00:00.000Z".into(),
        ctime: "1970-01-01T00:00:00.000Z".into(),
        dev,
        rdev: 0,
        ino,
        nlink: 1,
        uid: 0,
        gid: 0,
    }
}

#[derive(Debug, Clone)]
struct MemNode {
    stat: FileStat,
    target: Option<String>,
    unreadable: bool,
    bad_xattrs: bool,
    xattrs: Xattr,
}

/// An in-memory [`WalkFs`]. Paths are plain strings such as `r/sub/b.txt`;
/// symlink targets are full paths in the same namespace.
///
/// Every node gets a fresh inode. Extended attributes are whatever was set
/// with [`MemFs::xattr`] plus a synthesized `user.ino = <inode>`.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    nodes: BTreeMap<String, MemNode>,
    next_ino: u64,
    broken_resolver: bool,
}

impl MemFs {
    /// Creates an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    fn add(mut self, path: &str, file_type: FileType, dev: u64, target: Option<&str>) -> Self {
        self.next_ino += 1;
        self.nodes.insert(
            path.to_string(),
            MemNode {
                stat: synthetic_stat(file_type, dev, self.next_ino),
                target: target.map(|t| t.to_string()),
                unreadable: false,
                bad_xattrs: false,
                xattrs: Xattr::new(),
            },
        );
        self
    }

    /// Adds a directory on device `dev`.
    pub fn dir(self, path: &str, dev: u64) -> Self {
        self.add(path, FileType::Dir, dev, None)
    }

    /// Adds a regular file on device `dev`.
    pub fn file(self, path: &str, dev: u64) -> Self {
        self.add(path, FileType::File, dev, None)
    }

    /// Adds a device node.
    pub fn device(self, path: &str, dev: u64) -> Self {
        self.add(path, FileType::Device, dev, None)
    }

    /// Adds a symlink to `target`.
    pub fn symlink(self, path: &str, target: &str, dev: u64) -> Self {
        self.add(path, FileType::Symlink, dev, Some(target))
    }

    /// Makes listing the directory at `path` fail.
    pub fn unreadable(mut self, path: &str) -> Self {
        if let Some(node) = self.nodes.get_mut(path) {
            node.unreadable = true;
        }
        self
    }

    /// Makes reading the extended attributes of `path` fail.
    pub fn bad_xattrs(mut self, path: &str) -> Self {
        if let Some(node) = self.nodes.get_mut(path) {
            node.bad_xattrs = true;
        }
        self
    }

    /// Sets the extended attribute `name` of the node at `path` itself.
    pub fn xattr(mut self, path: &str, name: &str, value: &str) -> Self {
        if let Some(node) = self.nodes.get_mut(path) {
            node.xattrs.insert(name, value);
        }
        self
    }

    /// Makes `resolve_symlink` hand back the link itself.
    pub fn with_broken_resolver(mut self) -> Self {
        self.broken_resolver = true;
        self
    }

    fn node(&self, path: &str) -> Option<&MemNode> {
        self.nodes.get(path)
    }

    /// Resolves every symlink along `path`.
    fn resolve(&self, path: &str) -> Result<String, Error> {
        let mut hops = 0;
        let mut current = String::new();
        let mut rest: VecDeque<String> = path.split('/').map(String::from).collect();
        while let Some(component) = rest.pop_front() {
            let next = if current.is_empty() {
                component
            } else {
                join_path(&current, &component)
            };
            match self.node(&next) {
                Some(MemNode {
                    target: Some(target),
                    ..
                }) => {
                    hops += 1;
                    if hops > 40 {
                        return Err(Error::Resolve {
                            path: path.to_string(),
                            how: "too many levels of symbolic links".into(),
                        });
                    }
                    let mut restart: VecDeque<String> =
                        target.split('/').map(String::from).collect();
                    restart.extend(rest.drain(..));
                    rest = restart;
                    current = String::new();
                }
                Some(_) => current = next,
                None => {
                    return Err(Error::Resolve {
                        path: path.to_string(),
                        how: format!("{next}: no such file or directory"),
                    });
                }
            }
        }
        Ok(current)
    }

    /// Resolves symlinks in every component but the last.
    fn resolve_parent(&self, path: &str) -> Result<String, Error> {
        match path.rsplit_once('/') {
            Some((parent, name)) => Ok(join_path(&self.resolve(parent)?, name)),
            None => Ok(path.to_string()),
        }
    }
}

impl WalkFs for MemFs {
    async fn stat(&self, path: &str, follow: bool) -> Result<FileStat, Error> {
        let stat_err = |how: String| Error::Stat {
            path: path.to_string(),
            how,
        };
        let resolved = if follow {
            self.resolve(path)
        } else {
            self.resolve_parent(path)
        }
        .map_err(|e| stat_err(e.to_string()))?;
        self.node(&resolved)
            .map(|n| n.stat.clone())
            .ok_or_else(|| stat_err("no such file or directory".into()))
    }

    async fn list_children(&self, path: &str) -> Result<Vec<Child>, Error> {
        let read_err = |how: &str| Error::ReadDir {
            path: path.to_string(),
            how: how.to_string(),
        };
        let dir = self.resolve(path).map_err(|e| read_err(&e.to_string()))?;
        match self.node(&dir) {
            Some(node) if node.unreadable => return Err(read_err("permission denied")),
            Some(node) if node.stat.is_dir() => {}
            Some(_) => return Err(read_err("not a directory")),
            None => return Err(read_err("no such file or directory")),
        }
        let prefix = format!("{dir}/");
        Ok(self
            .nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter_map(|(p, n)| {
                let name = &p[prefix.len()..];
                (!name.contains('/')).then(|| Ok((name.to_string(), n.stat.clone())))
            })
            .collect())
    }

    async fn resolve_symlink(&self, path: &str) -> Result<String, Error> {
        if self.broken_resolver {
            return Ok(path.to_string());
        }
        self.resolve(path)
    }

    async fn get_xattrs(&self, path: &str) -> Result<Xattr, Error> {
        let resolved = self.resolve_parent(path).map_err(|e| Error::Xattr {
            path: path.to_string(),
            how: e.to_string(),
        })?;
        match self.node(&resolved) {
            Some(node) if node.bad_xattrs => Err(Error::Xattr {
                path: path.to_string(),
                how: "operation not permitted".into(),
            }),
            Some(node) => {
                let mut x = node.xattrs.clone();
                x.insert("user.ino", node.stat.ino.to_string());
                Ok(x)
            }
            None => Err(Error::Xattr {
                path: path.to_string(),
                how: "no such file or directory".into(),
            }),
        }
    }
}
