mod file;
pub(crate) mod xattr;

use std::io;

use futures_lite::StreamExt;

use crate::Error;
use crate::FileStat;
use crate::WalkFs;
use crate::Xattr;
use crate::walk_fs::Child;

/// [`WalkFs`] backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFs;

impl NativeFs {
    /// Creates the native filesystem.
    pub fn new() -> Self {
        NativeFs
    }
}

impl WalkFs for NativeFs {
    async fn stat(&self, path: &str, follow: bool) -> Result<FileStat, Error> {
        let metadata = if follow {
            tokio::fs::metadata(path).await
        } else {
            tokio::fs::symlink_metadata(path).await
        };
        metadata
            .map(|m| FileStat::from_metadata(&m))
            .map_err(|e| Error::Stat {
                path: path.to_string(),
                how: e.to_string(),
            })
    }

    async fn list_children(&self, path: &str) -> Result<Vec<Child>, Error> {
        let read_err = |e: io::Error| Error::ReadDir {
            path: path.to_string(),
            how: e.to_string(),
        };
        let mut entries = async_fs::read_dir(path).await.map_err(read_err)?;

        let mut children = Vec::new();
        while let Some(entry) = entries.next().await {
            let entry = entry.map_err(read_err)?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    children.push(Err(Error::InvalidName {
                        parent: path.to_string(),
                        name: raw.to_string_lossy().into_owned(),
                    }));
                    continue;
                }
            };
            match entry.metadata().await {
                Ok(metadata) => children.push(Ok((name, FileStat::from_metadata(&metadata)))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("{path}/{name}: vanished while listing");
                }
                Err(e) => {
                    return Err(Error::Stat {
                        path: format!("{path}/{name}"),
                        how: e.to_string(),
                    });
                }
            }
        }
        Ok(children)
    }

    async fn resolve_symlink(&self, path: &str) -> Result<String, Error> {
        let target = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| Error::Resolve {
                path: path.to_string(),
                how: e.to_string(),
            })?;
        target.into_os_string().into_string().map_err(|t| Error::Resolve {
            path: path.to_string(),
            how: format!("target is not valid UTF-8: {}", t.to_string_lossy()),
        })
    }

    async fn get_xattrs(&self, path: &str) -> Result<Xattr, Error> {
        let owned = path.to_string();
        tokio::task::spawn_blocking(move || xattr::get(&owned))
            .await
            .map_err(|e| Error::Read {
                what: format!("xattrs of {path}"),
                how: e.to_string(),
            })?
    }
}
