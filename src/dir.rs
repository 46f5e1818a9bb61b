//! Per-directory work: classifying roots, listing a directory and deciding
//! the fate of each child, and resolving symlinks.

use log::debug;
use log::error;

use crate::Error;
use crate::FileStat;
use crate::FileType;
use crate::WalkFs;
use crate::filter::FilterLevel;
use crate::sink::Sink;
use crate::utils::base_name;
use crate::utils::join_path;
use crate::utils::trim_root;
use crate::walker::DirTask;
use crate::walker::Found;
use crate::walker::Walker;

/// Names that exclude patterns never apply to when they name a root.
const ROOT_MARKERS: [&str; 3] = [".", "..", "/"];

/// Outcome of listing one directory.
#[derive(Debug, Default)]
pub(crate) struct Listing {
    /// Non-directory children to return, in name order.
    pub(crate) entries: Vec<Found>,
    /// Children to list next.
    pub(crate) subdirs: Vec<DirTask>,
}

/// What to do with a symlink.
#[derive(Debug)]
pub(crate) enum Resolved {
    /// Return it with this stat. `target` is set when the stat is that of
    /// the resolved target rather than of the link.
    Emit {
        stat: FileStat,
        target: Option<String>,
    },
    /// Walk the directory `target`, which has this stat.
    Descend { stat: FileStat, target: String },
    /// Drop it.
    Skip,
}

impl<F: WalkFs, S: Sink> Walker<F, S> {
    /// Decides what to do with one root. Non-directories are returned right
    /// away; a directory comes back as the first task of its subtree.
    pub(crate) async fn classify_root(&self, root: &str) -> Option<DirTask> {
        let path = trim_root(root).to_string();
        let stat = match self.fs.stat(&path, false).await {
            Ok(stat) => stat,
            Err(e) => {
                self.sink.error(e).await;
                return None;
            }
        };

        let name = base_name(&path);
        let excluded = !ROOT_MARKERS.contains(&name) && self.filter.is_excluded(name);
        if excluded || self.filter.rejects(&path, &stat) {
            debug!("{path}: root filtered out");
            return None;
        }

        match stat.file_type {
            FileType::Dir => {
                if self.one_filesystem {
                    self.tracker.track_filesystem(stat.device());
                }
                if self.tracker.was_seen(stat.identity()) {
                    debug!("{path}: root already walked");
                    return None;
                }
                let emit = self.filter.wants(&stat);
                Some(DirTask {
                    path,
                    stat,
                    target: None,
                    emit,
                })
            }
            FileType::Symlink => match self.resolve_symlink(&path, stat, true).await {
                Ok(Resolved::Emit { stat, target }) => {
                    self.emit(Found { path, stat, target }).await;
                    None
                }
                Ok(Resolved::Descend { stat, target }) => {
                    let emit = self.filter.wants(&stat);
                    Some(DirTask {
                        path,
                        stat,
                        target: Some(target),
                        emit,
                    })
                }
                Ok(Resolved::Skip) => None,
                Err(e) => {
                    self.sink.error(e).await;
                    None
                }
            },
            _ => {
                if self.filter.wants(&stat) {
                    self.emit(Found {
                        path,
                        stat,
                        target: None,
                    })
                    .await;
                }
                None
            }
        }
    }

    /// Lists `path` and sorts its children into entries to return and
    /// directories to walk. Problems with single children are reported and
    /// do not fail the listing.
    pub(crate) async fn process_directory(&self, path: &str) -> Result<Listing, Error> {
        let mut children = Vec::new();
        for child in self.fs.list_children(path).await? {
            match child {
                Ok(child) => children.push(child),
                Err(e) => self.sink.error(e).await,
            }
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));

        let mut listing = Listing::default();
        for (name, stat) in children {
            let child = join_path(path, &name);

            if stat.is_symlink() {
                if self.filter.is_suppressed(&name, &child, &stat) {
                    continue;
                }
                match self.resolve_symlink(&child, stat, false).await {
                    Ok(Resolved::Emit { stat, target }) => listing.entries.push(Found {
                        path: child,
                        stat,
                        target,
                    }),
                    Ok(Resolved::Descend { stat, target }) => {
                        let emit = self.filter.wants(&stat);
                        listing.subdirs.push(DirTask {
                            path: child,
                            stat,
                            target: Some(target),
                            emit,
                        });
                    }
                    Ok(Resolved::Skip) => {}
                    Err(e) => self.sink.error(e).await,
                }
                continue;
            }

            let level = self.filter.level(&name, &child, &stat);
            if level == FilterLevel::Deny {
                continue;
            }
            if stat.is_dir() {
                if self.crosses_mount(&stat) {
                    debug!("{child}: on another filesystem, not descending");
                    continue;
                }
                listing.subdirs.push(DirTask {
                    path: child,
                    stat,
                    target: None,
                    emit: level == FilterLevel::Allow,
                });
            } else {
                listing.entries.push(Found {
                    path: child,
                    stat,
                    target: None,
                });
            }
        }
        Ok(listing)
    }

    /// Decides what to do with the symlink at `path`.
    ///
    /// Without `follow_symlinks` the link itself is returned. Otherwise it is
    /// resolved and its target takes its place; a target already reached
    /// through another root or link is dropped, which is what ends cycles.
    pub(crate) async fn resolve_symlink(
        &self,
        path: &str,
        link_stat: FileStat,
        is_root: bool,
    ) -> Result<Resolved, Error> {
        if !self.follow_symlinks {
            return Ok(if self.filter.wants(&link_stat) {
                Resolved::Emit {
                    stat: link_stat,
                    target: None,
                }
            } else {
                Resolved::Skip
            });
        }

        let target = self.fs.resolve_symlink(path).await?;
        let stat = self.fs.stat(&target, false).await.map_err(|e| Error::Resolve {
            path: path.to_string(),
            how: e.to_string(),
        })?;
        if stat.is_symlink() {
            error!("{path}: resolved to {target}, which is still a symlink");
            return Err(Error::ResolvedToSymlink {
                path: path.to_string(),
                target,
            });
        }

        if self.tracker.was_seen(stat.identity()) {
            debug!("{path}: {target} already reached, skipping");
            return Ok(Resolved::Skip);
        }
        if !stat.is_dir() {
            return Ok(if self.filter.wants(&stat) {
                Resolved::Emit {
                    stat,
                    target: Some(target),
                }
            } else {
                Resolved::Skip
            });
        }

        if is_root {
            if self.one_filesystem {
                self.tracker.track_filesystem(stat.device());
            }
        } else if self.crosses_mount(&stat) {
            debug!("{path}: {target} is on another filesystem, not descending");
            return Ok(Resolved::Skip);
        }
        Ok(Resolved::Descend { stat, target })
    }

    /// True if `one_filesystem` is set and `stat` lives on none of the roots'
    /// filesystems.
    pub(crate) fn crosses_mount(&self, stat: &FileStat) -> bool {
        self.one_filesystem && !self.tracker.is_on_tracked_filesystem(stat.device())
    }
}
