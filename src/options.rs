use std::num::NonZeroUsize;
use std::sync::Arc;

use derivative::Derivative;
use serde::Deserialize;
use serde::Serialize;

use crate::EntryType;
use crate::FileStat;
use crate::filter::EntryFilter;

/// Workers started per available CPU.
pub const PARALLELISM_FACTOR: usize = 2;

/// Work queue slots per worker.
pub const QUEUE_SLOTS_PER_WORKER: usize = 64;

/// Default capacity of the entry stream.
pub const CHANNEL_SIZE: usize = 4096;

/// Controls the behavior of a walk.
///
/// ```
/// use pwalk::{EntryType, WalkOptions};
///
/// let opts = WalkOptions::default()
///     .types(EntryType::FILE | EntryType::SYMLINK)
///     .exclude("*.o")
///     .exclude("target");
/// assert_eq!(opts.excludes, vec!["*.o", "target"]);
/// assert!(!opts.follow_symlinks);
/// ```
#[derive(Derivative, Clone, Serialize, Deserialize)]
#[derivative(Debug)]
#[serde(default)]
pub struct WalkOptions {
    /// Resolve symlinks and report (or descend into) their targets instead
    /// of reporting the links themselves.
    pub follow_symlinks: bool,

    /// Do not descend into directories on a filesystem other than those of
    /// the roots.
    pub one_filesystem: bool,

    /// Which kinds of entries to return. Directories are walked whether or
    /// not they are returned.
    pub types: EntryType,

    /// Shell glob patterns matched against base names. A match drops the
    /// entry and, for directories, its subtree.
    pub excludes: Vec<String>,

    /// Caller predicate; see [`EntryFilter`].
    #[serde(skip)]
    #[derivative(Debug = "ignore")]
    pub entry_filter: Option<EntryFilter>,

    /// Attach extended attributes to every returned entry.
    pub want_xattrs: bool,

    /// Number of worker tasks. Defaults to twice the available parallelism.
    pub workers: Option<NonZeroUsize>,

    /// Capacity of the directory work queue. Defaults to
    /// [`QUEUE_SLOTS_PER_WORKER`] per worker.
    pub queue_capacity: Option<NonZeroUsize>,

    /// Capacity of the entry stream.
    pub channel_size: NonZeroUsize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            one_filesystem: false,
            types: EntryType::ALL,
            excludes: Vec::new(),
            entry_filter: None,
            want_xattrs: false,
            workers: None,
            queue_capacity: None,
            channel_size: NonZeroUsize::new(CHANNEL_SIZE).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl WalkOptions {
    /// Adds an exclude pattern.
    pub fn exclude<S: Into<String>>(mut self, pattern: S) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// Sets the caller predicate.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str, &FileStat) -> bool + Send + Sync + 'static,
    {
        self.entry_filter = Some(Arc::new(predicate));
        self
    }

    /// Sets the type mask.
    pub fn types(mut self, types: EntryType) -> Self {
        self.types = types;
        self
    }

    /// Number of workers this walk starts.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) => n.get(),
            None => {
                let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
                cpus * PARALLELISM_FACTOR
            }
        }
    }

    /// Capacity of the work queue for `workers` workers.
    pub(crate) fn queue_capacity_for(&self, workers: usize) -> usize {
        match self.queue_capacity {
            Some(n) => n.get(),
            None => workers.max(1) * QUEUE_SLOTS_PER_WORKER,
        }
    }
}
