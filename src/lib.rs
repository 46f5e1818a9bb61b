//! A concurrent filesystem tree walker.
//!
//! Given one or more roots, `pwalk` lists every directory below them with a
//! pool of worker tasks and returns each entry with its full stat. It can
//! follow symlinks (without looping), stay on the roots' filesystems, skip
//! subtrees by shell glob or predicate, restrict what it returns by type and
//! attach extended attributes.
//!
//! There are two ways to consume a walk: as streams,
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use pwalk::{EntryType, WalkOptions, walk};
//!
//! let options = WalkOptions::default()
//!     .types(EntryType::FILE)
//!     .exclude("target")
//!     .exclude(".git");
//! let (entries, errors) = walk(&["./src"], options);
//! let mut rust_files = 0;
//! while let Ok(entry) = entries.recv().await {
//!     assert!(entry.path.starts_with("./src/"));
//!     rust_files += entry.path.ends_with(".rs") as usize;
//! }
//! assert!(rust_files > 0);
//! assert!(errors.recv().await.is_err());
//! # })
//! ```
//!
//! or through a callback that runs on the worker tasks:
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use pwalk::{WalkOptions, walk_apply};
//!
//! let count = Arc::new(AtomicUsize::new(0));
//! let counter = count.clone();
//! let errors = walk_apply(&["./src"], WalkOptions::default(), move |_entry| {
//!     counter.fetch_add(1, Ordering::Relaxed);
//!     Ok(())
//! })
//! .await;
//! assert!(errors.is_empty());
//! assert!(count.load(Ordering::Relaxed) > 1);
//! # })
//! ```
//!
//! Entries come out in no particular order. Paths are the root string joined
//! with child names and are never cleaned: the root `"."` yields `"./a"`.
//!
//! A walk can't be cancelled. Dropping the entry stream makes every further
//! delivery a no-op and the walk runs out quickly; keeping the stream without
//! reading it stalls the workers once the channel and the work queue fill.

mod dir;
mod errors;
mod file;
mod filter;
mod identity;
mod native;
mod options;
mod sink;
pub mod utils;
mod walk_fs;
mod walker;
mod xattr;

use std::sync::Arc;

pub use errors::Error;
pub use file::Entry;
pub use file::EntryType;
pub use file::FileStat;
pub use file::FileType;
pub use filter::EntryFilter;
pub use identity::DeviceKey;
pub use identity::IdentityKey;
pub use native::NativeFs;
pub use options::CHANNEL_SIZE;
pub use options::PARALLELISM_FACTOR;
pub use options::QUEUE_SLOTS_PER_WORKER;
pub use options::WalkOptions;
pub use sink::EntryStream;
pub use sink::ErrorStream;
pub use walk_fs::Child;
pub use walk_fs::WalkFs;
pub use xattr::Xattr;
pub use xattr::del_xattr;
pub use xattr::get_xattr;
pub use xattr::set_xattr;

use crate::sink::ApplySink;
use crate::sink::ChannelSink;

#[cfg(any(test, feature = "test_utils"))]
pub(crate) mod test_utils;
#[cfg(feature = "test_utils")]
pub use test_utils::MemFs;
#[cfg(feature = "test_utils")]
pub use test_utils::TestRoot;

/// Walks `roots` on the local filesystem. See [`walk_with`].
pub fn walk<R: AsRef<str>>(roots: &[R], options: WalkOptions) -> (EntryStream, ErrorStream) {
    walk_with(NativeFs::new(), roots, options)
}

/// Walks `roots` on `fs`, returning streams of entries and errors.
///
/// The walk runs on a spawned task, so this must be called from within a
/// tokio runtime. Both streams end once the walk is complete. The entry
/// stream holds at most [`WalkOptions::channel_size`] entries before the
/// workers wait for the reader; the error stream is unbounded, so it can be
/// read after the entries.
///
/// A root is skipped when the same directory was already given as a root,
/// for example `["r", "r/"]`. Roots that overlap without being the same
/// directory are each walked in full: `["r", "r/sub"]` returns everything
/// under `r/sub` twice.
pub fn walk_with<F, R>(fs: F, roots: &[R], options: WalkOptions) -> (EntryStream, ErrorStream)
where
    F: WalkFs,
    R: AsRef<str>,
{
    let (sink, entries, errors) = ChannelSink::create(options.channel_size.get());
    let roots: Vec<String> = roots.iter().map(|r| r.as_ref().to_string()).collect();
    tokio::spawn(async move { walker::run(fs, roots.as_slice(), options, sink).await });
    (entries, errors)
}

/// Walks `roots` on the local filesystem. See [`walk_apply_with`].
pub async fn walk_apply<R, A>(roots: &[R], options: WalkOptions, apply: A) -> Vec<Error>
where
    R: AsRef<str>,
    A: Fn(Entry) -> Result<(), Error> + Send + Sync + 'static,
{
    walk_apply_with(NativeFs::new(), roots, options, apply).await
}

/// Walks `roots` on `fs`, calling `apply` on every entry.
///
/// `apply` runs on the worker tasks, concurrently and in no particular order.
/// Returns every error the walk ran into, including those `apply` returned,
/// once the walk and all calls to `apply` have finished.
pub async fn walk_apply_with<F, R, A>(
    fs: F,
    roots: &[R],
    options: WalkOptions,
    apply: A,
) -> Vec<Error>
where
    F: WalkFs,
    R: AsRef<str>,
    A: Fn(Entry) -> Result<(), Error> + Send + Sync + 'static,
{
    let (sink, errors) = ApplySink::new(apply);
    walker::run(fs, roots, options, sink).await;
    take_errors(&errors)
}

fn take_errors(errors: &Arc<std::sync::Mutex<Vec<Error>>>) -> Vec<Error> {
    match errors.lock() {
        Ok(mut errors) => std::mem::take(&mut *errors),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    }
}
