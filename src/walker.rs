//! Work scheduler.
//!
//! A fixed pool of worker tasks pulls directories from a bounded queue. Each
//! directory is listed by exactly one worker; its subdirectories go back on
//! the queue. There is no coordinator: a [`PendingCount`] tracks directories
//! that were queued but not finished, and a watcher task closes the sink
//! once it drops to zero.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_channel::Receiver;
use async_channel::Sender;
use log::debug;
use log::error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::Entry;
use crate::Error;
use crate::FileStat;
use crate::WalkFs;
use crate::WalkOptions;
use crate::filter::FilterSet;
use crate::identity::IdentityTracker;
use crate::sink::Sink;

/// An entry ready to be returned.
#[derive(Debug)]
pub(crate) struct Found {
    pub(crate) path: String,
    pub(crate) stat: FileStat,
    /// Resolved target of a followed symlink. `stat` describes it, and its
    /// extended attributes are read from it.
    pub(crate) target: Option<String>,
}

/// A directory waiting to be listed.
#[derive(Debug)]
pub(crate) struct DirTask {
    pub(crate) path: String,
    pub(crate) stat: FileStat,
    /// Set when `path` is a followed symlink; see [`Found::target`].
    pub(crate) target: Option<String>,
    /// Whether the directory itself is returned.
    pub(crate) emit: bool,
}

/// Directories handed to the queue and not fully processed yet.
///
/// A directory is done once its listing was read, its entries delivered and
/// its subdirectories counted. Subdirectories are always counted before their
/// parent is marked done, so zero is only ever reached once.
#[derive(Debug, Default)]
pub(crate) struct PendingCount {
    count: AtomicUsize,
    zero: Notify,
}

impl PendingCount {
    pub(crate) fn add(&self, n: usize) {
        self.count.fetch_add(n, Ordering::SeqCst);
    }

    pub(crate) fn done(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.zero.notify_waiters();
        }
    }

    pub(crate) fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Resolves once the count is zero.
    pub(crate) async fn wait_zero(&self) {
        loop {
            let mut notified = pin!(self.zero.notified());
            // Registered before the check, so a concurrent done() can't be missed.
            notified.as_mut().enable();
            if self.get() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// State shared by the workers of one walk.
pub(crate) struct Walker<F, S> {
    pub(crate) fs: F,
    pub(crate) filter: FilterSet,
    pub(crate) tracker: IdentityTracker,
    pub(crate) follow_symlinks: bool,
    pub(crate) one_filesystem: bool,
    pub(crate) want_xattrs: bool,
    pub(crate) sink: S,
    pending: Arc<PendingCount>,
    queue: Sender<DirTask>,
}

impl<F: WalkFs, S: Sink> Walker<F, S> {
    /// Compiles `options` into walk state feeding `queue`. Exclude patterns
    /// that fail to compile come back as errors.
    pub(crate) fn new(
        fs: F,
        options: &WalkOptions,
        sink: S,
        queue: Sender<DirTask>,
    ) -> (Self, Vec<Error>) {
        let (filter, errors) = FilterSet::create_with(
            &options.excludes,
            options.entry_filter.clone(),
            options.types,
        );
        let walker = Self {
            fs,
            filter,
            tracker: IdentityTracker::new(),
            follow_symlinks: options.follow_symlinks,
            one_filesystem: options.one_filesystem,
            want_xattrs: options.want_xattrs,
            sink,
            pending: Arc::new(PendingCount::default()),
            queue,
        };
        (walker, errors)
    }

    /// Delivers one entry, with its extended attributes if they were asked
    /// for. An entry whose attributes can't be read is dropped.
    pub(crate) async fn emit(&self, found: Found) {
        let Found { path, stat, target } = found;
        let xattrs = if self.want_xattrs {
            match self.fs.get_xattrs(target.as_deref().unwrap_or(&path)).await {
                Ok(x) => Some(x),
                Err(e) => {
                    self.sink.error(e).await;
                    return;
                }
            }
        } else {
            None
        };
        self.sink.entry(Entry { path, stat, xattrs }).await;
    }

    /// Queues `dirs`.
    pub(crate) fn enqueue(&self, dirs: Vec<DirTask>) {
        if dirs.is_empty() {
            return;
        }
        self.pending.add(dirs.len());

        // Pushed from a separate task: a worker blocking on a full queue that
        // only workers drain would deadlock.
        let queue = self.queue.clone();
        let pending = self.pending.clone();
        tokio::spawn(async move {
            for task in dirs {
                if let Err(e) = queue.send(task).await {
                    debug!("{}: queue closed", e.into_inner().path);
                    pending.done();
                }
            }
        });
    }

    /// Returns the directory itself, then its entries, then queues its
    /// subdirectories.
    async fn process(&self, task: DirTask) {
        let DirTask {
            path,
            stat,
            target,
            emit,
        } = task;
        if emit {
            let found = Found {
                path: path.clone(),
                stat,
                target,
            };
            self.emit(found).await;
        }
        match self.process_directory(&path).await {
            Ok(listing) => {
                for found in listing.entries {
                    self.emit(found).await;
                }
                self.enqueue(listing.subdirs);
            }
            Err(e) => self.sink.error(e).await,
        }
        self.pending.done();
    }
}

/// Runs one walk to completion: starts the workers, classifies `roots` on
/// the calling task, then waits for the watcher to close `sink`.
pub(crate) async fn run<F, S, R>(fs: F, roots: &[R], options: WalkOptions, sink: S)
where
    F: WalkFs,
    S: Sink,
    R: AsRef<str>,
{
    let workers = options.worker_count();
    let (queue, rx) = async_channel::bounded(options.queue_capacity_for(workers));
    let (walker, pattern_errors) = Walker::new(fs, &options, sink, queue);
    let walker = Arc::new(walker);
    for e in pattern_errors {
        walker.sink.error(e).await;
    }

    // Workers first: nothing queued below ever waits on an empty pool.
    let handles: Vec<JoinHandle<()>> = (0..workers)
        .map(|id| tokio::spawn(worker(walker.clone(), rx.clone(), id)))
        .collect();
    drop(rx);
    debug!("started {workers} workers");

    // Every root filesystem is registered before the first directory is
    // queued.
    let mut dirs = Vec::new();
    for root in roots {
        if let Some(task) = walker.classify_root(root.as_ref()).await {
            dirs.push(task);
        }
    }
    walker.enqueue(dirs);

    let watcher = tokio::spawn(watch(walker, handles));
    if let Err(e) = watcher.await {
        error!("completion watcher failed: {e}");
    }
}

/// Closes the sink once every queued directory is done, then closes the
/// queue and waits for the workers to drain out.
async fn watch<F, S>(walker: Arc<Walker<F, S>>, workers: Vec<JoinHandle<()>>)
where
    F: WalkFs,
    S: Sink,
{
    walker.pending.wait_zero().await;
    walker.sink.close();
    walker.queue.close();
    for handle in workers {
        if let Err(e) = handle.await {
            error!("walk worker failed: {e}");
        }
    }
    debug!("walk complete");
}

async fn worker<F, S>(walker: Arc<Walker<F, S>>, rx: Receiver<DirTask>, id: usize)
where
    F: WalkFs,
    S: Sink,
{
    while let Ok(task) = rx.recv().await {
        walker.process(task).await;
    }
    debug!("worker {id} exiting");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::num::NonZeroUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::EntryType;
    use crate::test_utils::MemFs;
    use crate::test_utils::TestRoot;
    use crate::test_utils::diff_paths;
    use crate::walk;
    use crate::walk_apply;
    use crate::walk_apply_with;
    use crate::walk_with;

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn assert_paths(expected: &BTreeSet<String>, actual: &BTreeSet<String>) {
        if let Some(diff) = diff_paths(expected, actual) {
            panic!("walk results differ:\n{diff}");
        }
    }

    /// Drains both streams concurrently.
    async fn collect(roots: &[String], options: WalkOptions) -> (Vec<Entry>, Vec<Error>) {
        let (entries, errors) = walk(roots, options);
        let errors = tokio::spawn(async move {
            let mut all = Vec::new();
            while let Ok(e) = errors.recv().await {
                all.push(e);
            }
            all
        });
        let mut all = Vec::new();
        while let Ok(e) = entries.recv().await {
            all.push(e);
        }
        (all, errors.await.unwrap())
    }

    async fn collect_mem(
        fs: MemFs,
        roots: &[&str],
        options: WalkOptions,
    ) -> (BTreeSet<String>, Vec<Entry>, Vec<Error>) {
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = found.clone();
        let errors = walk_apply_with(fs, roots, options, move |e| {
            sink.lock().unwrap().push(e);
            Ok(())
        })
        .await;
        let entries = found.lock().unwrap().clone();
        let paths = entries.iter().map(|e| e.path.clone()).collect();
        (paths, entries, errors)
    }

    #[tokio::test]
    async fn pending_count_wakes_watcher_at_zero() {
        let pending = Arc::new(PendingCount::default());
        pending.wait_zero().await;

        pending.add(2);
        let waiter = tokio::spawn({
            let pending = pending.clone();
            async move { pending.wait_zero().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        pending.done();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        pending.done();
        waiter.await.unwrap();
        assert_eq!(pending.get(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn symlinks_reported_not_followed() {
        let root = TestRoot::new().unwrap();
        let (entries, errors) = collect(&[root.path.clone()], WalkOptions::default()).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert_paths(
            &set(&["", "a.txt", "sub", "sub/b.txt", "link"]),
            &root.relative(&entries),
        );
        let link = entries.iter().find(|e| e.path.ends_with("/link")).unwrap();
        assert!(link.stat.is_symlink());
        assert!(entries.iter().all(|e| e.xattrs.is_none()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn followed_symlink_is_descended() {
        let root = TestRoot::new().unwrap();
        let options = WalkOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let (entries, errors) = collect(&[root.path.clone()], options).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert_paths(
            &set(&["", "a.txt", "sub", "sub/b.txt", "link", "link/b.txt"]),
            &root.relative(&entries),
        );
        let link = entries.iter().find(|e| e.path.ends_with("/link")).unwrap();
        assert!(link.stat.is_dir());
        assert!(entries.iter().all(|e| !e.stat.is_symlink()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn excluded_directory_drops_subtree() {
        let root = TestRoot::new().unwrap();
        root.create_file("sub/deeper/c.txt", "c").unwrap();
        let options = WalkOptions::default().exclude("sub");
        let (entries, errors) = collect(&[root.path.clone()], options).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert_paths(&set(&["", "a.txt", "link"]), &root.relative(&entries));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn matches_sequential_reference_walk() {
        let root = TestRoot::empty().unwrap();
        root.populate(30, 7).unwrap();
        let expected = root.reference_walk().await.unwrap();

        let options = WalkOptions {
            workers: NonZeroUsize::new(8),
            ..Default::default()
        };
        let (entries, errors) = collect(&[root.path.clone()], options).await;
        assert!(errors.is_empty(), "{errors:?}");
        let mut found = root.relative(&entries);
        assert!(found.remove(""));
        assert_paths(&expected, &found);
        assert_eq!(entries.len(), expected.len() + 1, "duplicate entries");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_walks_agree() {
        let root = TestRoot::new().unwrap();
        root.populate(12, 3).unwrap();
        let (first, _) = collect(&[root.path.clone()], WalkOptions::default()).await;
        let (second, _) = collect(&[root.path.clone()], WalkOptions::default()).await;
        assert_paths(&root.relative(&first), &root.relative(&second));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_worker_tiny_queue_still_completes() {
        let root = TestRoot::empty().unwrap();
        for i in 0..20 {
            for j in 0..5 {
                root.create_dir(&format!("w{i}/x{j}")).unwrap();
            }
        }
        let options = WalkOptions {
            workers: NonZeroUsize::new(1),
            queue_capacity: NonZeroUsize::new(1),
            channel_size: NonZeroUsize::MIN,
            ..Default::default()
        };
        let (entries, errors) = collect(&[root.path.clone()], options).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(entries.len(), 1 + 20 + 20 * 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn symlink_cycles_terminate() {
        let root = TestRoot::empty().unwrap();
        root.create_dir("a").unwrap();
        root.symlink("..", "a/up").unwrap();
        root.symlink(".", "a/self").unwrap();
        let options = WalkOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let (entries, errors) = collect(&[root.path.clone()], options).await;
        assert!(errors.is_empty(), "{errors:?}");
        // `up` leads back to the root and is dropped; `self` is entered once.
        assert_paths(&set(&["", "a", "a/self"]), &root.relative(&entries));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dangling_symlink_is_reported_when_followed() {
        let root = TestRoot::new().unwrap();
        root.symlink("missing", "dangling").unwrap();
        let options = WalkOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let (entries, errors) = collect(&[root.path.clone()], options).await;
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(matches!(&errors[0], Error::Resolve { path, .. } if path.ends_with("/dangling")));
        assert!(root.relative(&entries).contains("sub/b.txt"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn type_mask_does_not_stop_descent() {
        let root = TestRoot::new().unwrap();
        root.create_file("sub/deeper/c.txt", "c").unwrap();
        let roots = [root.path.clone()];
        let (entries, _) = collect(&roots, WalkOptions::default().types(EntryType::DIR)).await;
        assert_paths(&set(&["", "sub", "sub/deeper"]), &root.relative(&entries));

        let (entries, _) = collect(&roots, WalkOptions::default().types(EntryType::FILE)).await;
        assert_paths(
            &set(&["a.txt", "sub/b.txt", "sub/deeper/c.txt"]),
            &root.relative(&entries),
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn non_directory_roots_are_returned_directly() {
        let root = TestRoot::new().unwrap();
        let roots = vec![
            root.path_of("a.txt"),
            root.path_of("link"),
            root.path_of("nope"),
            root.path_of("sub/"),
        ];
        let (entries, errors) = collect(&roots, WalkOptions::default()).await;
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(matches!(&errors[0], Error::Stat { path, .. } if path.ends_with("/nope")));
        assert_paths(
            &set(&["a.txt", "link", "sub", "sub/b.txt"]),
            &root.relative(&entries),
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn paths_are_not_normalized() {
        let root = TestRoot::new().unwrap();
        let dotted = format!("{}/./", root.path);
        let (entries, _) = collect(&[dotted], WalkOptions::default()).await;
        let mut paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
        paths.sort();
        let expected: Vec<_> = ["", "/a.txt", "/link", "/sub", "/sub/b.txt"]
            .iter()
            .map(|p| format!("{}/.{p}", root.path))
            .collect();
        assert_eq!(paths, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn predicate_suppresses_subtree() {
        let root = TestRoot::new().unwrap();
        let options =
            WalkOptions::default().filter(|path, stat| stat.is_dir() && path.ends_with("/sub"));
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = found.clone();
        let errors = walk_apply(&[root.path.clone()], options, move |e| {
            sink.lock().unwrap().push(e);
            Ok(())
        })
        .await;
        assert!(errors.is_empty(), "{errors:?}");
        assert_paths(
            &set(&["", "a.txt", "link"]),
            &root.relative(found.lock().unwrap().iter()),
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn callback_errors_are_collected() {
        let root = TestRoot::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let errors = walk_apply(&[root.path.clone()], WalkOptions::default(), move |e| {
            let failed = e.path.ends_with(".txt");
            let path = e.path.clone();
            sink.lock().unwrap().push(e);
            if failed {
                return Err(Error::Callback {
                    path,
                    how: "rejected".into(),
                });
            }
            Ok(())
        })
        .await;
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors.iter().all(|e| matches!(e, Error::Callback { .. })));
        assert_eq!(seen.lock().unwrap().len(), 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bad_pattern_reported_once() {
        let root = TestRoot::new().unwrap();
        root.populate(9, 2).unwrap();
        let options = WalkOptions::default().exclude("[").exclude("*.dat");
        let (entries, errors) = collect(&[root.path.clone()], options).await;
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(matches!(&errors[0], Error::Pattern { .. }));
        assert!(entries.iter().all(|e| !e.path.ends_with(".dat")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_filesystem_stops_at_mount_points() {
        let fs = MemFs::new()
            .dir("r", 1)
            .file("r/a", 1)
            .dir("r/mnt", 2)
            .file("r/mnt/b", 2)
            .dir("r/same", 1)
            .file("r/same/c", 1);

        let (paths, _, errors) = collect_mem(fs.clone(), &["r"], WalkOptions::default()).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert!(paths.contains("r/mnt/b"));

        let options = WalkOptions {
            one_filesystem: true,
            ..Default::default()
        };
        let (paths, entries, errors) = collect_mem(fs, &["r"], options).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert_paths(&set(&["r", "r/a", "r/same", "r/same/c"]), &paths);
        assert!(entries.iter().filter(|e| e.stat.is_dir()).all(|e| e.stat.dev == 1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_filesystem_tracks_every_root() {
        let fs = MemFs::new()
            .dir("r", 1)
            .dir("r/other", 2)
            .file("r/other/x", 2)
            .dir("s", 2)
            .dir("s/inner", 2)
            .file("s/inner/y", 2);
        let options = WalkOptions {
            one_filesystem: true,
            ..Default::default()
        };
        let (paths, _, errors) = collect_mem(fs, &["r", "s"], options).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert!(paths.contains("r/other/x"));
        assert!(paths.contains("s/inner/y"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn broken_resolver_abandons_branch() {
        let fs = MemFs::new()
            .dir("r", 1)
            .file("r/a", 1)
            .dir("r/sub", 1)
            .file("r/sub/b", 1)
            .symlink("r/link", "r/sub", 1)
            .with_broken_resolver();
        let options = WalkOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let (paths, _, errors) = collect_mem(fs, &["r"], options).await;
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(matches!(&errors[0], Error::ResolvedToSymlink { path, .. } if path == "r/link"));
        assert_paths(&set(&["r", "r/a", "r/sub", "r/sub/b"]), &paths);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_link_to_same_target_is_dropped() {
        let fs = MemFs::new()
            .dir("r", 1)
            .dir("r/sub", 1)
            .file("r/sub/b", 1)
            .file("r/f", 1)
            .symlink("r/l1", "r/sub", 1)
            .symlink("r/l2", "r/sub", 1)
            .symlink("r/lf1", "r/f", 1)
            .symlink("r/lf2", "r/f", 1);
        let options = WalkOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let (paths, _, errors) = collect_mem(fs, &["r"], options).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert_paths(
            &set(&["r", "r/f", "r/l1", "r/l1/b", "r/lf1", "r/sub", "r/sub/b"]),
            &paths,
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn xattrs_attached_or_entry_dropped() {
        let fs = MemFs::new()
            .dir("r", 1)
            .file("r/good", 1)
            .file("r/bad", 1)
            .device("r/null", 1)
            .bad_xattrs("r/bad");
        let options = WalkOptions {
            want_xattrs: true,
            ..Default::default()
        };
        let (paths, entries, errors) = collect_mem(fs, &["r"], options).await;
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(matches!(&errors[0], Error::Xattr { path, .. } if path == "r/bad"));
        assert_paths(&set(&["r", "r/good", "r/null"]), &paths);
        for e in &entries {
            let x = e.xattrs.as_ref().unwrap();
            assert_eq!(x.get("user.ino"), Some(e.stat.ino.to_string().as_str()));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn followed_links_report_target_xattrs() {
        let fs = MemFs::new()
            .dir("r", 1)
            .dir("r/d", 1)
            .xattr("r/d", "user.color", "green")
            .file("r/d/x", 1)
            .file("r/f", 1)
            .xattr("r/f", "user.color", "blue")
            .symlink("r/ld", "r/d", 1)
            .xattr("r/ld", "user.color", "red")
            .symlink("r/lf", "r/f", 1)
            .xattr("r/lf", "user.color", "red");
        let color = |entries: &[Entry], path: &str| {
            let entry = entries.iter().find(|e| e.path == path).unwrap();
            let xattrs = entry.xattrs.as_ref().unwrap();
            assert_eq!(
                xattrs.get("user.ino"),
                Some(entry.stat.ino.to_string().as_str())
            );
            xattrs.get("user.color").map(String::from)
        };
        let followed = WalkOptions {
            follow_symlinks: true,
            want_xattrs: true,
            ..Default::default()
        };

        let (paths, entries, errors) = collect_mem(fs.clone(), &["r"], followed.clone()).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert!(paths.contains("r/ld/x"));
        assert_eq!(color(&entries, "r/lf").as_deref(), Some("blue"));
        assert_eq!(color(&entries, "r/ld").as_deref(), Some("green"));
        assert_eq!(color(&entries, "r/ld/x"), None);

        let (_, entries, errors) = collect_mem(fs.clone(), &["r/lf"], followed.clone()).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(color(&entries, "r/lf").as_deref(), Some("blue"));

        let (_, entries, errors) = collect_mem(fs.clone(), &["r/ld"], followed).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(color(&entries, "r/ld").as_deref(), Some("green"));

        let unfollowed = WalkOptions {
            want_xattrs: true,
            ..Default::default()
        };
        let (_, entries, errors) = collect_mem(fs, &["r"], unfollowed).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert!(entries.iter().find(|e| e.path == "r/lf").unwrap().stat.is_symlink());
        assert_eq!(color(&entries, "r/lf").as_deref(), Some("red"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn errors_can_be_drained_after_entries() {
        let mut fs = MemFs::new().dir("r", 1);
        for i in 0..100 {
            let dir = format!("r/d{i}");
            fs = fs.dir(&dir, 1).unreadable(&dir);
        }
        let (entries, errors) = walk_with(fs, &["r"], WalkOptions::default());
        let mut count = 0;
        while entries.recv().await.is_ok() {
            count += 1;
        }
        assert_eq!(count, 101);
        let mut failed = 0;
        while let Ok(e) = errors.recv().await {
            assert!(matches!(e, Error::ReadDir { .. }));
            failed += 1;
        }
        assert_eq!(failed, 100);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_the_stream_still_finishes() {
        let root = TestRoot::empty().unwrap();
        root.populate(15, 20).unwrap();
        let options = WalkOptions {
            channel_size: NonZeroUsize::MIN,
            ..Default::default()
        };
        let (entries, errors) = walk(&[root.path.clone()], options);
        let first = entries.recv().await.unwrap();
        assert!(first.path.starts_with(&root.path));
        drop(entries);
        // The error stream closes only once the walk is over.
        let drained = tokio::time::timeout(Duration::from_secs(30), async {
            while errors.recv().await.is_ok() {}
        })
        .await;
        assert!(drained.is_ok());
    }
}
