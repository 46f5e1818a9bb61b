use std::future::Future;

use crate::Error;
use crate::FileStat;
use crate::Xattr;

/// One child of a listed directory: its name and lstat, or the reason it
/// can't be returned.
pub type Child = Result<(String, FileStat), Error>;

/// The filesystem primitives a walk is built on.
///
/// [`NativeFs`](crate::NativeFs) talks to the operating system. Other
/// implementations can serve synthetic trees. Every method may be called
/// concurrently from several workers.
pub trait WalkFs: Send + Sync + 'static {
    /// Stats `path`. When `follow` is false a final symlink is reported as
    /// itself.
    fn stat(
        &self,
        path: &str,
        follow: bool,
    ) -> impl Future<Output = Result<FileStat, Error>> + Send;

    /// Lists the immediate children of the directory `path`, each with its
    /// lstat result. Order is unspecified.
    ///
    /// The outer error fails the whole listing. A child that can't be
    /// returned is an error in its own slot and the rest are kept.
    fn list_children(&self, path: &str) -> impl Future<Output = Result<Vec<Child>, Error>> + Send;

    /// Resolves every symlink in `path` and returns the target path.
    ///
    /// Must fail, not loop, on a symlink cycle.
    fn resolve_symlink(&self, path: &str) -> impl Future<Output = Result<String, Error>> + Send;

    /// Reads the extended attributes of `path`.
    fn get_xattrs(&self, path: &str) -> impl Future<Output = Result<Xattr, Error>> + Send;
}
