use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

use async_channel::Receiver;
use async_channel::Sender;

use crate::Entry;
use crate::Error;

/// Entries produced by [`walk`](crate::walk). Ends when the walk is done.
pub type EntryStream = Receiver<Entry>;

/// Errors produced by [`walk`](crate::walk). Ends when the walk is done.
pub type ErrorStream = Receiver<Error>;

/// Where a walk delivers what it finds.
pub(crate) trait Sink: Send + Sync + 'static {
    fn entry(&self, entry: Entry) -> impl Future<Output = ()> + Send;

    fn error(&self, err: Error) -> impl Future<Output = ()> + Send;

    /// Called exactly once, after the last entry and error were delivered.
    fn close(&self);
}

/// Delivers into a bounded entry channel and an unbounded error channel.
pub(crate) struct ChannelSink {
    entries: Sender<Entry>,
    errors: Sender<Error>,
}

impl ChannelSink {
    pub(crate) fn create(channel_size: usize) -> (Self, EntryStream, ErrorStream) {
        let (entries, entry_rx) = async_channel::bounded(channel_size);
        let (errors, error_rx) = async_channel::unbounded();
        (Self { entries, errors }, entry_rx, error_rx)
    }
}

impl Sink for ChannelSink {
    async fn entry(&self, entry: Entry) {
        if let Err(e) = self.entries.send(entry).await {
            log::debug!("{}: entry stream dropped by consumer", e.into_inner().path);
        }
    }

    async fn error(&self, err: Error) {
        if let Err(e) = self.errors.send(err).await {
            log::debug!("error stream dropped by consumer: {}", e.into_inner());
        }
    }

    fn close(&self) {
        self.entries.close();
        self.errors.close();
    }
}

/// Runs a callback on every entry and collects every error.
pub(crate) struct ApplySink<A> {
    apply: A,
    errors: Arc<Mutex<Vec<Error>>>,
}

impl<A> ApplySink<A>
where
    A: Fn(Entry) -> Result<(), Error> + Send + Sync + 'static,
{
    pub(crate) fn new(apply: A) -> (Self, Arc<Mutex<Vec<Error>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            apply,
            errors: errors.clone(),
        };
        (sink, errors)
    }

    fn push(&self, err: Error) {
        match self.errors.lock() {
            Ok(mut errors) => errors.push(err),
            Err(poisoned) => poisoned.into_inner().push(err),
        }
    }
}

impl<A> Sink for ApplySink<A>
where
    A: Fn(Entry) -> Result<(), Error> + Send + Sync + 'static,
{
    async fn entry(&self, entry: Entry) {
        if let Err(e) = (self.apply)(entry) {
            self.push(e);
        }
    }

    async fn error(&self, err: Error) {
        self.push(err);
    }

    fn close(&self) {}
}
