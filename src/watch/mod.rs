//! Change notification for the in-memory file system

mod event;
mod notifier;
mod sink;

pub(crate) use event::Change;
pub use event::{ChangeEvent, ChangeKind, EventKinds};
pub(crate) use notifier::{ChangeNotifier, WatchScope};
pub use notifier::WatchSubscription;
pub use sink::{LoggingSink, RecordingSink, WatchSink};

use crate::error::Result;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// What to watch and which events to deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    pub path: PathBuf,
    /// File-name filter applied to the affected entry
    pub pattern: String,
    pub recursive: bool,
    pub kinds: EventKinds,
}

impl WatchOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pattern: "*".to_string(),
            recursive: false,
            kinds: EventKinds::all(),
        }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn kinds(mut self, kinds: EventKinds) -> Self {
        self.kinds = kinds;
        self
    }
}

/// Change subscription surface
pub trait WatchOps: Send + Sync {
    /// Arms a watch on an existing directory
    fn subscribe(&self, options: WatchOptions, sink: Arc<dyn WatchSink>)
        -> Result<WatchSubscription>;

    /// Disposes a watch by id; returns false if it was not armed
    fn unsubscribe(&self, id: Uuid) -> bool;
}
