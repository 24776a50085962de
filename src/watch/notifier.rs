//! Subscription registry and queued event dispatch
//!
//! Each subscription owns a dispatch thread fed by an unbounded channel.
//! Mutations enqueue their events while still holding the tree lock, so a
//! subscriber sees the events of one operation contiguously and in mutation
//! order. Sinks never run on the mutating thread.

use super::event::{Change, ChangeEvent, EventKinds};
use super::sink::WatchSink;
use crate::fs::memory::{CaseSensitivity, NormalizedPath};
use crate::fs::pattern::NamePattern;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// What a subscription listens to.
#[derive(Debug, Clone)]
pub(crate) struct WatchScope {
    pub path: NormalizedPath,
    pub pattern: NamePattern,
    pub recursive: bool,
    pub kinds: EventKinds,
}

impl WatchScope {
    fn covers(&self, path: &NormalizedPath, case: CaseSensitivity) -> bool {
        if !path.is_descendant_of(&self.path) {
            return false;
        }
        if !self.recursive {
            match path.parent(case) {
                Some(parent) if parent.key() == self.path.key() => {}
                _ => return false,
            }
        }
        path.file_name()
            .map(|name| self.pattern.matches(name))
            .unwrap_or(false)
    }

    pub fn matches(&self, change: &Change, case: CaseSensitivity) -> bool {
        if !self.kinds.contains(change.kind) {
            return false;
        }
        self.covers(&change.path, case)
            || change
                .old_path
                .as_ref()
                .map(|old| self.covers(old, case))
                .unwrap_or(false)
    }
}

struct DeliveryState {
    active: AtomicBool,
    /// Held for the duration of each sink call
    delivery: Mutex<()>,
}

struct Subscription {
    id: Uuid,
    scope: WatchScope,
    sender: Mutex<Option<Sender<ChangeEvent>>>,
    state: Arc<DeliveryState>,
    worker: ThreadId,
}

impl Subscription {
    /// Stops delivery. After this returns no further event reaches the sink.
    fn deactivate(&self) -> bool {
        if !self.state.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        // Wait out an in-flight delivery, unless we are that delivery.
        if thread::current().id() != self.worker {
            drop(
                self.state
                    .delivery
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()),
            );
        }
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        true
    }
}

struct Registry {
    case: CaseSensitivity,
    subscriptions: Mutex<Vec<Arc<Subscription>>>,
}

impl Registry {
    fn remove(&self, id: Uuid) -> Option<Arc<Subscription>> {
        let mut subs = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let pos = subs.iter().position(|s| s.id == id)?;
        Some(subs.remove(pos))
    }
}

/// Fans change records out to matching subscriptions.
#[derive(Clone)]
pub(crate) struct ChangeNotifier {
    registry: Arc<Registry>,
}

impl ChangeNotifier {
    pub fn new(case: CaseSensitivity) -> Self {
        Self {
            registry: Arc::new(Registry {
                case,
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self, scope: WatchScope, sink: Arc<dyn WatchSink>) -> WatchSubscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel::<ChangeEvent>();
        let state = Arc::new(DeliveryState {
            active: AtomicBool::new(true),
            delivery: Mutex::new(()),
        });

        let worker_state = state.clone();
        let worker = thread::Builder::new()
            .name(format!("fsdouble-watch-{}", &id.simple().to_string()[..8]))
            .spawn(move || {
                for event in rx {
                    let _guard = worker_state
                        .delivery
                        .lock()
                        .unwrap_or_else(|e| e.into_inner());
                    if !worker_state.active.load(Ordering::SeqCst) {
                        break;
                    }
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.on_event(&event)));
                    if outcome.is_err() {
                        warn!(
                            subscription = %id,
                            path = %event.path.display(),
                            "Watch sink panicked; subscription stays armed"
                        );
                    }
                }
                trace!(subscription = %id, "Dispatch thread exiting");
            });

        let worker = match worker {
            Ok(handle) => handle.thread().id(),
            Err(e) => {
                // Without a dispatch thread the subscription can never fire.
                warn!(subscription = %id, error = %e, "Failed to spawn dispatch thread");
                state.active.store(false, Ordering::SeqCst);
                thread::current().id()
            }
        };

        debug!(
            subscription = %id,
            path = %scope.path,
            pattern = scope.pattern.as_str(),
            recursive = scope.recursive,
            "Watch armed"
        );

        let subscription = Arc::new(Subscription {
            id,
            scope,
            sender: Mutex::new(Some(tx)),
            state,
            worker,
        });
        self.registry
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(subscription.clone());

        WatchSubscription {
            subscription,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Disposes the subscription with `id`; returns false if none was armed.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        match self.registry.remove(id) {
            Some(sub) => {
                sub.deactivate();
                debug!(subscription = %id, "Watch disposed");
                true
            }
            None => false,
        }
    }

    /// Enqueues `changes` for every matching subscription, in order.
    pub fn publish(&self, changes: &[Change]) {
        if changes.is_empty() {
            return;
        }
        let subs = self
            .registry
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for sub in subs.iter() {
            if !sub.state.active.load(Ordering::SeqCst) {
                continue;
            }
            let sender = sub.sender.lock().unwrap_or_else(|e| e.into_inner());
            let Some(sender) = sender.as_ref() else {
                continue;
            };
            for change in changes {
                if sub.scope.matches(change, self.registry.case) {
                    trace!(subscription = %sub.id, kind = ?change.kind, path = %change.path, "Enqueue");
                    // A closed channel only means the worker is gone.
                    let _ = sender.send(change.to_event());
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registry
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// Handle to an armed watch. Dropping it disposes the subscription.
pub struct WatchSubscription {
    subscription: Arc<Subscription>,
    registry: Weak<Registry>,
}

impl WatchSubscription {
    pub fn id(&self) -> Uuid {
        self.subscription.id
    }

    pub fn is_active(&self) -> bool {
        self.subscription.state.active.load(Ordering::SeqCst)
    }

    /// Stops delivery and unregisters the watch. Safe to call repeatedly,
    /// concurrently with dispatch, and from inside the sink.
    pub fn dispose(&self) {
        if self.subscription.deactivate() {
            debug!(subscription = %self.subscription.id, "Watch disposed");
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.subscription.id);
        }
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("id", &self.subscription.id)
            .field("path", &self.subscription.scope.path.as_str())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::memory::PathNormalizer;
    use crate::fs::FileType;
    use crate::watch::sink::RecordingSink;
    use crate::watch::ChangeKind;
    use std::time::Duration;

    fn path(s: &str) -> NormalizedPath {
        PathNormalizer::default()
            .normalize(s, &NormalizedPath::root())
            .unwrap()
    }

    fn scope(p: &str, pattern: &str, recursive: bool) -> WatchScope {
        WatchScope {
            path: path(p),
            pattern: NamePattern::new(pattern, false).unwrap(),
            recursive,
            kinds: EventKinds::all(),
        }
    }

    #[test]
    fn test_scope_recursive_and_direct() {
        let case = CaseSensitivity::Insensitive;
        let deep = Change::created(path("/a/b/c.txt"), FileType::File);
        let direct = Change::created(path("/a/c.txt"), FileType::File);
        let itself = Change::changed(path("/a"), FileType::Directory);

        assert!(scope("/a", "*", true).matches(&deep, case));
        assert!(!scope("/a", "*", false).matches(&deep, case));
        assert!(scope("/a", "*", false).matches(&direct, case));
        assert!(!scope("/a", "*", true).matches(&itself, case));
    }

    #[test]
    fn test_scope_pattern_and_kinds() {
        let case = CaseSensitivity::Insensitive;
        let change = Change::created(path("/a/C.TXT"), FileType::File);
        assert!(scope("/a", "*.txt", true).matches(&change, case));
        assert!(!scope("/a", "*.rs", true).matches(&change, case));

        let mut only_deletes = scope("/a", "*", true);
        only_deletes.kinds = EventKinds::only(ChangeKind::Deleted);
        assert!(!only_deletes.matches(&change, case));
    }

    #[test]
    fn test_rename_matches_either_side() {
        let case = CaseSensitivity::Insensitive;
        let out = Change::renamed(path("/a/x"), path("/b/x"), FileType::File);
        assert!(scope("/a", "*", true).matches(&out, case));
        assert!(scope("/b", "*", true).matches(&out, case));
        assert!(!scope("/c", "*", true).matches(&out, case));
    }

    #[test]
    fn test_publish_and_dispose() {
        let notifier = ChangeNotifier::new(CaseSensitivity::Insensitive);
        let sink = Arc::new(RecordingSink::new());
        let sub = notifier.subscribe(scope("/a", "*", true), sink.clone());
        assert_eq!(notifier.len(), 1);

        notifier.publish(&[Change::created(path("/a/1"), FileType::File)]);
        let events = sink.wait_for(1, Duration::from_secs(5));
        assert_eq!(events.len(), 1);

        sub.dispose();
        sub.dispose();
        assert!(!sub.is_active());
        assert_eq!(notifier.len(), 0);

        notifier.publish(&[Change::created(path("/a/2"), FileType::File)]);
        let events = sink.wait_for(2, Duration::from_millis(50));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_drop_unregisters() {
        let notifier = ChangeNotifier::new(CaseSensitivity::Insensitive);
        {
            let _sub = notifier.subscribe(scope("/", "*", true), Arc::new(RecordingSink::new()));
            assert_eq!(notifier.len(), 1);
        }
        assert_eq!(notifier.len(), 0);
    }

    #[test]
    fn test_unsubscribe_by_id() {
        let notifier = ChangeNotifier::new(CaseSensitivity::Insensitive);
        let sub = notifier.subscribe(scope("/", "*", true), Arc::new(RecordingSink::new()));
        assert!(notifier.unsubscribe(sub.id()));
        assert!(!notifier.unsubscribe(sub.id()));
        assert!(!sub.is_active());
    }
}
