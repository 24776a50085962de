//! Receivers for change events

use super::event::{ChangeEvent, ChangeKind};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Trait for handling change events delivered to a subscription
pub trait WatchSink: Send + Sync + 'static {
    /// Called on the subscription's dispatch thread for every matching event
    fn on_event(&self, event: &ChangeEvent);
}

impl<F> WatchSink for F
where
    F: Fn(&ChangeEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// Sink that logs change events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl WatchSink for LoggingSink {
    fn on_event(&self, event: &ChangeEvent) {
        match event.kind {
            ChangeKind::Renamed => {
                info!(
                    from = ?event.old_path,
                    to = %event.path.display(),
                    "Renamed"
                );
            }
            ChangeKind::Changed => {
                debug!(path = %event.path.display(), "Changed");
            }
            kind => {
                info!(path = %event.path.display(), ?kind, file_type = ?event.file_type, "Change");
            }
        }
    }
}

/// Sink that keeps every event it receives, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChangeEvent>>,
    arrived: Condvar,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Blocks until at least `count` events arrived or `timeout` elapsed,
    /// then returns everything recorded so far.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ChangeEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        while events.len() < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .arrived
                .wait_timeout(events, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            events = guard;
        }
        events.clone()
    }
}

impl WatchSink for RecordingSink {
    fn on_event(&self, event: &ChangeEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        self.arrived.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileType;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn created(path: &str) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Created,
            path: PathBuf::from(path),
            old_path: None,
            file_type: FileType::File,
        }
    }

    #[test]
    fn test_closure_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sink = move |_: &ChangeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        };
        sink.on_event(&created("/a"));
        sink.on_event(&created("/b"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_logging_sink() {
        LoggingSink.on_event(&created("/a"));
        // Should not panic
    }

    #[test]
    fn test_recording_sink_wait_for() {
        let sink = Arc::new(RecordingSink::new());
        let producer = sink.clone();
        let handle = thread::spawn(move || {
            producer.on_event(&created("/x"));
            producer.on_event(&created("/y"));
        });

        let events = sink.wait_for(2, Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].path, PathBuf::from("/x"));

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_recording_sink_times_out() {
        let sink = RecordingSink::new();
        let events = sink.wait_for(1, Duration::from_millis(20));
        assert!(events.is_empty());
    }
}
