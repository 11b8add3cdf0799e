//! Event plumbing: a callback registry plus the event types routed
//! through it.
//!
//! The host embedding adapts its own notification sources (a file watcher,
//! a tree view, an editor webview) to [`WatchEvent`] and subscribes to
//! [`TreeChange`] to know when to re-render. Callbacks are isolated with
//! `catch_unwind` so one misbehaving subscriber cannot take down emission
//! for the others.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identifier returned by [`CallbackRegistry::subscribe`]
pub type SubscriptionId = u64;

type EventCallback<E> = Box<dyn Fn(&E) + Send + Sync>;

/// A thread-safe registry of event callbacks.
///
/// Emission iterates subscribers in an unspecified order. A panic inside
/// one callback is caught and logged; the remaining callbacks still run.
pub struct CallbackRegistry<E> {
    callbacks: RwLock<HashMap<SubscriptionId, EventCallback<E>>>,
    next_id: AtomicU64,
}

impl<E> CallbackRegistry<E> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback, returning an id for later removal
    pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.insert(id, Box::new(callback));
        id
    }

    /// Remove a callback. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.remove(&id).is_some()
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.callbacks.read().unwrap().len()
    }

    /// Whether no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every registered callback
    pub fn emit(&self, event: &E) {
        let callbacks = self.callbacks.read().unwrap();
        for (id, callback) in callbacks.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| callback(event)));
            if result.is_err() {
                log::warn!("Event callback {} panicked", id);
            }
        }
    }
}

impl<E> Default for CallbackRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for CallbackRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.len())
            .finish()
    }
}

// ==== Event types ====

/// A change to the visible tree, emitted by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeChange {
    /// The tree (or some subtree) should be re-read and re-rendered
    Refreshed,
}

/// A filesystem notification delivered by the host's watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WatchEvent {
    /// An existing file's content changed on disk
    Changed {
        /// Absolute path of the changed file
        path: PathBuf,
    },
    /// A file appeared on disk
    Created {
        /// Absolute path of the new file
        path: PathBuf,
    },
    /// A file disappeared from disk
    Deleted {
        /// Absolute path of the removed file
        path: PathBuf,
    },
}

impl WatchEvent {
    /// The path the event refers to
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Changed { path } => path,
            WatchEvent::Created { path } => path,
            WatchEvent::Deleted { path } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscribe_and_emit() {
        let registry: CallbackRegistry<TreeChange> = CallbackRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        registry.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        registry.emit(&TreeChange::Refreshed);
        registry.emit(&TreeChange::Refreshed);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let registry: CallbackRegistry<TreeChange> = CallbackRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        let id = registry.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        registry.emit(&TreeChange::Refreshed);
        assert!(registry.unsubscribe(id));
        registry.emit(&TreeChange::Refreshed);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!registry.unsubscribe(id));
    }

    #[test]
    fn test_panicking_callback_does_not_block_others() {
        let registry: CallbackRegistry<TreeChange> = CallbackRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.subscribe(|_| panic!("bad subscriber"));
        let c = Arc::clone(&counter);
        registry.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        registry.emit(&TreeChange::Refreshed);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_watch_event_serde_tagging() {
        let event = WatchEvent::Deleted {
            path: PathBuf::from("/ws/a.md"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"deleted\""));

        let parsed: WatchEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.path(), Path::new("/ws/a.md"));
    }
}
