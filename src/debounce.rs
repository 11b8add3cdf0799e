//! Coalescing scheduler used for every debounce in the crate.
//!
//! `schedule(key, delay, action)` collapses repeated calls with the same key
//! into one trailing execution after a quiet period. `schedule_leading` runs
//! the first call of a burst immediately and swallows the rest of the burst.
//! The same instance backs the tree-ordering save, the tree-view refresh,
//! and editor-change forwarding.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type Action = Box<dyn FnOnce() + Send>;

struct Pending {
    deadline: Instant,
    /// None for leading-edge markers: the work already ran, the entry only
    /// suppresses re-runs until the quiet period ends.
    action: Option<Action>,
}

struct State {
    pending: HashMap<String, Pending>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    cv: Condvar,
}

/// A keyed debounce scheduler with a single worker thread.
///
/// Actions run on the worker thread; a panicking action does not affect
/// other scheduled actions or the worker.
pub struct Scheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Create a scheduler and start its worker thread
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                pending: HashMap::new(),
                shutdown: false,
            }),
            cv: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("notegrove-debounce".to_string())
            .spawn(move || Self::worker_loop(&worker_shared))
            .expect("failed to spawn scheduler worker");

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Schedule `action` to run after `delay` of quiet on `key`.
    ///
    /// A repeated call with the same key replaces the pending action and
    /// pushes the deadline out (trailing debounce).
    pub fn schedule(&self, key: &str, delay: Duration, action: impl FnOnce() + Send + 'static) {
        let mut state = self.shared.state.lock().unwrap();
        if state.shutdown {
            return;
        }
        state.pending.insert(
            key.to_string(),
            Pending {
                deadline: Instant::now() + delay,
                action: Some(Box::new(action)),
            },
        );
        drop(state);
        self.shared.cv.notify_all();
    }

    /// Run `action` immediately if `key` has been quiet for `window`,
    /// otherwise coalesce the call away (leading-edge debounce).
    ///
    /// Returns `true` if the action ran. The action runs on the caller's
    /// thread.
    pub fn schedule_leading(&self, key: &str, window: Duration, action: impl FnOnce()) -> bool {
        {
            let mut state = self.shared.state.lock().unwrap();
            if state.shutdown {
                return false;
            }
            let deadline = Instant::now() + window;
            if let Some(pending) = state.pending.get_mut(key) {
                // Mid-burst: extend the quiet period, drop the call
                pending.deadline = deadline;
                return false;
            }
            state.pending.insert(
                key.to_string(),
                Pending {
                    deadline,
                    action: None,
                },
            );
        }
        self.shared.cv.notify_all();
        action();
        true
    }

    /// Cancel a pending action. Returns `true` if one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        state.pending.remove(key).is_some()
    }

    /// Run a pending trailing action now, on the caller's thread.
    ///
    /// Returns `true` if an action was pending and ran.
    pub fn flush(&self, key: &str) -> bool {
        let pending = {
            let mut state = self.shared.state.lock().unwrap();
            state.pending.remove(key)
        };
        match pending.and_then(|p| p.action) {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    /// Whether anything is pending (or suppressing) for `key`
    pub fn is_pending(&self, key: &str) -> bool {
        let state = self.shared.state.lock().unwrap();
        state.pending.contains_key(key)
    }

    fn worker_loop(shared: &Shared) {
        let mut state = shared.state.lock().unwrap();
        loop {
            if state.shutdown {
                break;
            }

            let now = Instant::now();
            let due: Vec<String> = state
                .pending
                .iter()
                .filter(|(_, p)| p.deadline <= now)
                .map(|(k, _)| k.clone())
                .collect();

            if !due.is_empty() {
                let mut actions = Vec::new();
                for key in due {
                    if let Some(pending) = state.pending.remove(&key)
                        && let Some(action) = pending.action
                    {
                        actions.push(action);
                    }
                }
                drop(state);
                for action in actions {
                    let _ = catch_unwind(AssertUnwindSafe(move || action()));
                }
                state = shared.state.lock().unwrap();
                continue;
            }

            let next_deadline = state.pending.values().map(|p| p.deadline).min();
            state = match next_deadline {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(now);
                    shared.cv.wait_timeout(state, wait).unwrap().0
                }
                None => shared.cv.wait(state).unwrap(),
            };
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
            state.pending.clear();
        }
        self.shared.cv.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock().unwrap();
        f.debug_struct("Scheduler")
            .field("pending", &state.pending.len())
            .finish()
    }
}
