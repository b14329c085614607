// src/runtime/host.rs
//! Host lifecycle notifications
//!
//! The tracker consumes two signals from its host:
//!
//! - **unload**: the execution context is about to be torn down; fires at most
//!   once per teardown. The host keeps a single unload slot.
//! - **visibility change**: fires on every toggle; any number of listeners.
//!
//! [`LocalHost`] is an in-process host that callers drive explicitly, e.g.
//! from a signal handler or a UI event loop.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Identifies a registered handler
pub type ListenerId = u64;

/// Called when the context is about to be destroyed
pub type UnloadHandler = Arc<dyn Fn() + Send + Sync>;

/// Called with the new visibility on every toggle
pub type VisibilityListener = Arc<dyn Fn(Visibility) + Send + Sync>;

/// Visibility of the execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn from_hidden(hidden: bool) -> Self {
        if hidden {
            Visibility::Hidden
        } else {
            Visibility::Visible
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, Visibility::Hidden)
    }
}

/// Lifecycle signals provided by the host
pub trait HostLifecycle: Send + Sync {
    /// Install the unload handler, replacing any previous one
    fn set_unload_handler(&self, handler: UnloadHandler) -> ListenerId;

    /// Add a visibility listener; existing listeners are kept
    fn add_visibility_listener(&self, listener: VisibilityListener) -> ListenerId;

    /// Remove a handler or listener. Returns false if it was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Whether the context is currently hidden
    fn is_hidden(&self) -> bool;
}

/// Explicitly driven in-process host
#[derive(Default)]
pub struct LocalHost {
    unload: Mutex<Option<(ListenerId, UnloadHandler)>>,
    visibility: Mutex<Vec<(ListenerId, VisibilityListener)>>,
    hidden: AtomicBool,
    next_id: AtomicU64,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal imminent teardown.
    ///
    /// Runs the unload handler synchronously and consumes it, so a second
    /// call is a no-op. Returns whether a handler ran.
    pub fn notify_unload(&self) -> bool {
        let handler = self.unload.lock().take();
        match handler {
            Some((id, handler)) => {
                debug!(listener = id, "Dispatching unload");
                handler();
                true
            }
            None => false,
        }
    }

    /// Change visibility. Listeners fire only when the state actually toggles.
    pub fn set_visibility(&self, visibility: Visibility) {
        let was_hidden = self.hidden.swap(visibility.is_hidden(), Ordering::SeqCst);
        if was_hidden == visibility.is_hidden() {
            return;
        }

        // Listeners run outside the lock so they may register or remove handlers
        let listeners: Vec<VisibilityListener> = self
            .visibility
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        debug!(?visibility, listeners = listeners.len(), "Dispatching visibility change");
        for listener in listeners {
            listener(visibility);
        }
    }

    pub fn has_unload_handler(&self) -> bool {
        self.unload.lock().is_some()
    }

    pub fn visibility_listener_count(&self) -> usize {
        self.visibility.lock().len()
    }

    fn allocate_id(&self) -> ListenerId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl HostLifecycle for LocalHost {
    fn set_unload_handler(&self, handler: UnloadHandler) -> ListenerId {
        let id = self.allocate_id();
        *self.unload.lock() = Some((id, handler));
        id
    }

    fn add_visibility_listener(&self, listener: VisibilityListener) -> ListenerId {
        let id = self.allocate_id();
        self.visibility.lock().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut unload = self.unload.lock();
        if matches!(unload.as_ref(), Some((current, _)) if *current == id) {
            *unload = None;
            return true;
        }
        drop(unload);

        let mut listeners = self.visibility.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }
}
