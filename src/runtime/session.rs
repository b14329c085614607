// src/runtime/session.rs
//! Session lifecycle bindings
//!
//! Wires a tracker to its host: the unload handler commits the session, the
//! visibility listener records `Hidden` / `Visible`. The returned
//! [`Registration`] remembers the listener ids so the bindings can be
//! detached again on re-initialization or teardown.

use crate::runtime::host::{HostLifecycle, ListenerId, Visibility};
use std::sync::Arc;
use tracing::debug;

/// Callbacks a session binds to host signals
pub trait SessionHooks: Send + Sync + 'static {
    /// The context is about to be destroyed
    fn on_unload(&self);

    /// Visibility toggled
    fn on_visibility_change(&self, visibility: Visibility);
}

/// Listener ids registered for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub unload: ListenerId,
    pub visibility: ListenerId,
}

impl Registration {
    /// Register `hooks` with the host.
    ///
    /// Only a weak reference is handed to the host, so the bindings never keep
    /// the session alive; once it is dropped they do nothing.
    pub fn attach<H: SessionHooks>(host: &dyn HostLifecycle, hooks: &Arc<H>) -> Self {
        let weak = Arc::downgrade(hooks);
        let unload = host.set_unload_handler(Arc::new(move || {
            if let Some(hooks) = weak.upgrade() {
                hooks.on_unload();
            }
        }));

        let weak = Arc::downgrade(hooks);
        let visibility = host.add_visibility_listener(Arc::new(move |visibility| {
            if let Some(hooks) = weak.upgrade() {
                hooks.on_visibility_change(visibility);
            }
        }));

        debug!(unload, visibility, "Session bound to host lifecycle");
        Registration { unload, visibility }
    }

    /// Remove both bindings from the host
    pub fn detach(self, host: &dyn HostLifecycle) {
        let unload = host.remove_listener(self.unload);
        let visibility = host.remove_listener(self.visibility);
        debug!(unload, visibility, "Session detached from host lifecycle");
    }
}
