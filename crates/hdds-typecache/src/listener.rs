// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Module-loaded listeners.
//!
//! Listeners are kept in a copy-on-write list. Dispatch iterates a snapshot,
//! so a listener may register or remove listeners (or query the cache) from
//! inside its callback.

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::descriptor::{ModuleIdentity, TypeDescriptor};

/// A module was scanned and its types committed to the registry.
#[derive(Debug, Clone)]
pub struct ModuleLoadedEvent {
    pub module: ModuleIdentity,
    pub types: Arc<[TypeDescriptor]>,
}

/// Receives [`ModuleLoadedEvent`]s.
pub trait ModuleLoadListener: Send + Sync {
    /// Called after the registry lock is released.
    fn on_module_loaded(&self, event: &ModuleLoadedEvent);
}

/// Closure-based listener.
///
/// # Example
///
/// ```
/// use hdds_typecache::{ClosureListener, ModuleLoadedEvent};
///
/// let listener = ClosureListener::new(|event: &ModuleLoadedEvent| {
///     println!("{} loaded with {} types", event.module, event.types.len());
/// });
/// # let _ = listener;
/// ```
pub struct ClosureListener<F: Fn(&ModuleLoadedEvent) + Send + Sync> {
    callback: F,
}

impl<F: Fn(&ModuleLoadedEvent) + Send + Sync> ClosureListener<F> {
    /// Create a new closure-based listener.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: Fn(&ModuleLoadedEvent) + Send + Sync> ModuleLoadListener for ClosureListener<F> {
    fn on_module_loaded(&self, event: &ModuleLoadedEvent) {
        (self.callback)(event);
    }
}

/// Handle returned by [`ListenerSet::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Entries = Vec<(ListenerId, Arc<dyn ModuleLoadListener>)>;

/// Tagged multicast list of listeners.
pub struct ListenerSet {
    entries: ArcSwap<Entries>,
    next_id: AtomicU64,
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl ListenerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn ModuleLoadListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.rcu(|current| {
            let mut next = Entries::clone(current);
            next.push((id, Arc::clone(&listener)));
            next
        });
        id
    }

    /// Remove a listener. Returns `false` if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut removed = false;
        self.entries.rcu(|current| {
            let mut next = Entries::clone(current);
            let before = next.len();
            next.retain(|(entry, _)| *entry != id);
            removed = next.len() != before;
            next
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener registered at call time.
    pub fn dispatch(&self, event: &ModuleLoadedEvent) {
        let snapshot = self.entries.load_full();
        for (_, listener) in snapshot.iter() {
            listener.on_module_loaded(event);
        }
    }
}
