// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory host.
//!
//! Modules and their types are declared programmatically. Modules added with
//! [`InMemoryHost::load_module`] are announced to subscribers the way a real
//! runtime announces a freshly loaded module. Per-module scan counters and
//! injectable enumeration faults make the host usable as a test fixture.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::{Enumeration, Host, ModuleLoadCallback, SubscriptionId};
use crate::descriptor::{ModuleIdentity, TypeDescriptor};

/// Hook invoked at the start of every enumeration, outside any host lock.
pub type EnumerateHook = Arc<dyn Fn(&ModuleIdentity) + Send + Sync>;

/// How enumeration of a module behaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScanBehavior {
    #[default]
    Complete,
    /// Report the declared types as a partial load with `skipped` failures.
    Partial { skipped: usize },
    /// Fail the whole enumeration.
    Fail(String),
    /// Panic inside the enumeration.
    Panic,
}

struct ModuleEntry {
    identity: ModuleIdentity,
    types: Vec<TypeDescriptor>,
    behavior: ScanBehavior,
}

/// Host backed by in-memory module tables.
pub struct InMemoryHost {
    modules: RwLock<Vec<ModuleEntry>>,
    hidden: RwLock<Vec<TypeDescriptor>>,
    subscribers: RwLock<Vec<(SubscriptionId, ModuleLoadCallback)>>,
    next_subscription: AtomicU64,
    scans: DashMap<String, usize>,
    hook: RwLock<Option<EnumerateHook>>,
    direct_lookup: AtomicBool,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self {
            modules: RwLock::new(Vec::new()),
            hidden: RwLock::new(Vec::new()),
            subscribers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            scans: DashMap::new(),
            hook: RwLock::new(None),
            direct_lookup: AtomicBool::new(true),
        }
    }
}

impl InMemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable [`Host::resolve_qualified`]. Enabled by default.
    pub fn set_direct_lookup(&self, enabled: bool) {
        self.direct_lookup.store(enabled, Ordering::Relaxed);
    }

    /// Declare a module that is already loaded. No notification is sent.
    pub fn add_module(&self, module: ModuleIdentity, types: Vec<TypeDescriptor>) {
        let mut modules = self.modules.write();
        if let Some(entry) = modules.iter_mut().find(|entry| entry.identity == module) {
            entry.types = types;
        } else {
            modules.push(ModuleEntry {
                identity: module,
                types,
                behavior: ScanBehavior::Complete,
            });
        }
    }

    /// Declare a module and notify every subscriber.
    ///
    /// Subscribers run on the calling thread after the module table is updated.
    pub fn load_module(&self, module: ModuleIdentity, types: Vec<TypeDescriptor>) {
        self.add_module(module.clone(), types);

        let subscribers: Vec<ModuleLoadCallback> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in subscribers {
            callback(&module);
        }
    }

    /// Register a type reachable through [`Host::resolve_qualified`] only.
    pub fn add_hidden_type(&self, ty: TypeDescriptor) {
        self.hidden.write().push(ty);
    }

    /// Change how enumeration of `full_name` behaves.
    pub fn set_behavior(&self, full_name: &str, behavior: ScanBehavior) {
        let mut modules = self.modules.write();
        if let Some(entry) = modules
            .iter_mut()
            .find(|entry| entry.identity.full_name() == full_name)
        {
            entry.behavior = behavior;
        }
    }

    /// Install a hook run at the start of every enumeration.
    pub fn on_enumerate<F>(&self, hook: F)
    where
        F: Fn(&ModuleIdentity) + Send + Sync + 'static,
    {
        *self.hook.write() = Some(Arc::new(hook));
    }

    pub fn clear_enumerate_hook(&self) {
        *self.hook.write() = None;
    }

    /// Number of enumerations of `full_name` so far.
    #[must_use]
    pub fn scan_count(&self, full_name: &str) -> usize {
        self.scans.get(full_name).map_or(0, |count| *count)
    }

    /// Number of enumerations across all modules.
    #[must_use]
    pub fn total_scans(&self) -> usize {
        self.scans.iter().map(|entry| *entry.value()).sum()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn find(&self, name: &str, ignore_case: bool) -> Option<TypeDescriptor> {
        let matches = |ty: &TypeDescriptor| {
            if ignore_case {
                ty.qualified_name().eq_ignore_ascii_case(name)
            } else {
                ty.qualified_name() == name
            }
        };

        let modules = self.modules.read();
        modules
            .iter()
            .flat_map(|entry| entry.types.iter())
            .find(|ty| matches(ty))
            .cloned()
            .or_else(|| self.hidden.read().iter().find(|ty| matches(ty)).cloned())
    }
}

impl Host for InMemoryHost {
    fn loaded_modules(&self) -> Vec<ModuleIdentity> {
        self.modules
            .read()
            .iter()
            .map(|entry| entry.identity.clone())
            .collect()
    }

    fn enumerate_types(&self, module: &ModuleIdentity) -> Enumeration {
        let hook = self.hook.read().clone();
        if let Some(hook) = hook {
            hook(module);
        }

        *self.scans.entry(module.full_name().to_string()).or_insert(0) += 1;

        let (types, behavior) = {
            let modules = self.modules.read();
            match modules.iter().find(|entry| entry.identity == *module) {
                Some(entry) => (entry.types.clone(), entry.behavior.clone()),
                None => return Enumeration::Failed(format!("unknown module {}", module)),
            }
        };

        match behavior {
            ScanBehavior::Complete => Enumeration::Complete(types),
            ScanBehavior::Partial { skipped } => Enumeration::Partial {
                loaded: types,
                skipped,
            },
            ScanBehavior::Fail(reason) => Enumeration::Failed(reason),
            ScanBehavior::Panic => panic!("enumeration of {} panicked", module),
        }
    }

    fn resolve_qualified(&self, name: &str, ignore_case: bool) -> Option<TypeDescriptor> {
        if !self.direct_lookup.load(Ordering::Relaxed) {
            return None;
        }
        let (ty, module) = crate::name::split_qualified(name);
        let module = module?;
        let canonical = crate::name::qualify(ty, crate::name::canonical_module(module));
        self.find(&canonical, ignore_case)
    }

    fn subscribe_module_loads(&self, callback: ModuleLoadCallback) -> Option<SubscriptionId> {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, callback));
        Some(id)
    }

    fn unsubscribe_module_loads(&self, id: SubscriptionId) {
        self.subscribers.write().retain(|(sub, _)| *sub != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn app() -> ModuleIdentity {
        ModuleIdentity::new("app, Version=1.0.0.0")
    }

    #[test]
    fn test_enumerate_counts_scans() {
        let host = InMemoryHost::new();
        host.add_module(app(), vec![TypeDescriptor::named("app", "Foo")]);

        let types = host.enumerate_types(&app()).into_loaded();
        assert_eq!(types.len(), 1);
        host.enumerate_types(&app());

        assert_eq!(host.scan_count("app, Version=1.0.0.0"), 2);
        assert_eq!(host.total_scans(), 2);
    }

    #[test]
    fn test_behavior_injection() {
        let host = InMemoryHost::new();
        host.add_module(app(), vec![TypeDescriptor::named("app", "Foo")]);

        host.set_behavior("app, Version=1.0.0.0", ScanBehavior::Partial { skipped: 3 });
        assert!(matches!(
            host.enumerate_types(&app()),
            Enumeration::Partial { skipped: 3, .. }
        ));

        host.set_behavior("app, Version=1.0.0.0", ScanBehavior::Fail("broken".into()));
        assert!(matches!(host.enumerate_types(&app()), Enumeration::Failed(_)));
    }

    #[test]
    fn test_unknown_module_fails() {
        let host = InMemoryHost::new();
        assert!(matches!(
            host.enumerate_types(&ModuleIdentity::new("missing")),
            Enumeration::Failed(_)
        ));
    }

    #[test]
    fn test_resolve_qualified_strips_overhead() {
        let host = InMemoryHost::new();
        host.add_module(app(), vec![TypeDescriptor::named("app", "Foo")]);
        host.add_hidden_type(TypeDescriptor::named("app", "Secret"));

        assert!(host.resolve_qualified("Foo, app, Version=9.9.9.9", false).is_some());
        assert!(host.resolve_qualified("foo, APP", true).is_some());
        assert!(host.resolve_qualified("foo, app", false).is_none());
        assert!(host.resolve_qualified("Secret, app", false).is_some());
        assert!(host.resolve_qualified("Foo", false).is_none());

        host.set_direct_lookup(false);
        assert!(host.resolve_qualified("Foo, app", false).is_none());
    }

    #[test]
    fn test_load_module_notifies_subscribers() {
        let host = InMemoryHost::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let id = host
            .subscribe_module_loads(Arc::new(move |_module: &ModuleIdentity| {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("in-memory host supports notifications");

        host.load_module(app(), Vec::new());
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        host.unsubscribe_module_loads(id);
        host.load_module(ModuleIdentity::new("other"), Vec::new());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(host.subscriber_count(), 0);
    }
}
