// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bulk initializer.
//!
//! A pass claims modules under the registry lock (marking them loaded before
//! any work starts), scans them outside the lock, sequentially or on scoped
//! worker threads, and merges the results in one critical section. Modules
//! queued by the coordinator while the pass ran go through the same path
//! before the pass leaves the gate. Events are dispatched last, once the
//! registry lock and the gate are both released.

use parking_lot::{Condvar, Mutex};
use std::slice;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::config::TypeCacheConfig;
use crate::coordinator::{ScanGate, ScanPass};
use crate::descriptor::ModuleIdentity;
use crate::exclusion::ExclusionPolicy;
use crate::host::Host;
use crate::listener::{ListenerSet, ModuleLoadedEvent};
use crate::name;
use crate::registry::{RegistryCore, ScannedModule};
use crate::scanner::ModuleScanner;

/// Modules per batch so that `modules` fit in at most `max_batches` batches.
#[must_use]
pub fn batch_size(modules: usize, max_batches: usize) -> usize {
    modules.div_ceil(max_batches.max(1)).max(1)
}

/// Baseline initialization progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedState {
    Unseeded,
    /// A seed or forced reinitialization runs on this thread.
    Seeding(ThreadId),
    Seeded,
}

enum SeedTurn<'a> {
    /// Seeding already completed.
    Done,
    /// Called again from the thread that is seeding.
    Reentrant,
    /// This thread runs the pass; dropping the guard publishes `Seeded`.
    Owner(SeedGuard<'a>),
}

struct SeedGuard<'a> {
    initializer: &'a BulkInitializer,
}

impl Drop for SeedGuard<'_> {
    fn drop(&mut self) {
        *self.initializer.seed.lock() = SeedState::Seeded;
        self.initializer.seed_done.notify_all();
    }
}

/// Scans modules into the registry and announces them.
pub struct BulkInitializer {
    registry: Arc<RegistryCore>,
    scanner: ModuleScanner,
    policy: Arc<ExclusionPolicy>,
    host: Arc<dyn Host>,
    listeners: Arc<ListenerSet>,
    gate: ScanGate,
    parallel: bool,
    max_batches: usize,
    seed: Mutex<SeedState>,
    seed_done: Condvar,
}

impl BulkInitializer {
    pub fn new(
        registry: Arc<RegistryCore>,
        host: Arc<dyn Host>,
        policy: Arc<ExclusionPolicy>,
        listeners: Arc<ListenerSet>,
        config: &TypeCacheConfig,
    ) -> Self {
        Self {
            registry,
            scanner: ModuleScanner::new(Arc::clone(&host), Arc::clone(&policy)),
            policy,
            host,
            listeners,
            gate: ScanGate::new(),
            parallel: config.parallel_initialization,
            max_batches: config.max_batches,
            seed: Mutex::new(SeedState::Unseeded),
            seed_done: Condvar::new(),
        }
    }

    /// Scan `modules` into the registry.
    ///
    /// Modules already loaded are skipped unless `force` is set. Returns the
    /// number of modules announced by this call (queued modules included).
    pub fn initialize(&self, modules: &[ModuleIdentity], force: bool, parallel: bool) -> usize {
        let pass = self.gate.enter();
        self.run(pass, modules, force, false, parallel)
    }

    /// Forced full reinitialization: clear every index, then rescan every
    /// module the host lists.
    ///
    /// Other threads asking for baseline initialization wait until the
    /// rebuilt indices are committed.
    pub fn reinitialize(&self) -> usize {
        let _guard = match self.seed_turn(true) {
            SeedTurn::Owner(guard) => Some(guard),
            SeedTurn::Reentrant | SeedTurn::Done => None,
        };
        let modules = self.host.loaded_modules();
        log::debug!("[BulkInit] forced reinitialization of {} modules", modules.len());
        let pass = self.gate.enter();
        self.run(pass, &modules, true, true, self.parallel)
    }

    /// Run baseline initialization once over every loaded module.
    ///
    /// Returns once the baseline is committed. A concurrent caller blocks
    /// while another thread seeds; the seeding thread itself (listeners,
    /// host callbacks) passes straight through.
    pub fn ensure_seeded(&self) {
        let SeedTurn::Owner(_guard) = self.seed_turn(false) else {
            return;
        };
        let modules = self.host.loaded_modules();
        log::debug!("[BulkInit] seeding from {} loaded modules", modules.len());
        self.initialize(&modules, false, self.parallel);
    }

    /// Wipe every index and forget that baseline initialization ran.
    ///
    /// Waits for a seed in flight on another thread to finish first.
    pub fn reset(&self) {
        let mut state = self.seed.lock();
        while matches!(*state, SeedState::Seeding(owner) if owner != thread::current().id()) {
            self.seed_done.wait(&mut state);
        }
        self.registry.reset(true);
        if *state == SeedState::Seeded {
            *state = SeedState::Unseeded;
        }
    }

    #[must_use]
    pub fn is_seeded(&self) -> bool {
        *self.seed.lock() == SeedState::Seeded
    }

    /// True while a seed or forced reinitialization is committing.
    #[must_use]
    pub fn is_seeding(&self) -> bool {
        matches!(*self.seed.lock(), SeedState::Seeding(_))
    }

    fn seed_turn(&self, force: bool) -> SeedTurn<'_> {
        let me = thread::current().id();
        let mut state = self.seed.lock();
        loop {
            match *state {
                SeedState::Seeding(owner) if owner == me => return SeedTurn::Reentrant,
                SeedState::Seeding(_) => self.seed_done.wait(&mut state),
                SeedState::Seeded if !force => return SeedTurn::Done,
                SeedState::Seeded | SeedState::Unseeded => {
                    *state = SeedState::Seeding(me);
                    return SeedTurn::Owner(SeedGuard { initializer: self });
                }
            }
        }
    }

    /// Targeted pass over host modules whose full name contains `module`.
    ///
    /// Does nothing when a module with that canonical name is already loaded.
    pub fn initialize_matching(&self, module: &str) -> usize {
        let canonical = name::canonical_module(module);
        if canonical.is_empty() || self.registry.is_module_loaded(canonical) {
            return 0;
        }

        let matching: Vec<ModuleIdentity> = self
            .host
            .loaded_modules()
            .into_iter()
            .filter(|candidate| candidate.full_name().contains(canonical))
            .collect();
        if matching.is_empty() {
            log::trace!("[BulkInit] no host module matches {}", canonical);
            return 0;
        }

        self.initialize(&matching, false, self.parallel)
    }

    /// Single-module path for a host notification.
    pub(crate) fn handle_notification(&self, module: &ModuleIdentity) {
        if let Some(pass) = self.gate.enter_or_defer(module) {
            self.run(pass, slice::from_ref(module), false, false, false);
        }
    }

    #[must_use]
    pub fn gate(&self) -> &ScanGate {
        &self.gate
    }

    #[must_use]
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    fn run(
        &self,
        mut pass: ScanPass<'_>,
        modules: &[ModuleIdentity],
        force: bool,
        clear: bool,
        parallel: bool,
    ) -> usize {
        let claimed = self.registry.claim(modules, force, clear);
        let mut loaded = self.scan_and_merge(&claimed, parallel);

        while let Some(module) = pass.next_delayed() {
            let claimed = self.registry.claim(slice::from_ref(&module), false, false);
            loaded.extend(self.scan_and_merge(&claimed, false));
        }

        let announced = loaded.len();
        for (module, types) in loaded {
            self.listeners.dispatch(&ModuleLoadedEvent {
                module,
                types: types.into(),
            });
        }
        announced
    }

    fn scan_and_merge(&self, modules: &[ModuleIdentity], parallel: bool) -> Vec<ScannedModule> {
        let wanted: Vec<ModuleIdentity> = modules
            .iter()
            .filter(|module| {
                let ignored = self.policy.ignores_module(module);
                if ignored {
                    log::trace!("[BulkInit] ignoring module {}", module);
                }
                !ignored
            })
            .cloned()
            .collect();
        if wanted.is_empty() {
            return Vec::new();
        }

        let scanned = if parallel && wanted.len() > 1 {
            self.scan_parallel(&wanted)
        } else {
            scan_batch(&self.scanner, &wanted)
        };

        let added = self.registry.merge(&scanned);
        log::debug!(
            "[BulkInit] merged {} modules ({} new types)",
            scanned.len(),
            added
        );
        scanned
    }

    fn scan_parallel(&self, modules: &[ModuleIdentity]) -> Vec<ScannedModule> {
        let per_batch = batch_size(modules.len(), self.max_batches);
        let scanner = &self.scanner;

        let outcome = crossbeam::thread::scope(|scope| {
            let workers: Vec<_> = modules
                .chunks(per_batch)
                .enumerate()
                .map(|(idx, batch)| {
                    let spawned = scope
                        .builder()
                        .name(format!("hdds-typecache-scan-{}", idx))
                        .spawn(move |_| scan_batch(scanner, batch));
                    (batch, spawned)
                })
                .collect();

            workers
                .into_iter()
                .flat_map(|(batch, spawned)| match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        log::debug!("[BulkInit] scan worker panicked, {} modules lost", batch.len());
                        Vec::new()
                    }),
                    Err(err) => {
                        log::debug!("[BulkInit] failed to spawn scan worker: {}", err);
                        scan_batch(scanner, batch)
                    }
                })
                .collect::<Vec<_>>()
        });

        outcome.unwrap_or_else(|_| {
            log::debug!("[BulkInit] parallel scan scope panicked");
            Vec::new()
        })
    }
}

fn scan_batch(scanner: &ModuleScanner, batch: &[ModuleIdentity]) -> Vec<ScannedModule> {
    batch
        .iter()
        .map(|module| (module.clone(), scanner.scan(module)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeDescriptor;
    use crate::host::memory::InMemoryHost;
    use crate::listener::ClosureListener;
    use parking_lot::Mutex;

    fn fixture(modules: usize) -> (Arc<InMemoryHost>, Arc<RegistryCore>, Arc<ListenerSet>, BulkInitializer) {
        let host = Arc::new(InMemoryHost::new());
        for m in 0..modules {
            let module_name = format!("mod{}", m);
            let types = (0..5)
                .map(|t| TypeDescriptor::named(&module_name, &format!("Type{}", t)))
                .collect();
            host.add_module(ModuleIdentity::new(&format!("{}, Version=1.0.0.0", module_name)), types);
        }

        let registry = Arc::new(RegistryCore::new());
        let listeners = Arc::new(ListenerSet::new());
        let initializer = BulkInitializer::new(
            Arc::clone(&registry),
            host.clone(),
            Arc::new(ExclusionPolicy::new()),
            Arc::clone(&listeners),
            &TypeCacheConfig::manual(),
        );
        (host, registry, listeners, initializer)
    }

    #[test]
    fn test_batch_size() {
        assert_eq!(batch_size(0, 20), 1);
        assert_eq!(batch_size(7, 20), 1);
        assert_eq!(batch_size(20, 20), 1);
        assert_eq!(batch_size(21, 20), 2);
        assert_eq!(batch_size(100, 20), 5);
        assert_eq!(batch_size(5, 0), 5);
        assert!(101usize.div_ceil(batch_size(101, 20)) <= 20);
    }

    #[test]
    fn test_initialize_skips_loaded_modules() {
        let (host, registry, _listeners, initializer) = fixture(3);
        let modules = host.loaded_modules();

        assert_eq!(initializer.initialize(&modules, false, false), 3);
        assert_eq!(registry.len(), 15);
        assert_eq!(initializer.initialize(&modules, false, false), 0);
        assert_eq!(host.total_scans(), 3);

        assert_eq!(initializer.initialize(&modules, true, false), 3);
        assert_eq!(host.total_scans(), 6);
        assert_eq!(registry.len(), 15);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (host, sequential, _l1, seq_init) = fixture(45);
        let (_host2, parallel, _l2, par_init) = fixture(45);
        let modules = host.loaded_modules();

        seq_init.initialize(&modules, false, false);
        par_init.initialize(&modules, false, true);

        assert_eq!(sequential.types(), parallel.types());
        assert_eq!(sequential.loaded_modules(), parallel.loaded_modules());
    }

    #[test]
    fn test_ignored_modules_are_marked_but_silent() {
        let host = Arc::new(InMemoryHost::new());
        host.add_module(ModuleIdentity::dynamic("generated"), vec![TypeDescriptor::named("generated", "Proxy")]);
        let registry = Arc::new(RegistryCore::new());
        let listeners = Arc::new(ListenerSet::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        listeners.add(Arc::new(ClosureListener::new(move |event: &ModuleLoadedEvent| {
            events_clone.lock().push(event.module.clone());
        })));
        let initializer = BulkInitializer::new(
            Arc::clone(&registry),
            host.clone(),
            Arc::new(ExclusionPolicy::new()),
            listeners,
            &TypeCacheConfig::manual(),
        );

        assert_eq!(initializer.initialize(&host.loaded_modules(), false, false), 0);
        assert!(registry.is_module_loaded("generated"));
        assert!(registry.is_empty());
        assert!(events.lock().is_empty());
        assert_eq!(host.total_scans(), 0);
    }

    #[test]
    fn test_initialize_matching() {
        let (host, registry, _listeners, initializer) = fixture(3);

        assert_eq!(initializer.initialize_matching("mod1, Version=1.0.0.0"), 1);
        assert!(registry.is_module_loaded("mod1"));
        assert!(!registry.is_module_loaded("mod0"));

        assert_eq!(initializer.initialize_matching("mod1"), 0);
        assert_eq!(initializer.initialize_matching("missing"), 0);
        assert_eq!(host.total_scans(), 1);
    }

    #[test]
    fn test_ensure_seeded_runs_once() {
        let (host, registry, _listeners, initializer) = fixture(2);

        initializer.ensure_seeded();
        initializer.ensure_seeded();
        assert!(initializer.is_seeded());
        assert_eq!(registry.loaded_modules().len(), 2);
        assert_eq!(host.total_scans(), 2);
    }

    #[test]
    fn test_reinitialize_clears_and_rescans() {
        let (host, registry, _listeners, initializer) = fixture(2);
        initializer.ensure_seeded();
        registry.cache_alias("Alias", TypeDescriptor::named("mod0", "Type0"), false);

        initializer.reinitialize();

        assert!(registry.lookup_exact("Alias", false).is_none());
        assert_eq!(registry.len(), 10);
        assert_eq!(host.total_scans(), 4);
    }

    #[test]
    fn test_events_follow_commit() {
        let (host, registry, listeners, initializer) = fixture(1);
        let registry_clone = Arc::clone(&registry);
        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed_clone = Arc::clone(&observed);
        listeners.add(Arc::new(ClosureListener::new(move |event: &ModuleLoadedEvent| {
            // The registry lock is free and the types are visible.
            let visible = event
                .types
                .iter()
                .all(|ty| registry_clone.lookup_exact(ty.qualified_name(), false).is_some());
            observed_clone.lock().push((event.types.len(), visible));
        })));

        initializer.initialize(&host.loaded_modules(), false, false);
        assert_eq!(*observed.lock(), vec![(5, true)]);
    }

    #[test]
    fn test_concurrent_seed_waits_for_commit() {
        let (host, registry, _listeners, initializer) = fixture(3);
        let initializer = Arc::new(initializer);
        let started = Arc::new(std::sync::Barrier::new(2));
        let started_clone = Arc::clone(&started);
        host.on_enumerate(move |module: &ModuleIdentity| {
            if module.name() == "mod0" {
                started_clone.wait();
                thread::sleep(std::time::Duration::from_millis(100));
            }
        });

        let seeder = {
            let initializer = Arc::clone(&initializer);
            thread::spawn(move || initializer.ensure_seeded())
        };
        started.wait();
        assert!(initializer.is_seeding());

        initializer.ensure_seeded();
        assert!(initializer.is_seeded());
        assert_eq!(registry.len(), 15);

        seeder.join().expect("seeder should succeed");
        assert_eq!(host.total_scans(), 3);
    }

    #[test]
    fn test_seeding_thread_passes_through() {
        let (host, registry, listeners, initializer) = fixture(2);
        let initializer = Arc::new(initializer);
        let weak = Arc::downgrade(&initializer);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        listeners.add(Arc::new(ClosureListener::new(move |_: &ModuleLoadedEvent| {
            if let Some(initializer) = weak.upgrade() {
                initializer.ensure_seeded();
                seen_clone.lock().push(initializer.is_seeding());
            }
        })));

        initializer.ensure_seeded();

        assert_eq!(*seen.lock(), vec![true, true]);
        assert!(initializer.is_seeded());
        assert_eq!(registry.len(), 10);
        assert_eq!(host.total_scans(), 2);
    }

    #[test]
    fn test_reset_forgets_seed() {
        let (host, registry, _listeners, initializer) = fixture(2);
        initializer.ensure_seeded();

        initializer.reset();
        assert!(!initializer.is_seeded());
        assert!(registry.is_empty());

        initializer.ensure_seeded();
        assert_eq!(registry.len(), 10);
        assert_eq!(host.total_scans(), 4);
    }
}
