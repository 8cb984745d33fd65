// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The [`TypeCache`] facade.
//!
//! Owns one registry per host and wires the scanner, bulk initializer,
//! resolver and coordinator around it. Construction optionally subscribes to
//! host notifications and seeds the cache from the modules the host already
//! lists. Dropping the cache unsubscribes.

use std::sync::Arc;

use crate::config::TypeCacheConfig;
use crate::coordinator::Coordinator;
use crate::descriptor::{ModuleIdentity, TypeDescriptor};
use crate::error::{Error, Result};
use crate::exclusion::{ExclusionPolicy, ModuleFilter, TypeFilter};
use crate::host::Host;
use crate::initializer::BulkInitializer;
use crate::listener::{ListenerId, ListenerSet, ModuleLoadListener};
use crate::name;
use crate::registry::RegistryCore;
use crate::resolver::{LookupStats, ResolveOptions, Resolver};

/// Builder for [`TypeCache`].
pub struct TypeCacheBuilder {
    host: Arc<dyn Host>,
    config: TypeCacheConfig,
    module_filters: Vec<ModuleFilter>,
    type_filters: Vec<TypeFilter>,
    listeners: Vec<Arc<dyn ModuleLoadListener>>,
}

impl TypeCacheBuilder {
    fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            config: TypeCacheConfig::default(),
            module_filters: Vec::new(),
            type_filters: Vec::new(),
            listeners: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(mut self, config: TypeCacheConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn parallel_initialization(mut self, parallel: bool) -> Self {
        self.config.parallel_initialization = parallel;
        self
    }

    /// Append a module-level exclusion predicate.
    #[must_use]
    pub fn ignore_module<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ModuleIdentity) -> bool + Send + Sync + 'static,
    {
        self.module_filters.push(Arc::new(filter));
        self
    }

    /// Append a type-level exclusion predicate.
    #[must_use]
    pub fn ignore_type<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ModuleIdentity, &TypeDescriptor) -> bool + Send + Sync + 'static,
    {
        self.type_filters.push(Arc::new(filter));
        self
    }

    /// Register a listener before seeding, so it observes the seed pass.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn ModuleLoadListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validate the configuration, subscribe, and seed.
    pub fn build(self) -> Result<TypeCache> {
        self.config.validate()?;

        let policy = Arc::new(ExclusionPolicy::with_patterns(
            self.config.ignored_module_patterns.clone(),
            self.config.ignored_type_patterns.clone(),
        ));
        for filter in self.module_filters {
            policy.add_module_filter(filter);
        }
        for filter in self.type_filters {
            policy.add_type_filter(filter);
        }

        let listeners = Arc::new(ListenerSet::new());
        for listener in self.listeners {
            listeners.add(listener);
        }

        let registry = Arc::new(RegistryCore::new());
        let initializer = Arc::new(BulkInitializer::new(
            Arc::clone(&registry),
            Arc::clone(&self.host),
            Arc::clone(&policy),
            Arc::clone(&listeners),
            &self.config,
        ));
        let resolver = Resolver::new(
            Arc::clone(&registry),
            Arc::clone(&initializer),
            Arc::clone(&self.host),
        );
        let coordinator = Coordinator::new(Arc::clone(&initializer), Arc::clone(&self.host));

        let cache = TypeCache {
            registry,
            initializer,
            resolver,
            coordinator,
            policy,
            listeners,
            config: self.config,
        };

        // Subscribe first: modules loaded during seeding are queued, not missed.
        if cache.config.subscribe_to_host {
            cache.coordinator.subscribe();
        }
        if cache.config.seed_on_start {
            cache.initializer.ensure_seeded();
        }

        log::debug!(
            "[TypeCache] ready: {} modules, {} types",
            cache.registry.loaded_modules().len(),
            cache.registry.len()
        );
        Ok(cache)
    }
}

/// Concurrent type registry and resolver for one host.
pub struct TypeCache {
    registry: Arc<RegistryCore>,
    initializer: Arc<BulkInitializer>,
    resolver: Resolver,
    coordinator: Coordinator,
    policy: Arc<ExclusionPolicy>,
    listeners: Arc<ListenerSet>,
    config: TypeCacheConfig,
}

impl TypeCache {
    #[must_use]
    pub fn builder(host: Arc<dyn Host>) -> TypeCacheBuilder {
        TypeCacheBuilder::new(host)
    }

    /// Cache with the default configuration.
    pub fn new(host: Arc<dyn Host>) -> Result<Self> {
        Self::builder(host).build()
    }

    /// Resolve a type name. `Ok(None)` when the type does not exist.
    pub fn resolve(&self, name: &str, options: &ResolveOptions) -> Result<Option<TypeDescriptor>> {
        self.resolver.resolve(name, options)
    }

    /// Resolve `"Type, Module[, Version=..]"` (or a bare `"Type"`) with default options.
    pub fn get_type(&self, qualified: &str) -> Result<Option<TypeDescriptor>> {
        let (ty, module) = name::split_qualified(qualified);
        if ty.is_empty() {
            return Err(Error::MalformedName(qualified.to_string()));
        }
        let options = match module {
            Some(module) => ResolveOptions::new().module_hint(module),
            None => ResolveOptions::new(),
        };
        self.resolver.resolve(ty, &options)
    }

    /// Resolve `name` expected in `module`.
    pub fn get_type_in_module(&self, name: &str, module: &str) -> Result<Option<TypeDescriptor>> {
        self.resolver
            .resolve(name, &ResolveOptions::new().module_hint(module))
    }

    /// Registered types satisfying `capability`. Memoized until reset.
    pub fn implementors_of(&self, capability: &TypeDescriptor) -> Arc<[TypeDescriptor]> {
        self.resolver.implementors_of(capability)
    }

    /// Every registered type, sorted by qualified name.
    pub fn types(&self) -> Vec<TypeDescriptor> {
        self.initializer.ensure_seeded();
        self.registry.types()
    }

    /// Registered types accepted by `predicate`.
    pub fn types_matching<P>(&self, predicate: P) -> Vec<TypeDescriptor>
    where
        P: Fn(&TypeDescriptor) -> bool,
    {
        let mut types = self.types();
        types.retain(|ty| predicate(ty));
        types
    }

    /// Types of one module, scanning it first if needed.
    pub fn types_of_module(&self, module: &str) -> Vec<TypeDescriptor> {
        self.initializer.initialize_matching(module);
        self.registry.types_of_module(module)
    }

    /// Full names of every scanned module.
    pub fn loaded_modules(&self) -> Vec<String> {
        self.registry.loaded_modules()
    }

    pub fn is_module_loaded(&self, module: &str) -> bool {
        self.registry.is_module_loaded(module)
    }

    /// Scan `modules`; already loaded ones are skipped unless `force`.
    pub fn initialize(&self, modules: &[ModuleIdentity], force: bool) -> usize {
        self.initializer
            .initialize(modules, force, self.config.parallel_initialization)
    }

    /// Scan host modules whose full name contains `module`.
    pub fn initialize_matching(&self, module: &str) -> usize {
        self.initializer.initialize_matching(module)
    }

    /// Clear every index and rescan every host module now.
    pub fn reinitialize(&self) -> usize {
        self.initializer.reinitialize()
    }

    /// Clear every index. The next lookup that allows initialization rescans.
    pub fn reset(&self) {
        self.initializer.reset();
    }

    /// Feed a module-load notification by hand.
    pub fn notify_module_loaded(&self, module: &ModuleIdentity) {
        self.coordinator.notify(module);
    }

    pub fn add_listener(&self, listener: Arc<dyn ModuleLoadListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Append a module-level exclusion predicate.
    pub fn add_module_filter(&self, filter: ModuleFilter) {
        self.policy.add_module_filter(filter);
    }

    /// Append a type-level exclusion predicate.
    pub fn add_type_filter(&self, filter: TypeFilter) {
        self.policy.add_type_filter(filter);
    }

    #[must_use]
    pub fn stats(&self) -> LookupStats {
        self.resolver.stats()
    }

    #[must_use]
    pub fn registry(&self) -> &RegistryCore {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &TypeCacheConfig {
        &self.config
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.coordinator.is_subscribed()
    }
}
