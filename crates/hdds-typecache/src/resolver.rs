// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name resolution.
//!
//! Lookup order, first success wins:
//! 1. baseline initialization (once, when allowed)
//! 2. bare-name shortcut when no module hint is given
//! 3. qualified lookup of the working name
//! 4. structural reconstruction of array and generic names
//! 5. qualified lookup under the canonical (overhead-stripped) module hint
//! 6. direct host lookup
//! 7. targeted initialization of the hinted module, then steps 3 and 5 again
//!
//! Reconstructions and host hits are cached under the step-3 key. A generic
//! whose arguments do not all resolve is not found and nothing is cached.
//! Names nested deeper than [`MAX_NESTING`] (array ranks plus generic levels)
//! are not found.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::initializer::BulkInitializer;
use crate::name;
use crate::registry::RegistryCore;

/// Deepest array/generic nesting a name may have.
pub const MAX_NESTING: usize = 64;

/// Options for a single resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Compare names case-insensitively.
    pub ignore_case: bool,
    /// Run baseline initialization first if it has not run yet.
    pub allow_initialization: bool,
    /// Module the type is expected in (canonical or full name).
    pub module_hint: Option<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            ignore_case: false,
            allow_initialization: true,
            module_hint: None,
        }
    }
}

impl ResolveOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    #[must_use]
    pub fn allow_initialization(mut self, allow: bool) -> Self {
        self.allow_initialization = allow;
        self
    }

    #[must_use]
    pub fn module_hint(mut self, module: impl Into<String>) -> Self {
        self.module_hint = Some(module.into());
        self
    }
}

/// Resolution statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupStats {
    /// Served from the registry.
    pub hits: u64,
    /// Not found.
    pub misses: u64,
    /// Array or generic types rebuilt from their parts.
    pub reconstructions: u64,
    /// Served by the host's direct lookup.
    pub host_fallbacks: u64,
    /// Found after a targeted module initialization.
    pub targeted_initializations: u64,
}

impl LookupStats {
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.hits
            + self.misses
            + self.reconstructions
            + self.host_fallbacks
            + self.targeted_initializations
    }

    /// Share of lookups served straight from the registry.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    reconstructions: AtomicU64,
    host_fallbacks: AtomicU64,
    targeted_initializations: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Cached(_) => &self.hits,
            Outcome::Reconstructed(_) => &self.reconstructions,
            Outcome::Host(_) => &self.host_fallbacks,
            Outcome::AfterInitialization(_) => &self.targeted_initializations,
            Outcome::NotFound => &self.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LookupStats {
        LookupStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            reconstructions: self.reconstructions.load(Ordering::Relaxed),
            host_fallbacks: self.host_fallbacks.load(Ordering::Relaxed),
            targeted_initializations: self.targeted_initializations.load(Ordering::Relaxed),
        }
    }
}

enum Outcome {
    Cached(TypeDescriptor),
    Reconstructed(TypeDescriptor),
    Host(TypeDescriptor),
    AfterInitialization(TypeDescriptor),
    NotFound,
}

impl Outcome {
    fn into_descriptor(self) -> Option<TypeDescriptor> {
        match self {
            Self::Cached(ty)
            | Self::Reconstructed(ty)
            | Self::Host(ty)
            | Self::AfterInitialization(ty) => Some(ty),
            Self::NotFound => None,
        }
    }
}

/// Resolves type names against the registry, falling back to the host.
pub struct Resolver {
    registry: Arc<RegistryCore>,
    initializer: Arc<BulkInitializer>,
    host: Arc<dyn Host>,
    counters: Counters,
}

impl Resolver {
    pub fn new(
        registry: Arc<RegistryCore>,
        initializer: Arc<BulkInitializer>,
        host: Arc<dyn Host>,
    ) -> Self {
        Self {
            registry,
            initializer,
            host,
            counters: Counters::default(),
        }
    }

    /// Resolve `name`.
    ///
    /// `Ok(None)` means the type does not exist; only an empty or
    /// whitespace-only name is an error.
    pub fn resolve(&self, name: &str, options: &ResolveOptions) -> Result<Option<TypeDescriptor>> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::MalformedName(name.to_string()));
        }

        if options.allow_initialization {
            self.initializer.ensure_seeded();
        }

        let hint = options
            .module_hint
            .as_deref()
            .map(str::trim)
            .filter(|hint| !hint.is_empty());

        let outcome = self.resolve_name(trimmed, hint, options.ignore_case, 0);
        self.counters.record(&outcome);
        if matches!(outcome, Outcome::NotFound) {
            log::trace!("[Resolver] {} not found (hint: {:?})", trimmed, hint);
        }
        Ok(outcome.into_descriptor())
    }

    /// Every registered type satisfying `capability`, except the capability itself.
    ///
    /// Memoized until the next full reset; modules loaded after the first
    /// query do not refresh the result.
    pub fn implementors_of(&self, capability: &TypeDescriptor) -> Arc<[TypeDescriptor]> {
        self.initializer.ensure_seeded();

        if let Some(memo) = self.registry.implementors(capability) {
            return memo;
        }

        let generation = self.registry.generation();
        let implementors: Vec<TypeDescriptor> = self
            .registry
            .types()
            .into_iter()
            .filter(|ty| ty != capability && ty.satisfies(capability))
            .collect();

        // Reentrant call from the seeding thread: the baseline is incomplete.
        if self.initializer.is_seeding() {
            return implementors.into();
        }
        self.registry.memoize_implementors(capability, implementors, generation)
    }

    #[must_use]
    pub fn stats(&self) -> LookupStats {
        self.counters.snapshot()
    }

    fn resolve_name(
        &self,
        name: &str,
        hint: Option<&str>,
        ignore_case: bool,
        depth: usize,
    ) -> Outcome {
        let working = match hint {
            Some(_) => name.to_string(),
            None => self
                .registry
                .lookup_bare(name, ignore_case)
                .unwrap_or_else(|| name.to_string()),
        };
        let key = match hint {
            Some(module) => name::qualify(&working, module),
            None => working.clone(),
        };

        if let Some(ty) = self.registry.lookup_exact(&key, ignore_case) {
            return Outcome::Cached(ty);
        }

        if let Some(ty) = self.reconstruct(&working, hint, ignore_case, depth) {
            return Outcome::Reconstructed(self.registry.cache_alias(&key, ty, ignore_case));
        }

        if let Some(ty) = self.lookup_canonical(&working, hint, ignore_case) {
            return Outcome::Cached(ty);
        }

        if let Some(ty) = self.host.resolve_qualified(&key, ignore_case) {
            return Outcome::Host(self.registry.cache_alias(&key, ty, ignore_case));
        }

        if let Some(module) = hint {
            if self.initializer.initialize_matching(module) > 0 {
                let retried = self
                    .registry
                    .lookup_exact(&key, ignore_case)
                    .or_else(|| self.lookup_canonical(&working, hint, ignore_case));
                if let Some(ty) = retried {
                    return Outcome::AfterInitialization(ty);
                }
            }
        }

        Outcome::NotFound
    }

    fn lookup_canonical(
        &self,
        name: &str,
        hint: Option<&str>,
        ignore_case: bool,
    ) -> Option<TypeDescriptor> {
        let module = hint?;
        let canonical = name::canonical_module(module);
        if canonical == module {
            return None;
        }
        self.registry
            .lookup_exact(&name::qualify(name, canonical), ignore_case)
    }

    fn lookup(
        &self,
        name: &str,
        hint: Option<&str>,
        ignore_case: bool,
        depth: usize,
    ) -> Option<TypeDescriptor> {
        self.resolve_name(name, hint, ignore_case, depth).into_descriptor()
    }

    fn reconstruct(
        &self,
        name: &str,
        hint: Option<&str>,
        ignore_case: bool,
        depth: usize,
    ) -> Option<TypeDescriptor> {
        let (ty, own_module) = name::split_qualified(name);
        let hint = own_module.or(hint);

        let mut element = ty;
        let mut rank = 0;
        while let Some(inner) = name::array_element(element) {
            element = inner;
            rank += 1;
            if depth + rank > MAX_NESTING {
                log::trace!("[Resolver] {} nests too deep", name);
                return None;
            }
        }
        if rank > 0 {
            let mut array = self.lookup(element, hint, ignore_case, depth + rank)?;
            for _ in 0..rank {
                array = self.host.construct_array(&array);
            }
            return Some(array);
        }

        let generic = name::parse_generic(ty)?;
        if generic.is_open() {
            return None;
        }
        if depth >= MAX_NESTING {
            log::trace!("[Resolver] {} nests too deep", name);
            return None;
        }

        let mut arguments = Vec::with_capacity(generic.arity());
        for argument in &generic.arguments {
            let (arg_ty, arg_module) = name::split_qualified(argument);
            if arg_ty.is_empty() {
                return None;
            }
            arguments.push(self.lookup(arg_ty, arg_module, ignore_case, depth + 1)?);
        }

        let definition = self.lookup(&generic.definition_name(), hint, ignore_case, depth + 1)?;
        self.host.construct_generic(&definition, &arguments)
    }
}
