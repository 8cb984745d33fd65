// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry core: every cache index behind one lock.
//!
//! Indices:
//! - qualified name -> descriptor (case-sensitive and lower-cased variants)
//! - bare name -> qualified name (first registration wins)
//! - canonical module -> its slice of the qualified index
//! - capability -> memoized implementors
//! - loaded module full names
//!
//! The qualified and per-module indices are always updated in the same
//! critical section. Resolver write-backs (reconstructed arrays and generics,
//! host hits) live in a separate alias index so the per-module partition
//! stays an exact mirror of registered types. Nothing in this module calls
//! out to host code or user callbacks.

use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::descriptor::{ModuleIdentity, TypeDescriptor};
use crate::name;

/// Types scanned from one module, ready to merge.
pub type ScannedModule = (ModuleIdentity, Vec<TypeDescriptor>);

#[derive(Default)]
struct Indices {
    by_qualified: HashMap<Arc<str>, TypeDescriptor>,
    by_qualified_ci: HashMap<String, TypeDescriptor>,
    by_bare: HashMap<Arc<str>, Arc<str>>,
    by_bare_ci: HashMap<String, Arc<str>>,
    by_module: HashMap<Arc<str>, BTreeMap<Arc<str>, TypeDescriptor>>,
    by_capability: HashMap<TypeDescriptor, Arc<[TypeDescriptor]>>,
    aliases: HashMap<String, TypeDescriptor>,
    aliases_ci: HashMap<String, TypeDescriptor>,
    loaded: HashSet<Arc<str>>,
    loaded_canonical: HashSet<Arc<str>>,
    module_full_names: HashMap<Arc<str>, Arc<str>>,
    generation: u64,
}

impl Indices {
    fn clear(&mut self) {
        *self = Self {
            generation: self.generation.wrapping_add(1),
            ..Self::default()
        };
    }

    fn insert(&mut self, module: &ModuleIdentity, ty: TypeDescriptor) -> bool {
        let qualified: Arc<str> = Arc::from(ty.qualified_name());
        if self.by_qualified.contains_key(&qualified) {
            return false;
        }

        self.module_full_names
            .entry(Arc::from(module.name()))
            .or_insert_with(|| Arc::from(module.full_name()));

        let bare: Arc<str> = Arc::from(ty.name());
        self.by_bare_ci
            .entry(bare.to_lowercase())
            .or_insert_with(|| Arc::clone(&qualified));
        self.by_bare
            .entry(bare)
            .or_insert_with(|| Arc::clone(&qualified));
        self.by_qualified_ci
            .entry(qualified.to_lowercase())
            .or_insert_with(|| ty.clone());
        self.by_module
            .entry(Arc::from(ty.module()))
            .or_default()
            .insert(Arc::clone(&qualified), ty.clone());
        self.by_qualified.insert(qualified, ty);
        true
    }

    fn mark_loaded(&mut self, module: &ModuleIdentity) -> bool {
        self.loaded_canonical.insert(Arc::from(module.name()));
        self.loaded.insert(Arc::from(module.full_name()))
    }

    fn lookup_exact(&self, qualified: &str, ignore_case: bool) -> Option<TypeDescriptor> {
        if ignore_case {
            let key = qualified.to_lowercase();
            self.by_qualified_ci
                .get(&key)
                .or_else(|| self.aliases_ci.get(&key))
                .cloned()
        } else {
            self.by_qualified
                .get(qualified)
                .or_else(|| self.aliases.get(qualified))
                .cloned()
        }
    }
}

/// Owner of all cache indices and of the single lock guarding them.
#[derive(Default)]
pub struct RegistryCore {
    indices: Mutex<Indices>,
}

impl RegistryCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ty` as declared by `module`.
    ///
    /// Returns `false` if a type with the same module and bare name is
    /// already present; the registry is then left untouched.
    pub fn insert(&self, module: &ModuleIdentity, ty: TypeDescriptor) -> bool {
        self.indices.lock().insert(module, ty)
    }

    /// Look up a qualified name (`"Type, module"`).
    pub fn lookup_exact(&self, qualified: &str, ignore_case: bool) -> Option<TypeDescriptor> {
        self.indices.lock().lookup_exact(qualified, ignore_case)
    }

    /// Qualified name remembered for a bare type name.
    pub fn lookup_bare(&self, bare: &str, ignore_case: bool) -> Option<String> {
        let indices = self.indices.lock();
        let found = if ignore_case {
            indices.by_bare_ci.get(&bare.to_lowercase())
        } else {
            indices.by_bare.get(bare)
        };
        found.map(|qualified| qualified.to_string())
    }

    /// Record `module` as scanned. Returns `false` if it already was.
    pub fn mark_module_loaded(&self, module: &ModuleIdentity) -> bool {
        self.indices.lock().mark_loaded(module)
    }

    /// True if any module with this canonical name has been scanned.
    ///
    /// Accepts a full name too; version metadata is stripped first.
    pub fn is_module_loaded(&self, module: &str) -> bool {
        self.indices
            .lock()
            .loaded_canonical
            .contains(name::canonical_module(module))
    }

    /// `full = true` clears every index at once; `full = false` does nothing.
    pub fn reset(&self, full: bool) {
        if full {
            self.indices.lock().clear();
            log::debug!("[Registry] all indices cleared");
        }
    }

    /// Remember `ty` under an extra lookup key.
    ///
    /// Used for reconstructed array and generic names and for host hits.
    /// A case-insensitive resolution only feeds the case-insensitive alias
    /// index, so it never makes a wrong-case name resolve case-sensitively.
    /// First write wins; the descriptor now stored under `key` is returned.
    pub fn cache_alias(&self, key: &str, ty: TypeDescriptor, ignore_case: bool) -> TypeDescriptor {
        let mut indices = self.indices.lock();
        let folded = indices
            .aliases_ci
            .entry(key.to_lowercase())
            .or_insert_with(|| ty.clone())
            .clone();
        if ignore_case {
            return folded;
        }
        indices.aliases.entry(key.to_string()).or_insert(ty).clone()
    }

    /// Bumped by every full reset; a memo computed under an older
    /// generation is stale.
    pub fn generation(&self) -> u64 {
        self.indices.lock().generation
    }

    /// Full names of every scanned module, sorted.
    pub fn loaded_modules(&self) -> Vec<String> {
        let mut modules: Vec<String> = self
            .indices
            .lock()
            .loaded
            .iter()
            .map(|name| name.to_string())
            .collect();
        modules.sort();
        modules
    }

    /// First full name registered for a canonical module name.
    pub fn full_module_name(&self, canonical: &str) -> Option<String> {
        self.indices
            .lock()
            .module_full_names
            .get(canonical)
            .map(|name| name.to_string())
    }

    /// Every registered type, sorted by qualified name.
    pub fn types(&self) -> Vec<TypeDescriptor> {
        let mut types: Vec<TypeDescriptor> =
            self.indices.lock().by_qualified.values().cloned().collect();
        types.sort();
        types
    }

    /// Types of one module (canonical or full name), sorted by qualified name.
    pub fn types_of_module(&self, module: &str) -> Vec<TypeDescriptor> {
        self.indices
            .lock()
            .by_module
            .get(name::canonical_module(module))
            .map(|types| types.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.indices.lock().by_qualified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Memoized implementors of `capability`, if computed.
    pub fn implementors(&self, capability: &TypeDescriptor) -> Option<Arc<[TypeDescriptor]>> {
        self.indices.lock().by_capability.get(capability).cloned()
    }

    /// Memoize implementors of `capability`, computed at `generation`.
    ///
    /// If another thread memoized first, its result is kept and returned.
    /// Nothing is stored when the indices were reset since `generation`.
    pub fn memoize_implementors(
        &self,
        capability: &TypeDescriptor,
        implementors: Vec<TypeDescriptor>,
        generation: u64,
    ) -> Arc<[TypeDescriptor]> {
        let mut indices = self.indices.lock();
        if indices.generation != generation {
            return implementors.into();
        }
        Arc::clone(
            indices
                .by_capability
                .entry(capability.clone())
                .or_insert_with(|| implementors.into()),
        )
    }

    /// Claim modules for scanning.
    ///
    /// Under one lock: optionally clear every index, then mark each module
    /// loaded. Returns the modules this caller must scan: those not loaded
    /// before, or all of them when `force` is set.
    pub(crate) fn claim(
        &self,
        modules: &[ModuleIdentity],
        force: bool,
        clear: bool,
    ) -> Vec<ModuleIdentity> {
        let mut indices = self.lock_indices();
        if clear {
            indices.clear();
        }

        modules
            .iter()
            .filter(|module| indices.mark_loaded(module) || force)
            .cloned()
            .collect()
    }

    /// Merge scan results in one critical section. Returns the number of new types.
    pub(crate) fn merge(&self, scanned: &[ScannedModule]) -> usize {
        let mut indices = self.lock_indices();
        scanned
            .iter()
            .flat_map(|(module, types)| types.iter().map(move |ty| (module, ty)))
            .filter(|(module, ty)| indices.insert(module, (*ty).clone()))
            .count()
    }

    fn lock_indices(&self) -> MutexGuard<'_, Indices> {
        self.indices.lock()
    }
}
