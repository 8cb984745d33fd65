// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host runtime interface.
//!
//! The host owns the loaded modules. It enumerates their types, resolves
//! literal qualified names, materializes array and generic types, and
//! (optionally) notifies subscribers when a new module becomes available.

pub mod memory;

use std::sync::Arc;

use crate::descriptor::{ModuleIdentity, TypeDescriptor};

/// Callback invoked by the host whenever a module becomes available.
///
/// May be invoked from any thread, including from inside an enumeration
/// already in progress.
pub type ModuleLoadCallback = Arc<dyn Fn(&ModuleIdentity) + Send + Sync>;

/// Token returned by [`Host::subscribe_module_loads`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Outcome of enumerating the types of one module.
#[derive(Debug, Clone)]
pub enum Enumeration {
    /// Every type loaded.
    Complete(Vec<TypeDescriptor>),
    /// Some types failed to load; `loaded` holds the rest.
    Partial {
        loaded: Vec<TypeDescriptor>,
        skipped: usize,
    },
    /// The module could not be enumerated at all.
    Failed(String),
}

impl Enumeration {
    /// Types that did load.
    #[must_use]
    pub fn into_loaded(self) -> Vec<TypeDescriptor> {
        match self {
            Self::Complete(types) | Self::Partial { loaded: types, .. } => types,
            Self::Failed(_) => Vec::new(),
        }
    }
}

/// Host runtime consumed by the type cache.
pub trait Host: Send + Sync {
    /// Modules currently loaded.
    fn loaded_modules(&self) -> Vec<ModuleIdentity>;

    /// Types declared in `module`.
    fn enumerate_types(&self, module: &ModuleIdentity) -> Enumeration;

    /// Direct lookup of a literal qualified name, bypassing the cache.
    fn resolve_qualified(&self, _name: &str, _ignore_case: bool) -> Option<TypeDescriptor> {
        None
    }

    /// Close an open generic definition over concrete arguments.
    fn construct_generic(
        &self,
        definition: &TypeDescriptor,
        arguments: &[TypeDescriptor],
    ) -> Option<TypeDescriptor> {
        TypeDescriptor::closed_generic(definition, arguments)
    }

    /// Array type of `element`.
    fn construct_array(&self, element: &TypeDescriptor) -> TypeDescriptor {
        TypeDescriptor::array_of(element)
    }

    /// Register a module-load callback.
    ///
    /// Hosts without notifications return `None`.
    fn subscribe_module_loads(&self, _callback: ModuleLoadCallback) -> Option<SubscriptionId> {
        None
    }

    fn unsubscribe_module_loads(&self, _id: SubscriptionId) {}
}
