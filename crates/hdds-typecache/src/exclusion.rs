// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Exclusion policy: which modules and types never enter the cache.
//!
//! Built-in rules reject dynamically generated modules and compiler-synthesized
//! type names (closures, display classes, anonymous types, interop shims).
//! Configured substring patterns and caller predicates are consulted after the
//! built-in rules. Predicates are appended at setup time and are never invoked
//! while the registry lock is held.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::descriptor::{ModuleIdentity, TypeDescriptor};

/// Module-level exclusion predicate. Returns `true` to ignore the module.
pub type ModuleFilter = Arc<dyn Fn(&ModuleIdentity) -> bool + Send + Sync>;

/// Type-level exclusion predicate. Returns `true` to ignore the type.
pub type TypeFilter = Arc<dyn Fn(&ModuleIdentity, &TypeDescriptor) -> bool + Send + Sync>;

/// Modules emitted by the runtime for dynamic methods.
const DYNAMIC_METHODS_MODULE: &str = "Anonymously Hosted DynamicMethods Assembly";

/// Name fragments of compiler-synthesized or environment-internal types.
const DENYLIST: &[&str] = &[
    "<PrivateImplementationDetails>",
    "+<",
    "+_Closure",
    ".__",
    "Interop+",
    "c__DisplayClass",
    "d__",
    "f__AnonymousType",
    "o__",
    "__DynamicallyInvokableAttribute",
    "ProcessedByFody",
    "FXAssembly",
    "ThisAssembly",
    "AssemblyRef",
    "MS.Internal",
    "{{closure}}",
    "\\*",
    "_extraBytes_",
    "CppImplementationDetails",
    "System.Data.Metadata.Edm.",
    "System.Data.EntityModel.SchemaObjectModel.",
];

/// Module and type exclusion rules.
#[derive(Default)]
pub struct ExclusionPolicy {
    module_patterns: Vec<String>,
    type_patterns: Vec<String>,
    module_filters: RwLock<Vec<ModuleFilter>>,
    type_filters: RwLock<Vec<TypeFilter>>,
}

impl ExclusionPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy with additional substring patterns for module full names and
    /// type names.
    #[must_use]
    pub fn with_patterns(module_patterns: Vec<String>, type_patterns: Vec<String>) -> Self {
        Self {
            module_patterns,
            type_patterns,
            ..Self::default()
        }
    }

    pub fn add_module_filter(&self, filter: ModuleFilter) {
        self.module_filters.write().push(filter);
    }

    pub fn add_type_filter(&self, filter: TypeFilter) {
        self.type_filters.write().push(filter);
    }

    /// True if `module` must not be scanned.
    pub fn ignores_module(&self, module: &ModuleIdentity) -> bool {
        if module.is_dynamic() || module.full_name().contains(DYNAMIC_METHODS_MODULE) {
            return true;
        }

        if self
            .module_patterns
            .iter()
            .any(|pattern| module.full_name().contains(pattern.as_str()))
        {
            return true;
        }

        // Snapshot so a predicate may register further predicates.
        let filters = self.module_filters.read().clone();
        filters.iter().any(|filter| filter(module))
    }

    /// True if `ty`, declared in `module`, must not enter the cache.
    pub fn ignores_type(&self, module: &ModuleIdentity, ty: &TypeDescriptor) -> bool {
        let name = ty.name();
        if is_unprintable(name) {
            return true;
        }

        if DENYLIST.iter().any(|pattern| name.contains(pattern)) {
            return true;
        }

        if self
            .type_patterns
            .iter()
            .any(|pattern| name.contains(pattern.as_str()))
        {
            return true;
        }

        let filters = self.type_filters.read().clone();
        filters.iter().any(|filter| filter(module, ty))
    }
}

fn is_unprintable(name: &str) -> bool {
    name.trim().is_empty() || name.chars().any(char::is_control)
}
