// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type and module identities.
//!
//! A [`TypeDescriptor`] is a cheap, shareable handle (`Arc`) identified by its
//! owning module's canonical name and its bare type name. Descriptors are
//! immutable once built and are cached indefinitely by the registry.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::name;

/// Structural shape of a type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Plain named type.
    Named,
    /// Array whose elements are the given type.
    Array(TypeDescriptor),
    /// Open generic definition (`Map<,>`).
    GenericDefinition { arity: usize },
    /// Generic definition closed over concrete arguments.
    Generic {
        definition: TypeDescriptor,
        arguments: Vec<TypeDescriptor>,
    },
}

#[derive(Debug)]
struct DescriptorInner {
    module: Arc<str>,
    name: Arc<str>,
    qualified: Arc<str>,
    kind: TypeKind,
    capability: bool,
    satisfies: Vec<Arc<str>>,
}

/// Shared handle to a resolved type.
///
/// Equality and hashing use `(module, name)` only, so two handles built
/// independently for the same type compare equal. Use [`TypeDescriptor::ptr_eq`]
/// to check that two handles are the very same cached instance.
#[derive(Clone)]
pub struct TypeDescriptor {
    inner: Arc<DescriptorInner>,
}

impl TypeDescriptor {
    fn from_parts(
        module: &str,
        name: &str,
        kind: TypeKind,
        capability: bool,
        satisfies: Vec<Arc<str>>,
    ) -> Self {
        let module = name::canonical_module(module);
        let name = name.trim();
        Self {
            inner: Arc::new(DescriptorInner {
                module: module.into(),
                name: name.into(),
                qualified: name::qualify(name, module).into(),
                kind,
                capability,
                satisfies,
            }),
        }
    }

    /// Plain named type living in `module`.
    #[must_use]
    pub fn named(module: &str, name: &str) -> Self {
        Self::from_parts(module, name, TypeKind::Named, false, Vec::new())
    }

    /// Capability (interface) that other types may satisfy.
    #[must_use]
    pub fn capability(module: &str, name: &str) -> Self {
        Self::from_parts(module, name, TypeKind::Named, true, Vec::new())
    }

    /// Open generic definition, named `base<,..>` after its arity.
    #[must_use]
    pub fn generic_definition(module: &str, base: &str, arity: usize) -> Self {
        Self::from_parts(
            module,
            &name::open_generic_name(base, arity),
            TypeKind::GenericDefinition { arity },
            false,
            Vec::new(),
        )
    }

    /// Array of `element`, owned by the element's module.
    #[must_use]
    pub fn array_of(element: &TypeDescriptor) -> Self {
        Self::from_parts(
            element.module(),
            &format!("{}[]", element.name()),
            TypeKind::Array(element.clone()),
            false,
            Vec::new(),
        )
    }

    /// Close `definition` over `arguments`.
    ///
    /// Returns `None` when `definition` is not an open generic definition or
    /// when the argument count does not match its arity.
    #[must_use]
    pub fn closed_generic(definition: &TypeDescriptor, arguments: &[TypeDescriptor]) -> Option<Self> {
        let TypeKind::GenericDefinition { arity } = definition.kind() else {
            return None;
        };
        if *arity != arguments.len() {
            return None;
        }

        let base = definition
            .name()
            .split('<')
            .next()
            .unwrap_or_else(|| definition.name());
        let rendered: Vec<String> = arguments
            .iter()
            .map(|arg| format!("[{}]", arg.qualified_name()))
            .collect();

        Some(Self::from_parts(
            definition.module(),
            &format!("{}<{}>", base, rendered.join(",")),
            TypeKind::Generic {
                definition: definition.clone(),
                arguments: arguments.to_vec(),
            },
            definition.is_capability(),
            definition.inner.satisfies.clone(),
        ))
    }

    /// Declare the capabilities (qualified names) this type satisfies.
    #[must_use]
    pub fn satisfying<I, S>(self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut satisfies = self.inner.satisfies.clone();
        satisfies.extend(capabilities.into_iter().map(|cap| Arc::from(cap.as_ref().trim())));
        Self::from_parts(
            &self.inner.module,
            &self.inner.name,
            self.inner.kind.clone(),
            self.inner.capability,
            satisfies,
        )
    }

    /// Canonical name of the owning module.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Bare type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// `"<name>, <module>"`.
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.inner.qualified
    }

    #[must_use]
    pub fn kind(&self) -> &TypeKind {
        &self.inner.kind
    }

    #[must_use]
    pub fn is_capability(&self) -> bool {
        self.inner.capability
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self.inner.kind, TypeKind::Array(_))
    }

    #[must_use]
    pub fn is_generic(&self) -> bool {
        matches!(
            self.inner.kind,
            TypeKind::Generic { .. } | TypeKind::GenericDefinition { .. }
        )
    }

    /// Element type for arrays.
    #[must_use]
    pub fn element(&self) -> Option<&TypeDescriptor> {
        match &self.inner.kind {
            TypeKind::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Qualified names of the capabilities this type satisfies.
    #[must_use]
    pub fn capabilities(&self) -> &[Arc<str>] {
        &self.inner.satisfies
    }

    /// True if this type declares `capability` among its capabilities.
    #[must_use]
    pub fn satisfies(&self, capability: &TypeDescriptor) -> bool {
        self.inner
            .satisfies
            .iter()
            .any(|cap| cap.as_ref() == capability.qualified_name())
    }

    /// True if both handles point at the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.inner.module == other.inner.module && self.inner.name == other.inner.name
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.module.hash(state);
        self.inner.name.hash(state);
    }
}

impl PartialOrd for TypeDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.qualified.cmp(&other.inner.qualified)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeDescriptor")
            .field(&self.qualified_name())
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.qualified_name())
    }
}

/// A loaded unit of code.
///
/// Identified by its full (versioned) name; [`ModuleIdentity::name`] is the
/// canonical form used to key types. Modules sharing a canonical name are the
/// same logical module for indexing purposes.
#[derive(Clone)]
pub struct ModuleIdentity {
    name: Arc<str>,
    full_name: Arc<str>,
    dynamic: bool,
}

impl ModuleIdentity {
    /// Module with the given full name (`"app, Version=1.0.0.0, ..."` or just `"app"`).
    #[must_use]
    pub fn new(full_name: &str) -> Self {
        let full_name = full_name.trim();
        Self {
            name: name::canonical_module(full_name).into(),
            full_name: full_name.into(),
            dynamic: false,
        }
    }

    /// Module generated at runtime; never scanned.
    #[must_use]
    pub fn dynamic(full_name: &str) -> Self {
        Self {
            dynamic: true,
            ..Self::new(full_name)
        }
    }

    /// Canonical name (version/culture/key stripped).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

impl PartialEq for ModuleIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
    }
}

impl Eq for ModuleIdentity {}

impl Hash for ModuleIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_name.hash(state);
    }
}

impl fmt::Debug for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleIdentity")
            .field("full_name", &self.full_name)
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}
