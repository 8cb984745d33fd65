// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Module scanner.
//!
//! Turns a host [`Enumeration`] into the deduplicated, policy-filtered type
//! set of one module. Partial loads keep what loaded; failed or panicking
//! enumerations yield an empty set. Nothing is propagated to the caller.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::descriptor::{ModuleIdentity, TypeDescriptor};
use crate::exclusion::ExclusionPolicy;
use crate::host::{Enumeration, Host};

/// Scans modules through the host, filtering with the exclusion policy.
pub struct ModuleScanner {
    host: Arc<dyn Host>,
    policy: Arc<ExclusionPolicy>,
}

impl ModuleScanner {
    pub fn new(host: Arc<dyn Host>, policy: Arc<ExclusionPolicy>) -> Self {
        Self { host, policy }
    }

    /// Types of `module` that may enter the cache.
    pub fn scan(&self, module: &ModuleIdentity) -> Vec<TypeDescriptor> {
        let enumeration =
            match panic::catch_unwind(AssertUnwindSafe(|| self.host.enumerate_types(module))) {
                Ok(enumeration) => enumeration,
                Err(_) => {
                    log::debug!("[ModuleScanner] enumeration of {} panicked, skipping", module);
                    return Vec::new();
                }
            };

        let types = match enumeration {
            Enumeration::Complete(types) => types,
            Enumeration::Partial { loaded, skipped } => {
                log::debug!(
                    "[ModuleScanner] {} partially loaded ({} types skipped)",
                    module,
                    skipped
                );
                loaded
            }
            Enumeration::Failed(reason) => {
                log::debug!("[ModuleScanner] failed to enumerate {}: {}", module, reason);
                return Vec::new();
            }
        };

        let mut seen = HashSet::with_capacity(types.len());
        let kept: Vec<TypeDescriptor> = types
            .into_iter()
            .filter(|ty| seen.insert(ty.clone()))
            .filter(|ty| !self.policy.ignores_type(module, ty))
            .collect();

        log::trace!("[ModuleScanner] {} -> {} types", module, kept.len());
        kept
    }
}
