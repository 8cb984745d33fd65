// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS Type Cache
//!
//! Concurrent registry that resolves human-readable type names to runtime type
//! descriptors, and keeps itself current while the host runtime keeps loading
//! new code modules.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use hdds_typecache::host::memory::InMemoryHost;
//! use hdds_typecache::{ModuleIdentity, ResolveOptions, TypeCache, TypeDescriptor};
//!
//! let host = Arc::new(InMemoryHost::new());
//! host.add_module(
//!     ModuleIdentity::new("app, Version=1.0.0.0"),
//!     vec![TypeDescriptor::named("app", "Customer")],
//! );
//!
//! let cache = TypeCache::new(host.clone()).unwrap();
//! let customer = cache.get_type("Customer, app").unwrap().unwrap();
//! let customers = cache.resolve("Customer[]", &ResolveOptions::new()).unwrap().unwrap();
//! assert_eq!(customers.element(), Some(&customer));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! host notification --> Coordinator --(Idle/Scanning + delay queue)--+
//!                                                                    v
//! Resolver --(targeted pass)--> BulkInitializer --> ModuleScanner --> Host
//!     |                              |                  |
//!     |                              v                  v
//!     +--------------------> RegistryCore        ExclusionPolicy
//!                             (one lock)
//!                                    |
//!                                    v
//!                      ListenerSet (after commit + unlock)
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TypeCache`] | Entry point; one per host |
//! | [`TypeDescriptor`] | Shared handle to a resolved type |
//! | [`ResolveOptions`] | Case sensitivity, initialization, module hint |
//! | [`Host`] | Host runtime interface (module enumeration, notifications) |
//! | [`ModuleLoadListener`] | Receives "module loaded" events |
//! | [`TypeCacheConfig`] | TOML-loadable settings |

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod descriptor;
pub mod error;
pub mod exclusion;
pub mod host;
pub mod initializer;
pub mod listener;
pub mod name;
pub mod registry;
pub mod resolver;
pub mod scanner;

pub use cache::{TypeCache, TypeCacheBuilder};
pub use config::{ConfigError, TypeCacheConfig};
pub use descriptor::{ModuleIdentity, TypeDescriptor, TypeKind};
pub use error::{Error, Result};
pub use exclusion::{ExclusionPolicy, ModuleFilter, TypeFilter};
pub use host::{Enumeration, Host, ModuleLoadCallback, SubscriptionId};
pub use listener::{ClosureListener, ListenerId, ModuleLoadListener, ModuleLoadedEvent};
pub use resolver::{LookupStats, ResolveOptions, MAX_NESTING};
