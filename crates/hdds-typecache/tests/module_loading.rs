// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Module-load notification tests: reentrancy, concurrency, events.

use hdds_typecache::host::memory::{InMemoryHost, ScanBehavior};
use hdds_typecache::{
    ClosureListener, ModuleIdentity, ModuleLoadedEvent, TypeCache, TypeCacheConfig, TypeDescriptor,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Weak};
use std::thread;

fn module(name: &str) -> ModuleIdentity {
    ModuleIdentity::new(&format!("{}, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null", name))
}

fn types_for(name: &str, count: usize) -> Vec<TypeDescriptor> {
    (0..count)
        .map(|i| TypeDescriptor::named(name, &format!("{}.Type{}", name, i)))
        .collect()
}

/// Records the canonical name of every announced module.
fn recorder(cache: &TypeCache) -> Arc<Mutex<Vec<String>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    cache.add_listener(Arc::new(ClosureListener::new(move |event: &ModuleLoadedEvent| {
        events_clone.lock().push(event.module.name().to_string());
    })));
    events
}

#[test]
fn notification_loads_module_and_announces_it() {
    let host = Arc::new(InMemoryHost::new());
    let cache = TypeCache::new(host.clone()).unwrap();
    let events = recorder(&cache);

    host.load_module(module("plugin"), types_for("plugin", 3));

    assert!(cache.is_module_loaded("plugin"));
    assert_eq!(*events.lock(), vec!["plugin".to_string()]);
    assert!(cache.get_type("plugin.Type2, plugin").unwrap().is_some());
}

#[test]
fn reentrant_notification_is_deferred_not_dropped() {
    let host = Arc::new(InMemoryHost::new());
    let cache = TypeCache::new(host.clone()).unwrap();
    let events = recorder(&cache);

    // While "outer" is being enumerated, the host loads "inner".
    let weak_host: Weak<InMemoryHost> = Arc::downgrade(&host);
    let fired = Arc::new(AtomicBool::new(false));
    let fired_clone = Arc::clone(&fired);
    host.on_enumerate(move |scanned: &ModuleIdentity| {
        if scanned.name() == "outer" && !fired_clone.swap(true, Ordering::SeqCst) {
            if let Some(host) = weak_host.upgrade() {
                host.load_module(module("inner"), types_for("inner", 2));
            }
        }
    });

    host.load_module(module("outer"), types_for("outer", 2));

    assert!(fired.load(Ordering::SeqCst));
    assert!(cache.is_module_loaded("outer"));
    assert!(cache.is_module_loaded("inner"));
    assert_eq!(*events.lock(), vec!["outer".to_string(), "inner".to_string()]);
    assert_eq!(host.scan_count(module("inner").full_name()), 1);
    assert!(cache.get_type("inner.Type1, inner").unwrap().is_some());
}

#[test]
fn notification_during_seeding_is_processed() {
    let host = Arc::new(InMemoryHost::new());
    host.add_module(module("base"), types_for("base", 2));

    let weak_host: Weak<InMemoryHost> = Arc::downgrade(&host);
    let fired = Arc::new(AtomicBool::new(false));
    let fired_clone = Arc::clone(&fired);
    host.on_enumerate(move |_scanned: &ModuleIdentity| {
        if !fired_clone.swap(true, Ordering::SeqCst) {
            if let Some(host) = weak_host.upgrade() {
                host.load_module(module("late"), types_for("late", 1));
            }
        }
    });

    let cache = TypeCache::new(host.clone()).unwrap();

    assert!(cache.is_module_loaded("base"));
    assert!(cache.is_module_loaded("late"));
    assert_eq!(cache.registry().len(), 3);
}

#[test]
fn listener_may_query_and_load_modules() {
    let host = Arc::new(InMemoryHost::new());
    let cache = Arc::new(TypeCache::new(host.clone()).unwrap());
    let events = recorder(&cache);

    let weak_cache: Weak<TypeCache> = Arc::downgrade(&cache);
    let weak_host: Weak<InMemoryHost> = Arc::downgrade(&host);
    let visible = Arc::new(AtomicBool::new(false));
    let visible_clone = Arc::clone(&visible);
    cache.add_listener(Arc::new(ClosureListener::new(move |event: &ModuleLoadedEvent| {
        let (Some(cache), Some(host)) = (weak_cache.upgrade(), weak_host.upgrade()) else {
            return;
        };
        if event.module.name() == "first" {
            // Committed state is visible to listeners.
            let all_visible = event.types.iter().all(|ty| {
                cache
                    .registry()
                    .lookup_exact(ty.qualified_name(), false)
                    .is_some()
            });
            visible_clone.store(all_visible, Ordering::SeqCst);
            host.load_module(module("second"), types_for("second", 1));
        }
    })));

    host.load_module(module("first"), types_for("first", 4));

    assert!(visible.load(Ordering::SeqCst));
    assert!(cache.is_module_loaded("second"));
    assert_eq!(*events.lock(), vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn concurrent_notifications_are_all_processed_once() {
    let host = Arc::new(InMemoryHost::new());
    let cache = TypeCache::new(host.clone()).unwrap();
    let events = recorder(&cache);

    let threads = 8;
    let per_thread = 10;
    let barrier = Arc::new(Barrier::new(threads));
    let mut handles = Vec::new();

    for t in 0..threads {
        let host = Arc::clone(&host);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..per_thread {
                let name = format!("m{}_{}", t, i);
                host.load_module(module(&name), types_for(&name, 1 + fastrand::usize(..4)));
                // Duplicate delivery of the same module is harmless.
                if fastrand::bool() {
                    host.load_module(module(&name), types_for(&name, 1));
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("thread should succeed");
    }

    let mut seen = events.lock().clone();
    assert_eq!(seen.len(), threads * per_thread);
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), threads * per_thread);
    assert_eq!(cache.loaded_modules().len(), threads * per_thread);
    assert!(!cache.registry().types_of_module("m3_7").is_empty());
}

#[test]
fn duplicate_notification_emits_no_second_event() {
    let host = Arc::new(InMemoryHost::new());
    let cache = TypeCache::new(host.clone()).unwrap();
    let events = recorder(&cache);

    host.load_module(module("plugin"), types_for("plugin", 1));
    cache.notify_module_loaded(&module("plugin"));

    assert_eq!(events.lock().len(), 1);
    assert_eq!(host.scan_count(module("plugin").full_name()), 1);
}

#[test]
fn ignored_modules_are_never_announced() {
    let host = Arc::new(InMemoryHost::new());
    let cache = TypeCache::new(host.clone()).unwrap();
    let events = recorder(&cache);

    host.load_module(ModuleIdentity::dynamic("proxy.gen"), types_for("proxy.gen", 3));
    host.load_module(
        ModuleIdentity::new("Anonymously Hosted DynamicMethods Assembly, Version=0.0.0.0"),
        Vec::new(),
    );

    assert!(events.lock().is_empty());
    assert!(cache.registry().is_empty());
    assert_eq!(host.total_scans(), 0);
}

#[test]
fn broken_modules_degrade_without_blocking_others() {
    let host = Arc::new(InMemoryHost::new());
    host.add_module(module("good"), types_for("good", 2));
    host.add_module(module("partial"), types_for("partial", 3));
    host.add_module(module("failed"), types_for("failed", 3));
    host.add_module(module("panicky"), types_for("panicky", 3));
    host.set_behavior(module("partial").full_name(), ScanBehavior::Partial { skipped: 5 });
    host.set_behavior(module("failed").full_name(), ScanBehavior::Fail("bad image".into()));
    host.set_behavior(module("panicky").full_name(), ScanBehavior::Panic);
    host.set_direct_lookup(false);

    let cache = TypeCache::new(host.clone()).unwrap();

    assert_eq!(cache.loaded_modules().len(), 4);
    assert_eq!(cache.types_of_module("good").len(), 2);
    assert_eq!(cache.types_of_module("partial").len(), 3);
    assert!(cache.types_of_module("failed").is_empty());
    assert!(cache.types_of_module("panicky").is_empty());

    // Failed modules stay marked loaded and are not retried.
    assert!(cache.get_type("failed.Type0, failed").unwrap().is_none());
    assert_eq!(host.scan_count(module("failed").full_name()), 1);
}

#[test]
fn unsubscribed_cache_ignores_host_notifications() {
    let host = Arc::new(InMemoryHost::new());
    let config = TypeCacheConfig {
        subscribe_to_host: false,
        ..Default::default()
    };
    let cache = TypeCache::builder(host.clone()).config(config).build().unwrap();

    host.load_module(module("plugin"), types_for("plugin", 1));
    assert!(!cache.is_module_loaded("plugin"));

    cache.notify_module_loaded(&module("plugin"));
    assert!(cache.is_module_loaded("plugin"));
}

#[test]
fn dropped_cache_stops_listening() {
    let host = Arc::new(InMemoryHost::new());
    let cache = TypeCache::new(host.clone()).unwrap();
    assert_eq!(host.subscriber_count(), 1);
    drop(cache);

    assert_eq!(host.subscriber_count(), 0);
    host.load_module(module("plugin"), types_for("plugin", 1));
    assert_eq!(host.total_scans(), 0);
}
