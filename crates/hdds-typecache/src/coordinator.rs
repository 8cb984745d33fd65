// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Module-load coordination.
//!
//! [`ScanGate`] is a two-state machine (Idle / Scanning) with a FIFO delay
//! queue. Every scan pass enters the gate. A notification that arrives while
//! any pass is in flight is queued and the notifier returns immediately; the
//! pass that leaves the gate last drains the queue before going Idle, so no
//! notification is lost and none is processed recursively.
//!
//! [`Coordinator`] bridges host notifications to the bulk initializer.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use crate::descriptor::ModuleIdentity;
use crate::host::{Host, ModuleLoadCallback, SubscriptionId};
use crate::initializer::BulkInitializer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// `active` passes are in flight.
    Scanning { active: usize },
}

struct GateState {
    phase: Phase,
    delayed: VecDeque<ModuleIdentity>,
}

/// Idle/Scanning state machine with a delay queue.
pub struct ScanGate {
    state: Mutex<GateState>,
}

impl Default for ScanGate {
    fn default() -> Self {
        Self {
            state: Mutex::new(GateState {
                phase: Phase::Idle,
                delayed: VecDeque::new(),
            }),
        }
    }
}

impl ScanGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the Scanning phase unconditionally (bulk passes).
    pub fn enter(&self) -> ScanPass<'_> {
        let mut state = self.state.lock();
        state.phase = match state.phase {
            Phase::Idle => Phase::Scanning { active: 1 },
            Phase::Scanning { active } => Phase::Scanning { active: active + 1 },
        };
        ScanPass {
            gate: self,
            finished: false,
        }
    }

    /// Enter the Scanning phase if Idle; otherwise queue `module`.
    ///
    /// Queued modules are deduplicated by full name.
    pub fn enter_or_defer(&self, module: &ModuleIdentity) -> Option<ScanPass<'_>> {
        let mut state = self.state.lock();
        match state.phase {
            Phase::Idle => {
                state.phase = Phase::Scanning { active: 1 };
                Some(ScanPass {
                    gate: self,
                    finished: false,
                })
            }
            Phase::Scanning { .. } => {
                if !state.delayed.contains(module) {
                    state.delayed.push_back(module.clone());
                }
                log::trace!("[Coordinator] scan in flight, deferring {}", module);
                None
            }
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().delayed.len()
    }

    fn leave(&self) {
        let mut state = self.state.lock();
        state.phase = match state.phase {
            Phase::Scanning { active } if active > 1 => Phase::Scanning { active: active - 1 },
            _ => Phase::Idle,
        };
    }
}

/// One pass through the gate. Leaving is tied to draining the queue.
pub struct ScanPass<'a> {
    gate: &'a ScanGate,
    finished: bool,
}

impl ScanPass<'_> {
    /// Next queued module, or `None` after leaving the gate.
    ///
    /// The empty-queue check and the phase transition happen under one lock,
    /// so a module queued concurrently is either returned here or observed by
    /// a pass that is still active.
    pub fn next_delayed(&mut self) -> Option<ModuleIdentity> {
        if self.finished {
            return None;
        }

        let mut state = self.gate.state.lock();
        if let Some(module) = state.delayed.pop_front() {
            return Some(module);
        }

        state.phase = match state.phase {
            Phase::Scanning { active } if active > 1 => Phase::Scanning { active: active - 1 },
            _ => Phase::Idle,
        };
        self.finished = true;
        None
    }
}

impl Drop for ScanPass<'_> {
    fn drop(&mut self) {
        // Not drained (unwind): queued modules wait for the next pass.
        if !self.finished {
            self.gate.leave();
        }
    }
}

/// Routes host module-load notifications into the bulk initializer.
pub struct Coordinator {
    initializer: Arc<BulkInitializer>,
    host: Arc<dyn Host>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl Coordinator {
    pub fn new(initializer: Arc<BulkInitializer>, host: Arc<dyn Host>) -> Self {
        Self {
            initializer,
            host,
            subscription: Mutex::new(None),
        }
    }

    /// Handle one module-load notification.
    ///
    /// Never blocks on an in-flight scan: the module is queued instead.
    pub fn notify(&self, module: &ModuleIdentity) {
        self.initializer.handle_notification(module);
    }

    /// Subscribe to host notifications. Returns `false` if the host has none.
    ///
    /// The callback holds a weak reference; notifications arriving after the
    /// initializer is dropped are ignored.
    pub fn subscribe(&self) -> bool {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return true;
        }

        let initializer: Weak<BulkInitializer> = Arc::downgrade(&self.initializer);
        let callback: ModuleLoadCallback = Arc::new(move |module: &ModuleIdentity| {
            if let Some(initializer) = initializer.upgrade() {
                initializer.handle_notification(module);
            }
        });

        *subscription = self.host.subscribe_module_loads(callback);
        if subscription.is_none() {
            log::debug!("[Coordinator] host provides no module-load notifications");
        }
        subscription.is_some()
    }

    pub fn unsubscribe(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.host.unsubscribe_module_loads(id);
        }
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
