//! The per-call pipeline.
//!
//! ```text
//!   Idle ──load──▶ SnapshotLoaded ──resolve──▶ Resolved ──invoke──▶ Invoked
//!     │                  │                                        ┌───┴───┐
//!     │ load fault       │ resolve fault (discard)        success │       │ fault
//!     ▼                  ▼                                (commit)▼       ▼ (discard)
//!   RolledBack ◀─────────┘                               Committed    RolledBack
//! ```
//!
//! Every call reaches exactly one terminal state and no state is
//! revisited. The committed snapshot changes only on the `Committed` path,
//! and there only through the store's atomic replace.

use std::collections::HashSet;

use floe_snapshot::SnapshotStore;
use floe_vm::{CallContext, ExecutionLimits, InvocationEngine};
use parking_lot::Mutex;

use crate::exports::ExportTable;
use crate::fault::{Fault, FaultKind};
use crate::registry::FunctionRegistry;

/// Terminal state of one dispatched call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The function ran to completion and its state was committed.
    Committed(Vec<u8>),
    /// The call faulted at some stage; the committed snapshot is exactly
    /// what it was before the call.
    RolledBack(Fault),
}

impl CallOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CallOutcome::Committed(_))
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            CallOutcome::Committed(payload) => Some(payload),
            CallOutcome::RolledBack(_) => None,
        }
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            CallOutcome::Committed(_) => None,
            CallOutcome::RolledBack(fault) => Some(fault),
        }
    }

    pub fn into_result(self) -> Result<Vec<u8>, Fault> {
        match self {
            CallOutcome::Committed(payload) => Ok(payload),
            CallOutcome::RolledBack(fault) => Err(fault),
        }
    }
}

/// Everything one call produced: terminal outcome plus the log lines the
/// contract emitted along the way (kept on the fault path too).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReceipt {
    pub module: String,
    pub function: String,
    pub logs: Vec<String>,
    pub outcome: CallOutcome,
}

/// Sequences load, resolve, invoke and commit-or-rollback for each call.
///
/// The bridge assumes the host serializes calls per module; if it is ever
/// re-entered for a module whose prior call has not reached a terminal
/// state it fails that call fast with `ConcurrentAccess` instead of
/// locking, since queueing behind a mutex would hide a broken host.
#[derive(Debug)]
pub struct DispatchBridge {
    store: SnapshotStore,
    exports: ExportTable,
    engine: InvocationEngine,
    in_flight: Mutex<HashSet<String>>,
}

impl DispatchBridge {
    pub fn new(store: SnapshotStore, exports: ExportTable) -> Self {
        Self::with_limits(store, exports, ExecutionLimits::default())
    }

    pub fn with_limits(store: SnapshotStore, exports: ExportTable, limits: ExecutionLimits) -> Self {
        DispatchBridge {
            store,
            exports,
            engine: InvocationEngine::with_limits(limits),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    /// Runs `module::function` against the committed snapshot.
    ///
    /// Never panics and never returns early: every path lands on a
    /// receipt with exactly one terminal outcome.
    pub fn dispatch(
        &self,
        module: &str,
        function: &str,
        input: &[u8],
        context: &CallContext,
    ) -> CallReceipt {
        log::debug!("dispatch `{module}::{function}`: begin");
        let receipt = |logs, outcome| CallReceipt {
            module: module.to_owned(),
            function: function.to_owned(),
            logs,
            outcome,
        };

        let _guard = match InFlightGuard::enter(&self.in_flight, module) {
            Ok(guard) => guard,
            Err(fault) => {
                log::warn!("dispatch `{module}::{function}`: rolled back, {fault}");
                return receipt(Vec::new(), CallOutcome::RolledBack(fault));
            }
        };

        let (outcome, logs) = self.run_call(module, function, input, context);
        match &outcome {
            CallOutcome::Committed(payload) => {
                log::debug!(
                    "dispatch `{module}::{function}`: committed, {} byte(s)",
                    payload.len()
                );
            }
            CallOutcome::RolledBack(fault) => {
                log::warn!("dispatch `{module}::{function}`: rolled back, {fault}");
            }
        }
        receipt(logs, outcome)
    }

    fn run_call(
        &self,
        module: &str,
        function: &str,
        input: &[u8],
        context: &CallContext,
    ) -> (CallOutcome, Vec<String>) {
        let mut snapshot = match self.store.load(module) {
            Ok(snapshot) => snapshot,
            Err(err) => return (CallOutcome::RolledBack(Fault::from(err)), Vec::new()),
        };
        log::debug!("dispatch `{module}::{function}`: snapshot loaded");

        let registry = FunctionRegistry::build(module, &self.exports, snapshot.state().program());
        let entry = match registry.resolve(function) {
            Ok(entry) => entry.clone(),
            Err(fault) => {
                self.store.discard(snapshot);
                return (CallOutcome::RolledBack(fault), Vec::new());
            }
        };
        log::debug!(
            "dispatch `{module}::{function}`: resolved to function index {}",
            entry.index
        );

        let loaded_checksum = snapshot.state().program().checksum();
        if entry.program_checksum != loaded_checksum {
            self.store.discard(snapshot);
            let fault = Fault::new(
                FaultKind::ExecutionFault,
                format!(
                    "entry for `{function}` was built for program {:#010x}, loaded {:#010x}",
                    entry.program_checksum, loaded_checksum
                ),
            );
            return (CallOutcome::RolledBack(fault), Vec::new());
        }

        let invoked = self
            .engine
            .invoke(snapshot.state_mut(), entry.index, input, context);
        let logs = invoked.logs;
        match invoked.result {
            Ok(payload) => match self.store.commit(snapshot) {
                Ok(()) => (CallOutcome::Committed(payload), logs),
                Err(err) => (CallOutcome::RolledBack(Fault::from(err)), logs),
            },
            Err(err) => {
                self.store.discard(snapshot);
                (CallOutcome::RolledBack(Fault::from(err)), logs)
            }
        }
    }
}

/// Marks a module as in flight for the duration of one call.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    module: String,
}

impl<'a> InFlightGuard<'a> {
    fn enter(set: &'a Mutex<HashSet<String>>, module: &str) -> Result<Self, Fault> {
        if !set.lock().insert(module.to_owned()) {
            return Err(Fault::concurrent_access(module));
        }
        Ok(InFlightGuard {
            set,
            module: module.to_owned(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.module);
    }
}
