//! Frozen-interpreter dispatch bridge for snapshot-backed contract modules.
//!
//! `floe` executes contract functions against module state that lives in
//! snapshot files. Every call follows one fixed path: load the module's
//! committed snapshot, resolve the function against the export registry,
//! run it on the stack interpreter, then commit the mutated state or roll
//! back to the committed bytes. A call either commits whole or leaves no
//! trace.
//!
//! The workspace splits along those seams:
//!
//! - [`io`] - Bounded binary readers and writers shared by every layer
//! - [`vm`] - Stack interpreter, frozen module state and argument
//!   marshalling
//! - [`snapshot`] - Checksummed envelope files and the atomic-commit store
//! - [`bridge`] - Export registry, fault taxonomy and the dispatch loop
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use floe::{CallContext, DispatchBridge, ExportTable, SnapshotStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SnapshotStore::open("/var/lib/floe")?;
//!     let exports = ExportTable::new()
//!         .with_module("betting", ["join_game", "get_players_count"]);
//!     let bridge = DispatchBridge::new(store, exports);
//!
//!     let context = CallContext::default();
//!     let receipt = bridge.dispatch("betting", "get_players_count", b"", &context);
//!     println!("{:?}", receipt.outcome);
//!     Ok(())
//! }
//! ```

// Re-export the member crates under short aliases
pub use floe_bridge as bridge;
pub use floe_io as io;
pub use floe_snapshot as snapshot;
pub use floe_vm as vm;

pub use floe_bridge::{
    run_export, CallOutcome, CallReceipt, DispatchBridge, ExportTable, Fault, FaultKind,
    FunctionRegistry, HostInterface,
};
pub use floe_snapshot::{Snapshot, SnapshotStore, StoreError};
pub use floe_vm::{CallContext, ExecutionLimits, ModuleState, Program, VmError};

/// Common imports for embedders
pub mod prelude {
    pub use crate::{
        CallContext, CallOutcome, CallReceipt, DispatchBridge, ExportTable, Fault, FaultKind,
        ModuleState, SnapshotStore,
    };
}
