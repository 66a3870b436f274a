//! Dispatch bridge for snapshot-backed contract modules.
//!
//! The bridge is the host's single door into a frozen module: given a
//! module identifier and a function name, it restores the committed
//! snapshot, resolves the name against the build-time export table,
//! invokes the function through `floe-vm`, and either commits the mutated
//! snapshot atomically or rolls the call back. Exactly one of those two
//! things happens per call, and a fault at any stage leaves the committed
//! snapshot byte-for-byte unchanged.

mod dispatch;
mod exports;
mod fault;
mod host;
mod registry;

pub use dispatch::{CallOutcome, CallReceipt, DispatchBridge};
pub use exports::ExportTable;
pub use fault::{BridgeResult, Fault, FaultKind};
pub use host::{run_export, HostInterface};
pub use registry::{FunctionEntry, FunctionRegistry};
