//! The host boundary.

use floe_vm::CallContext;

use crate::dispatch::{CallOutcome, DispatchBridge};

/// What the bridge needs from its embedding host.
///
/// Argument bytes come from a host-owned input buffer rather than the
/// function signature, and results flow back through host callbacks; the
/// bridge itself never touches process-global state.
pub trait HostInterface {
    /// Argument bytes for the current call.
    fn input(&self) -> Vec<u8>;

    /// Caller identity, attached deposit and block timestamp for the
    /// current call.
    fn call_context(&self) -> CallContext;

    /// Receives the result payload of a committed call.
    fn return_value(&mut self, bytes: &[u8]);

    /// Receives each log line the call emitted, in order, on success and
    /// failure alike.
    fn log(&mut self, line: &str);

    /// Receives the fault message of a rolled-back call.
    fn abort(&mut self, message: &str);
}

/// The one generic entry point every generated export stub forwards to.
///
/// Returns whether the call committed.
pub fn run_export(
    bridge: &DispatchBridge,
    host: &mut dyn HostInterface,
    module: &str,
    function: &str,
) -> bool {
    let input = host.input();
    let context = host.call_context();
    let receipt = bridge.dispatch(module, function, &input, &context);

    for line in &receipt.logs {
        host.log(line);
    }
    match &receipt.outcome {
        CallOutcome::Committed(payload) => {
            host.return_value(payload);
            true
        }
        CallOutcome::RolledBack(fault) => {
            host.abort(&fault.to_string());
            false
        }
    }
}
