//! The closed fault taxonomy surfaced to the host.

use std::fmt;

use floe_snapshot::StoreError;
use floe_vm::VmError;
use thiserror::Error;

pub type BridgeResult<T> = Result<T, Fault>;

/// Which stage of the call pipeline failed.
///
/// Every fault is terminal for its call and none are retryable: the system
/// is deterministic, so an unchanged call repeats its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// No committed snapshot for the requested module.
    NotFound,
    /// The snapshot failed an integrity or decoding check.
    Corrupt,
    /// The function name is not among the module's exports.
    UnknownFunction,
    /// Argument bytes did not match the declared signature.
    ArgumentMismatch,
    /// The function began executing and faulted, or its result could not
    /// be committed.
    ExecutionFault,
    /// The bridge was re-entered for a module whose prior call has not
    /// reached a terminal state.
    ConcurrentAccess,
}

impl FaultKind {
    pub fn name(self) -> &'static str {
        match self {
            FaultKind::NotFound => "NotFound",
            FaultKind::Corrupt => "Corrupt",
            FaultKind::UnknownFunction => "UnknownFunction",
            FaultKind::ArgumentMismatch => "ArgumentMismatch",
            FaultKind::ExecutionFault => "ExecutionFault",
            FaultKind::ConcurrentAccess => "ConcurrentAccess",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The single failure shape the host ever sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Fault {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_function(module: &str, function: &str) -> Self {
        Fault::new(
            FaultKind::UnknownFunction,
            format!("module `{module}` does not export `{function}`"),
        )
    }

    pub fn concurrent_access(module: &str) -> Self {
        Fault::new(
            FaultKind::ConcurrentAccess,
            format!("a call against module `{module}` is already in flight"),
        )
    }
}

impl From<StoreError> for Fault {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::NotFound { .. } => FaultKind::NotFound,
            StoreError::Corrupt { .. } => FaultKind::Corrupt,
            // Write-path failures: the prior committed snapshot is intact,
            // only this call failed.
            StoreError::AlreadyExists { .. } | StoreError::Io { .. } => FaultKind::ExecutionFault,
        };
        Fault::new(kind, err.to_string())
    }
}

impl From<VmError> for Fault {
    fn from(err: VmError) -> Self {
        let kind = match &err {
            VmError::Argument { .. } => FaultKind::ArgumentMismatch,
            _ => FaultKind::ExecutionFault,
        };
        // Contract-raised faults surface exactly the message the contract
        // chose; interpreter faults keep their diagnostic rendering.
        let message = match err {
            VmError::Aborted { message } | VmError::AssertionFailed { message } => message,
            other => other.to_string(),
        };
        Fault::new(kind, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_onto_the_taxonomy() {
        let fault = Fault::from(StoreError::not_found("betting"));
        assert_eq!(fault.kind, FaultKind::NotFound);

        let fault = Fault::from(StoreError::corrupt("betting", "checksum mismatch"));
        assert_eq!(fault.kind, FaultKind::Corrupt);
        assert!(fault.message.contains("checksum mismatch"));
    }

    #[test]
    fn contract_raised_messages_surface_verbatim() {
        let fault = Fault::from(VmError::AssertionFailed {
            message: "no payout available".into(),
        });
        assert_eq!(fault.kind, FaultKind::ExecutionFault);
        assert_eq!(fault.message, "no payout available");
    }

    #[test]
    fn argument_errors_are_argument_mismatch() {
        let fault = Fault::from(VmError::argument("missing argument `team`"));
        assert_eq!(fault.kind, FaultKind::ArgumentMismatch);
    }

    #[test]
    fn interpreter_faults_keep_their_rendering() {
        let fault = Fault::from(VmError::DivisionByZero);
        assert_eq!(fault.kind, FaultKind::ExecutionFault);
        assert_eq!(fault.message, "division by zero");
    }
}
