//! Execution and marshalling errors.

use thiserror::Error;

/// Result alias used throughout the interpreter.
pub type VmResult<T> = Result<T, VmError>;

/// Everything that can go wrong while marshalling arguments or executing a
/// function against a frozen module state.
///
/// The set is closed on purpose: callers map [`VmError::Argument`] to an
/// argument fault and every other variant to an execution fault. Nothing
/// the interpreter does may unwind past its entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// Argument bytes did not match the function's declared signature.
    #[error("argument mismatch: {message}")]
    Argument { message: String },

    #[error("evaluation stack underflow")]
    StackUnderflow,

    #[error("evaluation stack overflow: limit {limit}")]
    StackOverflow { limit: usize },

    #[error("invocation depth limit {limit} exceeded")]
    CallDepthExceeded { limit: usize },

    #[error("step limit {limit} exhausted")]
    StepLimitExhausted { limit: u64 },

    #[error("item size {size} exceeds limit {limit}")]
    ItemTooLarge { size: usize, limit: usize },

    #[error("integer magnitude exceeds {max} bytes")]
    IntegerOverflow { max: usize },

    #[error("invalid opcode 0x{opcode:02X} at offset {offset}")]
    InvalidOpcode { opcode: u8, offset: usize },

    #[error("truncated instruction at offset {offset}")]
    TruncatedInstruction { offset: usize },

    #[error("instruction pointer {offset} outside script of length {len}")]
    IpOutOfBounds { offset: usize, len: usize },

    #[error("jump target {target} outside script bounds")]
    InvalidJump { target: i64 },

    #[error("relative jump distance {distance} does not fit in 16 bits")]
    JumpOutOfRange { distance: i64 },

    #[error("unknown function index {index}")]
    UnknownFunctionIndex { index: usize },

    #[error("unknown syscall 0x{id:08X}")]
    UnknownSyscall { id: u32 },

    #[error("division by zero")]
    DivisionByZero,

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("map key must be a scalar, found {found}")]
    UnhashableKey { found: &'static str },

    #[error("key not present in map")]
    KeyNotFound,

    #[error("index {index} out of range for {len} items")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("invalid local slot {slot}")]
    InvalidSlot { slot: u8 },

    #[error("invalid global slot {slot}")]
    InvalidGlobalSlot { slot: u8 },

    #[error("value nesting exceeds depth {limit}")]
    ValueTooDeep { limit: usize },

    #[error("write attempted in read-only call: {what}")]
    ReadOnlyWrite { what: &'static str },

    #[error("storage key length {len} exceeds {max}")]
    StorageKeyTooLong { len: usize, max: usize },

    #[error("storage value length {len} exceeds {max}")]
    StorageValueTooLong { len: usize, max: usize },

    #[error("log message is not valid utf-8")]
    InvalidLogMessage,

    #[error("aborted: {message}")]
    Aborted { message: String },

    #[error("assertion failed: {message}")]
    AssertionFailed { message: String },

    #[error("execution ended without the declared return value")]
    MissingReturnValue,

    #[error("panic during execution: {message}")]
    Panicked { message: String },

    #[error("internal interpreter error: {message}")]
    Internal { message: String },
}

impl VmError {
    /// Builds an [`VmError::Argument`] from any displayable message.
    pub fn argument(message: impl Into<String>) -> Self {
        VmError::Argument {
            message: message.into(),
        }
    }

    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        VmError::TypeMismatch { expected, found }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        VmError::Internal {
            message: message.into(),
        }
    }

    /// True for faults raised by explicit contract code (`ABORT*`/`ASSERT*`)
    /// rather than by the interpreter machinery.
    pub fn is_contract_raised(&self) -> bool {
        matches!(
            self,
            VmError::Aborted { .. } | VmError::AssertionFailed { .. }
        )
    }
}

impl From<floe_io::IoError> for VmError {
    fn from(err: floe_io::IoError) -> Self {
        VmError::Internal {
            message: err.to_string(),
        }
    }
}
