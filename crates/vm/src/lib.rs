//! Deterministic bytecode interpreter for frozen contract modules.
//!
//! A module is a [`Program`] (bytecode plus a function table) bundled with
//! the mutable half of its world, the [`ModuleState`] (global slots and a
//! key-value storage map). The [`InvocationEngine`] runs one exported
//! function at a time against a state:
//!
//! ```text
//!   ┌──────────┐      ┌───────────────────────────────┐
//!   │ Program  │      │ InvocationEngine              │
//!   │  script  │────▶ │  frames / eval stacks / steps │
//!   │  fn table│      │  syscalls ⇄ ModuleState       │
//!   └──────────┘      └───────────────────────────────┘
//!         ▲                      │
//!   ┌──────────┐          JSON in / JSON out
//!   │ModuleState│◀─────  (marshal module)
//!   └──────────┘
//! ```
//!
//! Execution is a pure function of `(state, function, input, context)`:
//! no clocks, no randomness, no ambient I/O. Anything a contract needs
//! from the outside world arrives through the [`CallContext`].

mod builder;
mod engine;
mod error;
mod host;
mod limits;
pub mod marshal;
mod op_code;
mod program;
mod script;
mod stack;
mod state;
mod value;

pub use builder::{JumpSite, ScriptBuilder};
pub use engine::{InvocationEngine, InvokeOutcome};
pub use error::{VmError, VmResult};
pub use host::{CallContext, SyscallId, MAX_LOG_LEN};
pub use limits::ExecutionLimits;
pub use op_code::{OpCode, OperandWidth};
pub use program::{
    FunctionDef, Param, ParamKind, Program, MAX_CODE_LEN, MAX_FUNCTIONS, MAX_GLOBALS,
    MAX_NAME_LEN, MAX_PARAMS, MAX_SLOTS,
};
pub use script::{Instruction, Script};
pub use stack::EvaluationStack;
pub use state::{ModuleState, MAX_STORAGE_ENTRIES, MAX_STORAGE_KEY_LEN, MAX_STORAGE_VALUE_LEN};
pub use value::{MapKey, Value, MAX_INT_BYTES, MAX_VALUE_DEPTH};
