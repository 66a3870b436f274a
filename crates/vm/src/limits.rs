//! Resource bounds enforced during execution.

/// Hard bounds on a single invocation.
///
/// These are determinism and robustness bounds, not a fee schedule: every
/// conforming host must use identical limits for identical results, and a
/// program exceeding any of them faults instead of degrading the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Maximum instructions executed per invocation.
    pub max_steps: u64,
    /// Maximum items on one frame's evaluation stack.
    pub max_stack_items: usize,
    /// Maximum size in bytes of a single byte-string item.
    pub max_item_size: usize,
    /// Maximum invocation (frame) depth, outer call included.
    pub max_call_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: 1 << 20,
            max_stack_items: 2048,
            max_item_size: 1 << 20,
            max_call_depth: 128,
        }
    }
}
