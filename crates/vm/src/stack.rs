//! Bounded evaluation stack.

use crate::error::{VmError, VmResult};
use crate::value::Value;

/// The per-frame operand stack.
///
/// Bounded so a runaway program exhausts its step budget or faults here
/// instead of exhausting host memory.
#[derive(Debug, Clone)]
pub struct EvaluationStack {
    items: Vec<Value>,
    limit: usize,
}

impl EvaluationStack {
    pub fn new(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, value: Value) -> VmResult<()> {
        if self.items.len() >= self.limit {
            return Err(VmError::StackOverflow { limit: self.limit });
        }
        self.items.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> VmResult<Value> {
        self.items.pop().ok_or(VmError::StackUnderflow)
    }

    /// Borrows the item `depth` positions below the top (0 is the top).
    pub fn peek(&self, depth: usize) -> VmResult<&Value> {
        let len = self.items.len();
        if depth >= len {
            return Err(VmError::StackUnderflow);
        }
        Ok(&self.items[len - 1 - depth])
    }
}
