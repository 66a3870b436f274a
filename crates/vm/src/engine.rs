//! The invocation engine.
//!
//! ```text
//!   invoke(state, function, input, context)
//!        │ marshal args
//!   ┌────▼──────────────────────────────────────────────┐
//!   │ fetch → decode → execute                          │
//!   │   frames:  [ Frame { locals, eval stack } ... ]   │
//!   │   syscalls ⇄ state.storage / call context         │
//!   │   logs     → carried out in the outcome           │
//!   └───────────────────────────────────────────────────┘
//!        │ marshal return / fault
//! ```
//!
//! Execution is strictly deterministic: the only inputs are the module
//! state, the argument bytes and the call context, and every fault is a
//! value. Nothing unwinds past [`InvocationEngine::invoke`].

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};

use crate::error::{VmError, VmResult};
use crate::host::{CallContext, SyscallId, MAX_LOG_LEN};
use crate::limits::ExecutionLimits;
use crate::marshal;
use crate::op_code::OpCode;
use crate::program::FunctionDef;
use crate::script::Instruction;
use crate::stack::EvaluationStack;
use crate::state::{ModuleState, MAX_STORAGE_KEY_LEN, MAX_STORAGE_VALUE_LEN};
use crate::value::{Value, MAX_INT_BYTES, MAX_VALUE_DEPTH};

/// What one invocation produced.
///
/// Log lines are collected even when the call faults; a failed call's logs
/// are still visible to the host.
#[derive(Debug)]
pub struct InvokeOutcome {
    pub result: VmResult<Vec<u8>>,
    pub logs: Vec<String>,
}

impl InvokeOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs exported functions against a module state.
#[derive(Debug, Default)]
pub struct InvocationEngine {
    limits: ExecutionLimits,
}

impl InvocationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Marshals `input`, executes function `function` of the state's
    /// program to completion, and marshals the result back out.
    ///
    /// Runtime faults of any kind, including panics out of the
    /// interpreter itself, come back as an `Err` in the outcome. On a
    /// fault the state may hold partial mutations; the caller owns the
    /// decision to discard it.
    pub fn invoke(
        &self,
        state: &mut ModuleState,
        function: usize,
        input: &[u8],
        context: &CallContext,
    ) -> InvokeOutcome {
        let Some(func) = state.program().function(function).cloned() else {
            return InvokeOutcome {
                result: Err(VmError::UnknownFunctionIndex { index: function }),
                logs: Vec::new(),
            };
        };
        log::trace!("invoking `{}` (index {function})", func.name);

        let args = match marshal::decode_args(input, &func.params) {
            Ok(args) => args,
            Err(err) => {
                return InvokeOutcome {
                    result: Err(err),
                    logs: Vec::new(),
                }
            }
        };

        let mut exec = ExecutionEngine::new(state, context, &self.limits, func.safe);
        let run = catch_unwind(AssertUnwindSafe(|| exec.run(function, &func, args)));
        let result = match run {
            Ok(inner) => inner,
            Err(payload) => Err(VmError::Panicked {
                message: panic_message(payload.as_ref()),
            }),
        };
        let logs = exec.take_logs();

        let result = result.and_then(|returned| encode_result(&func, returned));
        match &result {
            Ok(bytes) => log::trace!("`{}` returned {} byte(s)", func.name, bytes.len()),
            Err(err) => log::trace!("`{}` faulted: {err}", func.name),
        }
        InvokeOutcome { result, logs }
    }
}

fn encode_result(func: &FunctionDef, returned: Option<Value>) -> VmResult<Vec<u8>> {
    if func.returns {
        match returned {
            Some(value) => marshal::encode_return(&value),
            None => Err(VmError::MissingReturnValue),
        }
    } else {
        Ok(Vec::new())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

enum Flow {
    Continue,
    Finished(Option<Value>),
}

struct Frame {
    function: usize,
    locals: Vec<Value>,
    stack: EvaluationStack,
    return_ip: usize,
    returns: bool,
}

struct ExecutionEngine<'a> {
    state: &'a mut ModuleState,
    context: &'a CallContext,
    limits: &'a ExecutionLimits,
    /// Set for `safe` (view) entry points; any write faults.
    readonly: bool,
    frames: Vec<Frame>,
    logs: Vec<String>,
    steps: u64,
    ip: usize,
}

impl<'a> ExecutionEngine<'a> {
    fn new(
        state: &'a mut ModuleState,
        context: &'a CallContext,
        limits: &'a ExecutionLimits,
        readonly: bool,
    ) -> Self {
        Self {
            state,
            context,
            limits,
            readonly,
            frames: Vec::new(),
            logs: Vec::new(),
            steps: 0,
            ip: 0,
        }
    }

    fn take_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.logs)
    }

    fn run(
        &mut self,
        function: usize,
        func: &FunctionDef,
        args: Vec<Value>,
    ) -> VmResult<Option<Value>> {
        debug_assert_eq!(args.len(), func.params.len());
        let mut locals = args;
        locals.resize(func.slots(), Value::Null);
        self.frames.push(Frame {
            function,
            locals,
            stack: EvaluationStack::new(self.limits.max_stack_items),
            return_ip: usize::MAX,
            returns: func.returns,
        });
        self.ip = func.offset as usize;

        loop {
            self.steps += 1;
            if self.steps > self.limits.max_steps {
                return Err(VmError::StepLimitExhausted {
                    limit: self.limits.max_steps,
                });
            }
            let instr = self.state.program().code().instruction_at(self.ip)?;
            self.ip = instr.next_offset();
            if let Flow::Finished(result) = self.execute(&instr)? {
                return Ok(result);
            }
        }
    }

    fn execute(&mut self, instr: &Instruction) -> VmResult<Flow> {
        use OpCode::*;
        match instr.opcode {
            Nop => {}

            PushNull => self.push(Value::Null)?,
            PushFalse => self.push(Value::Bool(false))?,
            PushTrue => self.push(Value::Bool(true))?,
            PushInt8 | PushInt32 | PushInt64 | PushInt128 => {
                let value = BigInt::from_signed_bytes_le(self.operand(instr));
                self.push(Value::Int(value))?;
            }
            PushData1 | PushData2 | PushData4 => {
                let size = instr.operand.len();
                if size > self.limits.max_item_size {
                    return Err(VmError::ItemTooLarge {
                        size,
                        limit: self.limits.max_item_size,
                    });
                }
                let data = self.operand(instr).to_vec();
                self.push(Value::Bytes(data))?;
            }
            Push0 | Push1 | Push2 | Push3 | Push4 | Push5 | Push6 | Push7 | Push8 | Push9
            | Push10 | Push11 | Push12 | Push13 | Push14 | Push15 | Push16 => {
                let small = instr.opcode.small_push_value().unwrap_or(0);
                self.push(Value::Int(BigInt::from(small)))?;
            }

            Dup => {
                let top = self.frame()?.stack.peek(0)?.clone();
                self.push(top)?;
            }
            Drop => {
                self.pop()?;
            }
            Swap => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(a)?;
                self.push(b)?;
            }
            Over => {
                let second = self.frame()?.stack.peek(1)?.clone();
                self.push(second)?;
            }
            Rot => {
                let a = self.pop()?;
                let b = self.pop()?;
                let c = self.pop()?;
                self.push(b)?;
                self.push(a)?;
                self.push(c)?;
            }

            Add | Sub | Mul | Div | Mod => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                let result = match instr.opcode {
                    Add => a + b,
                    Sub => a - b,
                    Mul => a * b,
                    Div if b.is_zero() => return Err(VmError::DivisionByZero),
                    Div => a / b,
                    Mod if b.is_zero() => return Err(VmError::DivisionByZero),
                    Mod => a % b,
                    _ => return Err(VmError::internal("bad arithmetic dispatch")),
                };
                if result.bits() > 8 * MAX_INT_BYTES as u64 - 1 {
                    return Err(VmError::IntegerOverflow {
                        max: MAX_INT_BYTES,
                    });
                }
                self.push(Value::Int(result))?;
            }
            Itob => {
                let value = self.pop_int()?;
                self.push(Value::Bytes(value.to_signed_bytes_le()))?;
            }
            Btoi => {
                let bytes = self.pop_bytes()?;
                if bytes.len() > MAX_INT_BYTES {
                    return Err(VmError::IntegerOverflow {
                        max: MAX_INT_BYTES,
                    });
                }
                self.push(Value::Int(BigInt::from_signed_bytes_le(&bytes)))?;
            }

            Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(a == b))?;
            }
            NumEqual => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(Value::Bool(a == b))?;
            }
            Lt | Gt | Le | Ge => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                let result = match instr.opcode {
                    Lt => a < b,
                    Gt => a > b,
                    Le => a <= b,
                    Ge => a >= b,
                    _ => return Err(VmError::internal("bad comparison dispatch")),
                };
                self.push(Value::Bool(result))?;
            }
            Not => {
                let value = self.pop_truthy()?;
                self.push(Value::Bool(!value))?;
            }
            BoolAnd => {
                let b = self.pop_truthy()?;
                let a = self.pop_truthy()?;
                self.push(Value::Bool(a && b))?;
            }
            BoolOr => {
                let b = self.pop_truthy()?;
                let a = self.pop_truthy()?;
                self.push(Value::Bool(a || b))?;
            }
            IsNull => {
                let value = self.pop()?;
                self.push(Value::Bool(value.is_null()))?;
            }

            Concat => {
                let b = self.pop_bytes()?;
                let mut a = self.pop_bytes()?;
                let size = a.len() + b.len();
                if size > self.limits.max_item_size {
                    return Err(VmError::ItemTooLarge {
                        size,
                        limit: self.limits.max_item_size,
                    });
                }
                a.extend_from_slice(&b);
                self.push(Value::Bytes(a))?;
            }
            Size => {
                let value = self.pop()?;
                let size = match &value {
                    Value::Bytes(b) => b.len(),
                    Value::Array(a) => a.len(),
                    Value::Map(m) => m.len(),
                    other => {
                        return Err(VmError::type_mismatch("sized value", other.type_name()))
                    }
                };
                self.push(Value::Int(BigInt::from(size)))?;
            }
            NewArray => self.push(Value::Array(Vec::new()))?,
            NewMap => self.push(Value::Map(BTreeMap::new()))?,
            Append => {
                let item = self.pop()?;
                self.check_insert_depth(&item)?;
                let mut array = self.pop()?.into_array()?;
                array.push(item);
                self.push(Value::Array(array))?;
            }
            PickItem => {
                let key = self.pop()?;
                let value = match self.pop()? {
                    Value::Array(items) => {
                        let index = index_value(key, items.len())?;
                        items
                            .get(index)
                            .cloned()
                            .ok_or(VmError::KeyNotFound)?
                    }
                    Value::Map(map) => {
                        let key = key.into_map_key()?;
                        map.get(&key).cloned().ok_or(VmError::KeyNotFound)?
                    }
                    Value::Bytes(bytes) => {
                        let index = index_value(key, bytes.len())?;
                        Value::Int(BigInt::from(bytes[index]))
                    }
                    other => {
                        return Err(VmError::type_mismatch(
                            "array, map or bytes",
                            other.type_name(),
                        ))
                    }
                };
                self.push(value)?;
            }
            SetItem => {
                let value = self.pop()?;
                self.check_insert_depth(&value)?;
                let key = self.pop()?;
                let updated = match self.pop()? {
                    Value::Array(mut items) => {
                        let index = index_value(key, items.len())?;
                        items[index] = value;
                        Value::Array(items)
                    }
                    Value::Map(mut map) => {
                        map.insert(key.into_map_key()?, value);
                        Value::Map(map)
                    }
                    other => {
                        return Err(VmError::type_mismatch("array or map", other.type_name()))
                    }
                };
                self.push(updated)?;
            }
            HasKey => {
                let key = self.pop()?;
                let has = match self.pop()? {
                    Value::Array(items) => {
                        let index = key.into_int()?;
                        match index.to_i64() {
                            Some(i) if i >= 0 => (i as usize) < items.len(),
                            _ => false,
                        }
                    }
                    Value::Map(map) => map.contains_key(&key.into_map_key()?),
                    other => {
                        return Err(VmError::type_mismatch("array or map", other.type_name()))
                    }
                };
                self.push(Value::Bool(has))?;
            }
            Remove => {
                let key = self.pop()?;
                let updated = match self.pop()? {
                    Value::Array(mut items) => {
                        let index = index_value(key, items.len())?;
                        items.remove(index);
                        Value::Array(items)
                    }
                    Value::Map(mut map) => {
                        if map.remove(&key.into_map_key()?).is_none() {
                            return Err(VmError::KeyNotFound);
                        }
                        Value::Map(map)
                    }
                    other => {
                        return Err(VmError::type_mismatch("array or map", other.type_name()))
                    }
                };
                self.push(updated)?;
            }

            LdLoc => {
                let slot = self.operand_u8(instr);
                let value = self
                    .frame()?
                    .locals
                    .get(slot as usize)
                    .cloned()
                    .ok_or(VmError::InvalidSlot { slot })?;
                self.push(value)?;
            }
            StLoc => {
                let slot = self.operand_u8(instr);
                let value = self.pop()?;
                let frame = self.frame_mut()?;
                match frame.locals.get_mut(slot as usize) {
                    Some(cell) => *cell = value,
                    None => return Err(VmError::InvalidSlot { slot }),
                }
            }
            LdGlb => {
                let slot = self.operand_u8(instr);
                let value = self
                    .state
                    .globals
                    .get(slot as usize)
                    .cloned()
                    .ok_or(VmError::InvalidGlobalSlot { slot })?;
                self.push(value)?;
            }
            StGlb => {
                if self.readonly {
                    return Err(VmError::ReadOnlyWrite {
                        what: "global slot",
                    });
                }
                let slot = self.operand_u8(instr);
                let value = self.pop()?;
                if value.depth() > MAX_VALUE_DEPTH {
                    return Err(VmError::ValueTooDeep {
                        limit: MAX_VALUE_DEPTH,
                    });
                }
                match self.state.globals.get_mut(slot as usize) {
                    Some(cell) => *cell = value,
                    None => return Err(VmError::InvalidGlobalSlot { slot }),
                }
            }

            Jmp => {
                let relative = self.operand_i16(instr);
                self.branch(instr.offset, relative)?;
            }
            JmpIf => {
                let relative = self.operand_i16(instr);
                if self.pop_truthy()? {
                    self.branch(instr.offset, relative)?;
                }
            }
            JmpIfNot => {
                let relative = self.operand_i16(instr);
                if !self.pop_truthy()? {
                    self.branch(instr.offset, relative)?;
                }
            }
            Call => {
                let index = self.operand_u16(instr) as usize;
                let func = self
                    .state
                    .program()
                    .function(index)
                    .cloned()
                    .ok_or(VmError::UnknownFunctionIndex { index })?;
                if self.frames.len() >= self.limits.max_call_depth {
                    return Err(VmError::CallDepthExceeded {
                        limit: self.limits.max_call_depth,
                    });
                }
                let mut args = Vec::with_capacity(func.params.len());
                for _ in 0..func.params.len() {
                    args.push(self.pop()?);
                }
                args.reverse();
                let mut locals = args;
                locals.resize(func.slots(), Value::Null);
                self.frames.push(Frame {
                    function: index,
                    locals,
                    stack: EvaluationStack::new(self.limits.max_stack_items),
                    return_ip: self.ip,
                    returns: func.returns,
                });
                self.ip = func.offset as usize;
            }
            Ret => {
                let mut frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| VmError::internal("no active frame"))?;
                let returned = if frame.returns {
                    Some(frame.stack.pop()?)
                } else {
                    None
                };
                if let Some(caller) = self.frames.last_mut() {
                    if let Some(value) = returned {
                        caller.stack.push(value)?;
                    }
                    self.ip = frame.return_ip;
                } else {
                    return Ok(Flow::Finished(returned));
                }
            }
            Syscall => {
                let id = self.operand_u32(instr);
                let syscall =
                    SyscallId::from_u32(id).ok_or(VmError::UnknownSyscall { id })?;
                self.syscall(syscall)?;
            }
            Abort => {
                return Err(VmError::Aborted {
                    message: "aborted".into(),
                })
            }
            AbortMsg => {
                let message = self.pop_message()?;
                return Err(VmError::Aborted { message });
            }
            Assert => {
                if !self.pop_truthy()? {
                    return Err(VmError::AssertionFailed {
                        message: "condition was false".into(),
                    });
                }
            }
            AssertMsg => {
                let message = self.pop_message()?;
                if !self.pop_truthy()? {
                    return Err(VmError::AssertionFailed { message });
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Stack convention: the key is pushed before the value, so pops run
    /// in reverse.
    fn syscall(&mut self, id: SyscallId) -> VmResult<()> {
        match id {
            SyscallId::StorageRead => {
                let key = self.pop_storage_key()?;
                match self.state.storage.get(&key).cloned() {
                    Some(bytes) => self.push(Value::Bytes(bytes))?,
                    None => self.push(Value::Null)?,
                }
            }
            SyscallId::StorageWrite => {
                if self.readonly {
                    return Err(VmError::ReadOnlyWrite { what: "storage" });
                }
                let value = self.pop_bytes()?;
                let key = self.pop_storage_key()?;
                if value.len() > MAX_STORAGE_VALUE_LEN {
                    return Err(VmError::StorageValueTooLong {
                        len: value.len(),
                        max: MAX_STORAGE_VALUE_LEN,
                    });
                }
                let previous = self.state.storage.insert(key, value);
                self.push(Value::Bool(previous.is_some()))?;
            }
            SyscallId::StorageRemove => {
                if self.readonly {
                    return Err(VmError::ReadOnlyWrite { what: "storage" });
                }
                let key = self.pop_storage_key()?;
                let previous = self.state.storage.remove(&key);
                self.push(Value::Bool(previous.is_some()))?;
            }
            SyscallId::StorageHasKey => {
                let key = self.pop_storage_key()?;
                let has = self.state.storage.contains_key(&key);
                self.push(Value::Bool(has))?;
            }
            SyscallId::PredecessorAccountId => {
                let caller = self.context.caller.as_bytes().to_vec();
                self.push(Value::Bytes(caller))?;
            }
            SyscallId::AttachedDeposit => {
                self.push(Value::Int(BigInt::from(self.context.attached_deposit)))?;
            }
            SyscallId::BlockTimestamp => {
                self.push(Value::Int(BigInt::from(self.context.block_timestamp)))?;
            }
            SyscallId::LogUtf8 => {
                let bytes = self.pop_bytes()?;
                if bytes.len() > MAX_LOG_LEN {
                    return Err(VmError::ItemTooLarge {
                        size: bytes.len(),
                        limit: MAX_LOG_LEN,
                    });
                }
                let message =
                    String::from_utf8(bytes).map_err(|_| VmError::InvalidLogMessage)?;
                log::trace!("contract log: {message}");
                self.logs.push(message);
            }
        }
        Ok(())
    }

    fn branch(&mut self, from: usize, relative: i16) -> VmResult<()> {
        let target = from as i64 + relative as i64;
        if target < 0 || target >= self.state.program().code().len() as i64 {
            return Err(VmError::InvalidJump { target });
        }
        self.ip = target as usize;
        Ok(())
    }

    fn frame(&self) -> VmResult<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| VmError::internal("no active frame"))
    }

    fn frame_mut(&mut self) -> VmResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| VmError::internal("no active frame"))
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        self.frame_mut()?.stack.push(value)
    }

    fn pop(&mut self) -> VmResult<Value> {
        self.frame_mut()?.stack.pop()
    }

    fn pop_int(&mut self) -> VmResult<BigInt> {
        self.pop()?.into_int()
    }

    fn pop_bytes(&mut self) -> VmResult<Vec<u8>> {
        self.pop()?.into_bytes()
    }

    fn pop_truthy(&mut self) -> VmResult<bool> {
        Ok(self.pop()?.truthy())
    }

    fn pop_message(&mut self) -> VmResult<String> {
        let bytes = self.pop_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn pop_storage_key(&mut self) -> VmResult<Vec<u8>> {
        let key = self.pop_bytes()?;
        if key.len() > MAX_STORAGE_KEY_LEN {
            return Err(VmError::StorageKeyTooLong {
                len: key.len(),
                max: MAX_STORAGE_KEY_LEN,
            });
        }
        Ok(key)
    }

    fn check_insert_depth(&self, value: &Value) -> VmResult<()> {
        if value.depth() >= MAX_VALUE_DEPTH {
            return Err(VmError::ValueTooDeep {
                limit: MAX_VALUE_DEPTH,
            });
        }
        Ok(())
    }

    fn operand<'b>(&'b self, instr: &Instruction) -> &'b [u8] {
        self.state.program().code().operand_bytes(instr)
    }

    fn operand_u8(&self, instr: &Instruction) -> u8 {
        self.operand(instr).first().copied().unwrap_or(0)
    }

    fn operand_i16(&self, instr: &Instruction) -> i16 {
        match self.operand(instr) {
            [a, b] => i16::from_le_bytes([*a, *b]),
            _ => 0,
        }
    }

    fn operand_u16(&self, instr: &Instruction) -> u16 {
        match self.operand(instr) {
            [a, b] => u16::from_le_bytes([*a, *b]),
            _ => 0,
        }
    }

    fn operand_u32(&self, instr: &Instruction) -> u32 {
        match self.operand(instr) {
            [a, b, c, d] => u32::from_le_bytes([*a, *b, *c, *d]),
            _ => 0,
        }
    }
}

fn index_value(key: Value, len: usize) -> VmResult<usize> {
    let int = key.into_int()?;
    let index = match int.to_i64() {
        Some(index) => index,
        None => {
            let clamp = if int.sign() == Sign::Minus {
                i64::MIN
            } else {
                i64::MAX
            };
            return Err(VmError::IndexOutOfRange { index: clamp, len });
        }
    };
    if index < 0 || index as usize >= len {
        return Err(VmError::IndexOutOfRange { index, len });
    }
    Ok(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ScriptBuilder;
    use crate::program::{Param, ParamKind, Program};

    fn one_function(code: ScriptBuilder, params: Vec<Param>, returns: bool) -> ModuleState {
        let program = Program::new(
            code.into_script(),
            vec![FunctionDef {
                name: "entry".into(),
                offset: 0,
                params,
                locals: 4,
                returns,
                exported: true,
                safe: false,
            }],
            4,
        )
        .unwrap();
        ModuleState::new(program)
    }

    fn run(state: &mut ModuleState, input: &[u8]) -> InvokeOutcome {
        InvocationEngine::new().invoke(state, 0, input, &CallContext::default())
    }

    #[test]
    fn adds_and_returns() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(40).emit_push_int(2).emit(OpCode::Add).emit(OpCode::Ret);
        let mut state = one_function(sb, vec![], true);
        let outcome = run(&mut state, b"");
        assert_eq!(outcome.result.unwrap(), b"42");
    }

    #[test]
    fn arguments_land_in_local_slots() {
        let mut sb = ScriptBuilder::new();
        sb.emit_slot(OpCode::LdLoc, 0)
            .emit_slot(OpCode::LdLoc, 1)
            .emit(OpCode::Sub)
            .emit(OpCode::Ret);
        let mut state = one_function(
            sb,
            vec![Param::new("a", ParamKind::Int), Param::new("b", ParamKind::Int)],
            true,
        );
        let outcome = run(&mut state, br#"{"a": 10, "b": 4}"#);
        assert_eq!(outcome.result.unwrap(), b"6");
    }

    #[test]
    fn division_by_zero_faults() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(1).emit_push_int(0).emit(OpCode::Div).emit(OpCode::Ret);
        let mut state = one_function(sb, vec![], true);
        assert_eq!(run(&mut state, b"").result, Err(VmError::DivisionByZero));
    }

    #[test]
    fn stack_underflow_faults() {
        let mut sb = ScriptBuilder::new();
        sb.emit(OpCode::Add).emit(OpCode::Ret);
        let mut state = one_function(sb, vec![], false);
        assert_eq!(run(&mut state, b"").result, Err(VmError::StackUnderflow));
    }

    #[test]
    fn runaway_loop_hits_step_limit() {
        let mut sb = ScriptBuilder::new();
        let top = sb.offset();
        sb.emit(OpCode::Nop);
        sb.emit_jump_to(OpCode::Jmp, top).unwrap();
        sb.emit(OpCode::Ret);
        let mut state = one_function(sb, vec![], false);
        let engine = InvocationEngine::with_limits(ExecutionLimits {
            max_steps: 1000,
            ..ExecutionLimits::default()
        });
        let outcome = engine.invoke(&mut state, 0, b"", &CallContext::default());
        assert_eq!(
            outcome.result,
            Err(VmError::StepLimitExhausted { limit: 1000 })
        );
    }

    #[test]
    fn call_passes_arguments_and_returns() {
        // entry: push 5, push 7, CALL mul2 (index 1), RET
        // mul2(a, b): LDLOC0 LDLOC1 MUL RET
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(5).emit_push_int(7).emit_call(1).emit(OpCode::Ret);
        let helper_offset = sb.offset() as u32;
        sb.emit_slot(OpCode::LdLoc, 0)
            .emit_slot(OpCode::LdLoc, 1)
            .emit(OpCode::Mul)
            .emit(OpCode::Ret);
        let program = Program::new(
            sb.into_script(),
            vec![
                FunctionDef {
                    name: "entry".into(),
                    offset: 0,
                    params: vec![],
                    locals: 0,
                    returns: true,
                    exported: true,
                    safe: false,
                },
                FunctionDef {
                    name: "mul2".into(),
                    offset: helper_offset,
                    params: vec![
                        Param::new("a", ParamKind::Int),
                        Param::new("b", ParamKind::Int),
                    ],
                    locals: 0,
                    returns: true,
                    exported: false,
                    safe: false,
                },
            ],
            0,
        )
        .unwrap();
        let mut state = ModuleState::new(program);
        let outcome = run(&mut state, b"");
        assert_eq!(outcome.result.unwrap(), b"35");
    }

    #[test]
    fn assert_with_message_faults_with_that_message() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_bool(false)
            .emit_push_str("no payout available")
            .emit(OpCode::AssertMsg)
            .emit(OpCode::Ret);
        let mut state = one_function(sb, vec![], false);
        let err = run(&mut state, b"").result.unwrap_err();
        assert_eq!(
            err,
            VmError::AssertionFailed {
                message: "no payout available".into()
            }
        );
    }

    #[test]
    fn logs_survive_faults() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_str("about to fail")
            .emit_syscall(SyscallId::LogUtf8)
            .emit(OpCode::Abort);
        let mut state = one_function(sb, vec![], false);
        let outcome = run(&mut state, b"");
        assert!(outcome.result.is_err());
        assert_eq!(outcome.logs, vec!["about to fail".to_string()]);
    }

    #[test]
    fn globals_persist_across_invocations() {
        // glb0 = (glb0 is null ? 0 : glb0) + 1; return glb0
        let mut sb = ScriptBuilder::new();
        sb.emit_slot(OpCode::LdGlb, 0);
        sb.emit(OpCode::IsNull);
        let not_null = sb.emit_jump(OpCode::JmpIfNot);
        sb.emit_push_int(0);
        sb.emit_slot(OpCode::StGlb, 0);
        sb.patch_jump_here(not_null).unwrap();
        sb.emit_slot(OpCode::LdGlb, 0);
        sb.emit_push_int(1);
        sb.emit(OpCode::Add);
        sb.emit_slot(OpCode::StGlb, 0);
        sb.emit_slot(OpCode::LdGlb, 0);
        sb.emit(OpCode::Ret);
        let mut state = one_function(sb, vec![], true);
        assert_eq!(run(&mut state, b"").result.unwrap(), b"1");
        assert_eq!(run(&mut state, b"").result.unwrap(), b"2");
        assert_eq!(state.globals()[0], Value::from(2i64));
    }

    #[test]
    fn unknown_function_index_faults() {
        let mut sb = ScriptBuilder::new();
        sb.emit(OpCode::Ret);
        let mut state = one_function(sb, vec![], false);
        let outcome = InvocationEngine::new().invoke(&mut state, 9, b"", &CallContext::default());
        assert_eq!(
            outcome.result,
            Err(VmError::UnknownFunctionIndex { index: 9 })
        );
    }
}
