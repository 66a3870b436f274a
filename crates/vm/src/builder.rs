//! Bytecode assembly for tests and tooling.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::{VmError, VmResult};
use crate::host::SyscallId;
use crate::op_code::{OpCode, OperandWidth};
use crate::script::Script;

/// Emits instructions into a growing byte buffer, always choosing the
/// smallest push encoding for a value.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    code: Vec<u8>,
}

/// A forward jump whose target is not yet known.
#[derive(Debug)]
#[must_use = "unpatched jumps leave a zero-offset self-jump in the script"]
pub struct JumpSite {
    at: usize,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next emitted instruction will start at.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Emits an operand-less opcode.
    pub fn emit(&mut self, op: OpCode) -> &mut Self {
        debug_assert!(op.operand_width() == OperandWidth::None);
        self.code.push(op as u8);
        self
    }

    pub fn emit_push_null(&mut self) -> &mut Self {
        self.emit(OpCode::PushNull)
    }

    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        self.emit(if value {
            OpCode::PushTrue
        } else {
            OpCode::PushFalse
        })
    }

    /// Pushes an integer using the narrowest encoding that holds it.
    pub fn emit_push_int(&mut self, value: i64) -> &mut Self {
        if (0..=16).contains(&value) {
            let op = OpCode::Push0 as u8 + value as u8;
            self.code.push(op);
        } else if let Ok(v) = i8::try_from(value) {
            self.code.push(OpCode::PushInt8 as u8);
            self.code.extend_from_slice(&v.to_le_bytes());
        } else if let Ok(v) = i32::try_from(value) {
            self.code.push(OpCode::PushInt32 as u8);
            self.code.extend_from_slice(&v.to_le_bytes());
        } else {
            self.code.push(OpCode::PushInt64 as u8);
            self.code.extend_from_slice(&value.to_le_bytes());
        }
        self
    }

    /// Pushes an arbitrary-precision integer; fails beyond 128 bits.
    pub fn emit_push_bigint(&mut self, value: &BigInt) -> VmResult<&mut Self> {
        if let Some(v) = value.to_i64() {
            return Ok(self.emit_push_int(v));
        }
        let bytes = value.to_signed_bytes_le();
        if bytes.len() > 16 {
            return Err(VmError::IntegerOverflow { max: 16 });
        }
        let fill = if value.sign() == num_bigint::Sign::Minus {
            0xFF
        } else {
            0x00
        };
        let mut wide = [fill; 16];
        wide[..bytes.len()].copy_from_slice(&bytes);
        self.code.push(OpCode::PushInt128 as u8);
        self.code.extend_from_slice(&wide);
        Ok(self)
    }

    /// Pushes a byte string with the narrowest length prefix.
    pub fn emit_push_data(&mut self, data: &[u8]) -> &mut Self {
        if data.len() <= u8::MAX as usize {
            self.code.push(OpCode::PushData1 as u8);
            self.code.push(data.len() as u8);
        } else if data.len() <= u16::MAX as usize {
            self.code.push(OpCode::PushData2 as u8);
            self.code
                .extend_from_slice(&(data.len() as u16).to_le_bytes());
        } else {
            self.code.push(OpCode::PushData4 as u8);
            self.code
                .extend_from_slice(&(data.len() as u32).to_le_bytes());
        }
        self.code.extend_from_slice(data);
        self
    }

    pub fn emit_push_str(&mut self, value: &str) -> &mut Self {
        self.emit_push_data(value.as_bytes())
    }

    /// Emits a slot access (`LdLoc`/`StLoc`/`LdGlb`/`StGlb`).
    pub fn emit_slot(&mut self, op: OpCode, slot: u8) -> &mut Self {
        debug_assert!(matches!(
            op,
            OpCode::LdLoc | OpCode::StLoc | OpCode::LdGlb | OpCode::StGlb
        ));
        self.code.push(op as u8);
        self.code.push(slot);
        self
    }

    pub fn emit_call(&mut self, function: u16) -> &mut Self {
        self.code.push(OpCode::Call as u8);
        self.code.extend_from_slice(&function.to_le_bytes());
        self
    }

    pub fn emit_syscall(&mut self, id: SyscallId) -> &mut Self {
        self.code.push(OpCode::Syscall as u8);
        self.code.extend_from_slice(&(id as u32).to_le_bytes());
        self
    }

    /// Emits a jump with a placeholder offset; patch it once the target is
    /// known.
    pub fn emit_jump(&mut self, op: OpCode) -> JumpSite {
        debug_assert!(matches!(
            op,
            OpCode::Jmp | OpCode::JmpIf | OpCode::JmpIfNot
        ));
        let at = self.code.len();
        self.code.push(op as u8);
        self.code.extend_from_slice(&0i16.to_le_bytes());
        JumpSite { at }
    }

    /// Emits a jump directly to a known (typically backward) target.
    pub fn emit_jump_to(&mut self, op: OpCode, target: usize) -> VmResult<&mut Self> {
        let site = self.emit_jump(op);
        self.patch_jump(site, target)?;
        Ok(self)
    }

    /// Points a previously emitted jump at `target`.
    pub fn patch_jump(&mut self, site: JumpSite, target: usize) -> VmResult<()> {
        let distance = target as i64 - site.at as i64;
        let relative =
            i16::try_from(distance).map_err(|_| VmError::JumpOutOfRange { distance })?;
        self.code[site.at + 1..site.at + 3].copy_from_slice(&relative.to_le_bytes());
        Ok(())
    }

    /// Points a previously emitted jump at the current offset.
    pub fn patch_jump_here(&mut self, site: JumpSite) -> VmResult<()> {
        let target = self.offset();
        self.patch_jump(site, target)
    }

    pub fn into_script(self) -> Script {
        Script::new(self.code)
    }
}
