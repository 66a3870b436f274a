//! Script container and instruction decoding.

use std::ops::Range;

use crate::error::{VmError, VmResult};
use crate::op_code::{OpCode, OperandWidth};

/// An immutable bytecode sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    bytes: Vec<u8>,
}

/// One decoded instruction.
///
/// Carries byte ranges rather than slices so the engine can hold an
/// instruction while mutating unrelated parts of the module state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: OpCode,
    /// Offset of the opcode byte.
    pub offset: usize,
    /// Range of the operand payload within the script. For prefixed
    /// operands this excludes the length prefix itself.
    pub operand: Range<usize>,
    /// Total encoded size including opcode and any length prefix.
    pub size: usize,
}

impl Script {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decodes the instruction starting at `offset`.
    pub fn instruction_at(&self, offset: usize) -> VmResult<Instruction> {
        let byte = *self.bytes.get(offset).ok_or(VmError::IpOutOfBounds {
            offset,
            len: self.bytes.len(),
        })?;
        let opcode = OpCode::from_byte(byte).ok_or(VmError::InvalidOpcode {
            opcode: byte,
            offset,
        })?;

        let operand_start = offset + 1;
        let (operand, size) = match opcode.operand_width() {
            OperandWidth::None => (operand_start..operand_start, 1),
            OperandWidth::Fixed(width) => {
                let end = operand_start + width;
                if end > self.bytes.len() {
                    return Err(VmError::TruncatedInstruction { offset });
                }
                (operand_start..end, 1 + width)
            }
            OperandWidth::Prefixed(prefix) => {
                let data_start = operand_start + prefix;
                if data_start > self.bytes.len() {
                    return Err(VmError::TruncatedInstruction { offset });
                }
                let len = read_prefix(&self.bytes[operand_start..data_start]);
                let end = data_start + len;
                if end > self.bytes.len() {
                    return Err(VmError::TruncatedInstruction { offset });
                }
                (data_start..end, 1 + prefix + len)
            }
        };

        Ok(Instruction {
            opcode,
            offset,
            operand,
            size,
        })
    }

    /// Operand payload bytes of a decoded instruction.
    pub fn operand_bytes(&self, instruction: &Instruction) -> &[u8] {
        &self.bytes[instruction.operand.clone()]
    }
}

impl Instruction {
    /// Offset of the instruction that follows this one in the stream.
    pub fn next_offset(&self) -> usize {
        self.offset + self.size
    }
}

fn read_prefix(bytes: &[u8]) -> usize {
    let mut value = 0usize;
    for (i, byte) in bytes.iter().enumerate() {
        value |= (*byte as usize) << (8 * i);
    }
    value
}
