//! Opcode set of the frozen-program instruction stream.

/// Operand layout of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandWidth {
    /// No operand bytes.
    None,
    /// A fixed number of operand bytes.
    Fixed(usize),
    /// A little-endian length prefix of the given width, followed by that
    /// many payload bytes.
    Prefixed(usize),
}

/// One-byte opcodes. Discriminants are the wire encoding and never change
/// once a program has been frozen into a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Nop = 0x00,

    // Constants
    PushNull = 0x01,
    PushFalse = 0x02,
    PushTrue = 0x03,
    PushInt8 = 0x04,
    PushInt32 = 0x05,
    PushInt64 = 0x06,
    PushInt128 = 0x07,
    PushData1 = 0x08,
    PushData2 = 0x09,
    PushData4 = 0x0A,
    Push0 = 0x10,
    Push1 = 0x11,
    Push2 = 0x12,
    Push3 = 0x13,
    Push4 = 0x14,
    Push5 = 0x15,
    Push6 = 0x16,
    Push7 = 0x17,
    Push8 = 0x18,
    Push9 = 0x19,
    Push10 = 0x1A,
    Push11 = 0x1B,
    Push12 = 0x1C,
    Push13 = 0x1D,
    Push14 = 0x1E,
    Push15 = 0x1F,
    Push16 = 0x20,

    // Stack manipulation
    Dup = 0x30,
    Drop = 0x31,
    Swap = 0x32,
    Over = 0x33,
    Rot = 0x34,

    // Arithmetic
    Add = 0x40,
    Sub = 0x41,
    Mul = 0x42,
    Div = 0x43,
    Mod = 0x44,
    Itob = 0x48,
    Btoi = 0x49,

    // Comparison and logic
    Equal = 0x50,
    NumEqual = 0x51,
    Lt = 0x52,
    Gt = 0x53,
    Le = 0x54,
    Ge = 0x55,
    Not = 0x56,
    BoolAnd = 0x57,
    BoolOr = 0x58,
    IsNull = 0x59,

    // Bytes and compounds
    Concat = 0x60,
    Size = 0x61,
    NewArray = 0x62,
    NewMap = 0x63,
    Append = 0x64,
    PickItem = 0x65,
    SetItem = 0x66,
    HasKey = 0x67,
    Remove = 0x68,

    // Slots
    LdLoc = 0x70,
    StLoc = 0x71,
    LdGlb = 0x72,
    StGlb = 0x73,

    // Control flow
    Jmp = 0x80,
    JmpIf = 0x81,
    JmpIfNot = 0x82,
    Call = 0x83,
    Ret = 0x84,
    Syscall = 0x85,
    Abort = 0x86,
    AbortMsg = 0x87,
    Assert = 0x88,
    AssertMsg = 0x89,
}

impl OpCode {
    /// Decodes a raw byte into an opcode, if it names one.
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        use OpCode::*;
        let op = match byte {
            0x00 => Nop,
            0x01 => PushNull,
            0x02 => PushFalse,
            0x03 => PushTrue,
            0x04 => PushInt8,
            0x05 => PushInt32,
            0x06 => PushInt64,
            0x07 => PushInt128,
            0x08 => PushData1,
            0x09 => PushData2,
            0x0A => PushData4,
            0x10 => Push0,
            0x11 => Push1,
            0x12 => Push2,
            0x13 => Push3,
            0x14 => Push4,
            0x15 => Push5,
            0x16 => Push6,
            0x17 => Push7,
            0x18 => Push8,
            0x19 => Push9,
            0x1A => Push10,
            0x1B => Push11,
            0x1C => Push12,
            0x1D => Push13,
            0x1E => Push14,
            0x1F => Push15,
            0x20 => Push16,
            0x30 => Dup,
            0x31 => Drop,
            0x32 => Swap,
            0x33 => Over,
            0x34 => Rot,
            0x40 => Add,
            0x41 => Sub,
            0x42 => Mul,
            0x43 => Div,
            0x44 => Mod,
            0x48 => Itob,
            0x49 => Btoi,
            0x50 => Equal,
            0x51 => NumEqual,
            0x52 => Lt,
            0x53 => Gt,
            0x54 => Le,
            0x55 => Ge,
            0x56 => Not,
            0x57 => BoolAnd,
            0x58 => BoolOr,
            0x59 => IsNull,
            0x60 => Concat,
            0x61 => Size,
            0x62 => NewArray,
            0x63 => NewMap,
            0x64 => Append,
            0x65 => PickItem,
            0x66 => SetItem,
            0x67 => HasKey,
            0x68 => Remove,
            0x70 => LdLoc,
            0x71 => StLoc,
            0x72 => LdGlb,
            0x73 => StGlb,
            0x80 => Jmp,
            0x81 => JmpIf,
            0x82 => JmpIfNot,
            0x83 => Call,
            0x84 => Ret,
            0x85 => Syscall,
            0x86 => Abort,
            0x87 => AbortMsg,
            0x88 => Assert,
            0x89 => AssertMsg,
            _ => return None,
        };
        Some(op)
    }

    /// Operand layout for this opcode.
    pub fn operand_width(self) -> OperandWidth {
        use OpCode::*;
        match self {
            PushInt8 => OperandWidth::Fixed(1),
            PushInt32 => OperandWidth::Fixed(4),
            PushInt64 => OperandWidth::Fixed(8),
            PushInt128 => OperandWidth::Fixed(16),
            PushData1 => OperandWidth::Prefixed(1),
            PushData2 => OperandWidth::Prefixed(2),
            PushData4 => OperandWidth::Prefixed(4),
            LdLoc | StLoc | LdGlb | StGlb => OperandWidth::Fixed(1),
            Jmp | JmpIf | JmpIfNot => OperandWidth::Fixed(2),
            Call => OperandWidth::Fixed(2),
            Syscall => OperandWidth::Fixed(4),
            _ => OperandWidth::None,
        }
    }

    /// For `Push0`..`Push16`, the small integer the opcode pushes.
    pub fn small_push_value(self) -> Option<u8> {
        let byte = self as u8;
        if (OpCode::Push0 as u8..=OpCode::Push16 as u8).contains(&byte) {
            Some(byte - OpCode::Push0 as u8)
        } else {
            None
        }
    }
}
