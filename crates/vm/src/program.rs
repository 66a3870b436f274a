//! Frozen program: bytecode plus its function table.

use floe_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use sha2::{Digest, Sha256};

use crate::script::Script;

/// Longest accepted function or parameter name.
pub const MAX_NAME_LEN: usize = 64;
/// Most parameters a function may declare.
pub const MAX_PARAMS: usize = 16;
/// Most functions a program may define.
pub const MAX_FUNCTIONS: usize = 512;
/// Largest accepted bytecode stream.
pub const MAX_CODE_LEN: usize = 1 << 20;
/// Local slots (parameters included) addressable per frame.
pub const MAX_SLOTS: usize = 256;
/// Global slots addressable per program.
pub const MAX_GLOBALS: usize = 256;

const FLAG_EXPORTED: u8 = 0b0000_0001;
const FLAG_SAFE: u8 = 0b0000_0010;
const FLAG_RETURNS: u8 = 0b0000_0100;
const FLAG_KNOWN: u8 = FLAG_EXPORTED | FLAG_SAFE | FLAG_RETURNS;

/// Declared type of one function parameter, used by argument marshalling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParamKind {
    Any = 0,
    Bool = 1,
    Int = 2,
    String = 3,
    Bytes = 4,
    Array = 5,
    Map = 6,
}

impl ParamKind {
    pub fn from_byte(byte: u8) -> Option<ParamKind> {
        match byte {
            0 => Some(ParamKind::Any),
            1 => Some(ParamKind::Bool),
            2 => Some(ParamKind::Int),
            3 => Some(ParamKind::String),
            4 => Some(ParamKind::Bytes),
            5 => Some(ParamKind::Array),
            6 => Some(ParamKind::Map),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Any => "any",
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::String => "string",
            ParamKind::Bytes => "bytes",
            ParamKind::Array => "array",
            ParamKind::Map => "map",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One entry of the function table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    /// Bytecode offset of the first instruction.
    pub offset: u32,
    pub params: Vec<Param>,
    /// Local slots beyond the parameters, null-initialized on entry.
    pub locals: u8,
    /// Whether the function leaves one return value.
    pub returns: bool,
    /// Whether the host may dispatch this function by name.
    pub exported: bool,
    /// View function: faults on any storage or global write.
    pub safe: bool,
}

impl FunctionDef {
    /// Total local slots a frame for this function needs.
    pub fn slots(&self) -> usize {
        self.params.len() + self.locals as usize
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.exported {
            flags |= FLAG_EXPORTED;
        }
        if self.safe {
            flags |= FLAG_SAFE;
        }
        if self.returns {
            flags |= FLAG_RETURNS;
        }
        flags
    }
}

/// Bytecode and function table of a frozen module.
///
/// A `Program` is immutable once constructed and has a canonical binary
/// encoding; its checksum binds resolved function entries to the exact
/// program they were resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    code: Script,
    functions: Vec<FunctionDef>,
    globals: u16,
}

impl Program {
    /// Validates and assembles a program.
    pub fn new(code: Script, functions: Vec<FunctionDef>, globals: u16) -> IoResult<Self> {
        let program = Self {
            code,
            functions,
            globals,
        };
        program.validate()?;
        Ok(program)
    }

    pub fn code(&self) -> &Script {
        &self.code
    }

    pub fn functions(&self) -> &[FunctionDef] {
        &self.functions
    }

    pub fn function(&self, index: usize) -> Option<&FunctionDef> {
        self.functions.get(index)
    }

    /// Looks a function up by name, returning its table index as well.
    pub fn function_named(&self, name: &str) -> Option<(usize, &FunctionDef)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
    }

    /// Declared global slot count.
    pub fn globals(&self) -> u16 {
        self.globals
    }

    /// First 4 little-endian bytes of the SHA-256 of the canonical
    /// encoding.
    pub fn checksum(&self) -> u32 {
        let mut writer = BinaryWriter::new();
        self.encode_into(&mut writer);
        let digest = Sha256::digest(writer.as_slice());
        u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
    }

    fn encode_into(&self, writer: &mut BinaryWriter) {
        writer.write_var_bytes(self.code.as_bytes());
        writer.write_var_int(self.functions.len() as u64);
        for func in &self.functions {
            writer.write_var_string(&func.name);
            writer.write_u32(func.offset);
            writer.write_u8(func.params.len() as u8);
            for param in &func.params {
                writer.write_var_string(&param.name);
                writer.write_u8(param.kind as u8);
            }
            writer.write_u8(func.locals);
            writer.write_u8(func.flags());
        }
        writer.write_u16(self.globals);
    }

    fn validate(&self) -> IoResult<()> {
        if self.code.len() > MAX_CODE_LEN {
            return Err(IoError::invalid_data("bytecode exceeds maximum length"));
        }
        if self.functions.len() > MAX_FUNCTIONS {
            return Err(IoError::invalid_data("too many functions"));
        }
        if self.globals as usize > MAX_GLOBALS {
            return Err(IoError::invalid_data("too many global slots"));
        }
        for (index, func) in self.functions.iter().enumerate() {
            if func.name.is_empty() || func.name.len() > MAX_NAME_LEN {
                return Err(IoError::invalid_data(format!(
                    "function {index} has an invalid name"
                )));
            }
            if (func.offset as usize) >= self.code.len() {
                return Err(IoError::invalid_data(format!(
                    "function `{}` offset {} outside bytecode of length {}",
                    func.name,
                    func.offset,
                    self.code.len()
                )));
            }
            if func.params.len() > MAX_PARAMS {
                return Err(IoError::invalid_data(format!(
                    "function `{}` declares too many parameters",
                    func.name
                )));
            }
            if func.slots() > MAX_SLOTS {
                return Err(IoError::invalid_data(format!(
                    "function `{}` needs more than {MAX_SLOTS} local slots",
                    func.name
                )));
            }
            for param in &func.params {
                if param.name.is_empty() || param.name.len() > MAX_NAME_LEN {
                    return Err(IoError::invalid_data(format!(
                        "function `{}` has an invalid parameter name",
                        func.name
                    )));
                }
            }
            for other in &func.params {
                let duplicates = func
                    .params
                    .iter()
                    .filter(|p| p.name == other.name)
                    .count();
                if duplicates > 1 {
                    return Err(IoError::invalid_data(format!(
                        "function `{}` repeats parameter `{}`",
                        func.name, other.name
                    )));
                }
            }
            if self.functions[..index].iter().any(|f| f.name == func.name) {
                return Err(IoError::invalid_data(format!(
                    "duplicate function name `{}`",
                    func.name
                )));
            }
        }
        Ok(())
    }
}

impl Serializable for Program {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.encode_into(writer);
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let code = reader.read_var_bytes(MAX_CODE_LEN)?;
        let count = reader.read_var_int()?;
        if count > MAX_FUNCTIONS as u64 {
            return Err(IoError::invalid_data("too many functions"));
        }
        let mut functions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = reader.read_var_string(MAX_NAME_LEN)?;
            let offset = reader.read_u32()?;
            let param_count = reader.read_u8()?;
            if param_count as usize > MAX_PARAMS {
                return Err(IoError::invalid_data("too many parameters"));
            }
            let mut params = Vec::with_capacity(param_count as usize);
            for _ in 0..param_count {
                let param_name = reader.read_var_string(MAX_NAME_LEN)?;
                let kind_byte = reader.read_u8()?;
                let kind = ParamKind::from_byte(kind_byte).ok_or_else(|| {
                    IoError::invalid_data(format!("unknown parameter kind {kind_byte}"))
                })?;
                params.push(Param::new(param_name, kind));
            }
            let locals = reader.read_u8()?;
            let flags = reader.read_u8()?;
            if flags & !FLAG_KNOWN != 0 {
                return Err(IoError::invalid_data(format!(
                    "unknown function flags {flags:#04x}"
                )));
            }
            functions.push(FunctionDef {
                name,
                offset,
                params,
                locals,
                returns: flags & FLAG_RETURNS != 0,
                exported: flags & FLAG_EXPORTED != 0,
                safe: flags & FLAG_SAFE != 0,
            });
        }
        let globals = reader.read_u16()?;
        Program::new(Script::new(code), functions, globals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op_code::OpCode;

    fn ret_code(len: usize) -> Script {
        Script::new(vec![OpCode::Ret as u8; len])
    }

    fn simple_function(name: &str, offset: u32) -> FunctionDef {
        FunctionDef {
            name: name.into(),
            offset,
            params: vec![Param::new("x", ParamKind::Int)],
            locals: 2,
            returns: true,
            exported: true,
            safe: false,
        }
    }

    #[test]
    fn roundtrips_through_bytes() {
        let program = Program::new(
            ret_code(8),
            vec![simple_function("alpha", 0), simple_function("beta", 4)],
            3,
        )
        .unwrap();
        let bytes = program.to_bytes().unwrap();
        let decoded = Program::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, program);
        assert_eq!(decoded.checksum(), program.checksum());
    }

    #[test]
    fn checksum_tracks_content() {
        let a = Program::new(ret_code(4), vec![simple_function("f", 0)], 0).unwrap();
        let b = Program::new(ret_code(4), vec![simple_function("f", 1)], 0).unwrap();
        assert_ne!(a.checksum(), b.checksum());
    }

    #[test]
    fn rejects_offset_outside_code() {
        let err = Program::new(ret_code(4), vec![simple_function("f", 4)], 0);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_duplicate_function_names() {
        let err = Program::new(
            ret_code(4),
            vec![simple_function("f", 0), simple_function("f", 1)],
            0,
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_duplicate_parameter_names() {
        let func = FunctionDef {
            name: "f".into(),
            offset: 0,
            params: vec![
                Param::new("x", ParamKind::Int),
                Param::new("x", ParamKind::Bool),
            ],
            locals: 0,
            returns: false,
            exported: false,
            safe: false,
        };
        assert!(Program::new(ret_code(4), vec![func], 0).is_err());
    }

    #[test]
    fn rejects_unknown_flag_bits() {
        let program = Program::new(ret_code(4), vec![simple_function("f", 0)], 0).unwrap();
        let mut bytes = program.to_bytes().unwrap();
        // The flags byte is the last function byte before the globals u16.
        let flags_at = bytes.len() - 3;
        bytes[flags_at] |= 0x80;
        assert!(Program::from_bytes(&bytes).is_err());
    }

    #[test]
    fn function_lookup_by_name() {
        let program = Program::new(
            ret_code(8),
            vec![simple_function("alpha", 0), simple_function("beta", 4)],
            0,
        )
        .unwrap();
        let (index, func) = program.function_named("beta").unwrap();
        assert_eq!(index, 1);
        assert_eq!(func.offset, 4);
        assert!(program.function_named("gamma").is_none());
    }
}
