//! The frozen module state: program, globals, persistent heap.

use std::collections::BTreeMap;

use floe_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};

use crate::program::Program;
use crate::value::Value;

/// Longest accepted persistent-heap key.
pub const MAX_STORAGE_KEY_LEN: usize = 128;
/// Largest accepted persistent-heap value.
pub const MAX_STORAGE_VALUE_LEN: usize = 1 << 16;
/// Most entries the persistent heap may hold.
pub const MAX_STORAGE_ENTRIES: usize = 1 << 16;

/// A deserialized snapshot: everything an invocation executes against.
///
/// The persistent heap is an ordered map so the state has exactly one
/// canonical encoding; decoding verifies the ordering rather than trusting
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleState {
    pub(crate) program: Program,
    pub(crate) globals: Vec<Value>,
    pub(crate) storage: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl ModuleState {
    /// Fresh state for `program` with null globals and an empty heap.
    pub fn new(program: Program) -> Self {
        let globals = vec![Value::Null; program.globals() as usize];
        Self {
            program,
            globals,
            storage: BTreeMap::new(),
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    pub fn storage(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.storage
    }

    /// Mutable heap access for deploy-time state construction. Invocations
    /// mutate storage only through the interpreter's syscalls.
    pub fn storage_mut(&mut self) -> &mut BTreeMap<Vec<u8>, Vec<u8>> {
        &mut self.storage
    }
}

impl Serializable for ModuleState {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.program.serialize(writer)?;
        writer.write_var_int(self.globals.len() as u64);
        for value in &self.globals {
            value.serialize(writer)?;
        }
        writer.write_var_int(self.storage.len() as u64);
        for (key, value) in &self.storage {
            writer.write_var_bytes(key);
            writer.write_var_bytes(value);
        }
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let program = Program::deserialize(reader)?;

        let global_count = reader.read_var_int()?;
        if global_count != program.globals() as u64 {
            return Err(IoError::invalid_data(format!(
                "global count {} does not match declared {}",
                global_count,
                program.globals()
            )));
        }
        let mut globals = Vec::with_capacity(global_count as usize);
        for _ in 0..global_count {
            globals.push(Value::deserialize(reader)?);
        }

        let entry_count = reader.read_var_int()?;
        if entry_count > MAX_STORAGE_ENTRIES as u64 {
            return Err(IoError::invalid_data("too many storage entries"));
        }
        let mut storage = BTreeMap::new();
        let mut previous: Option<Vec<u8>> = None;
        for _ in 0..entry_count {
            let key = reader.read_var_bytes(MAX_STORAGE_KEY_LEN)?;
            let value = reader.read_var_bytes(MAX_STORAGE_VALUE_LEN)?;
            if let Some(prev) = &previous {
                if *prev >= key {
                    return Err(IoError::invalid_data(
                        "storage keys out of canonical order",
                    ));
                }
            }
            previous = Some(key.clone());
            storage.insert(key, value);
        }

        Ok(ModuleState {
            program,
            globals,
            storage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op_code::OpCode;
    use crate::program::{FunctionDef, Param, ParamKind};
    use crate::script::Script;

    fn sample_program() -> Program {
        Program::new(
            Script::new(vec![OpCode::Ret as u8, OpCode::Ret as u8]),
            vec![FunctionDef {
                name: "tick".into(),
                offset: 0,
                params: vec![Param::new("n", ParamKind::Int)],
                locals: 0,
                returns: false,
                exported: true,
                safe: false,
            }],
            2,
        )
        .unwrap()
    }

    #[test]
    fn new_state_nulls_globals() {
        let state = ModuleState::new(sample_program());
        assert_eq!(state.globals(), &[Value::Null, Value::Null]);
        assert!(state.storage().is_empty());
    }

    #[test]
    fn roundtrips_with_heap_entries() {
        let mut state = ModuleState::new(sample_program());
        state.globals[0] = Value::from(41i64);
        state.storage_mut().insert(b"admin".to_vec(), b"alice".to_vec());
        state
            .storage_mut()
            .insert(b"pot_size".to_vec(), b"0".to_vec());

        let bytes = state.to_bytes().unwrap();
        let decoded = ModuleState::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn rejects_global_count_mismatch() {
        let state = ModuleState::new(sample_program());
        let mut w = BinaryWriter::new();
        state.program.serialize(&mut w).unwrap();
        // Claim one global where the program declares two.
        w.write_var_int(1);
        Value::Null.serialize(&mut w).unwrap();
        w.write_var_int(0);
        assert!(ModuleState::from_bytes(&w.into_bytes()).is_err());
    }

    #[test]
    fn rejects_unsorted_storage_keys() {
        let state = ModuleState::new(sample_program());
        let mut w = BinaryWriter::new();
        state.program.serialize(&mut w).unwrap();
        w.write_var_int(2);
        Value::Null.serialize(&mut w).unwrap();
        Value::Null.serialize(&mut w).unwrap();
        w.write_var_int(2);
        w.write_var_bytes(b"b");
        w.write_var_bytes(b"1");
        w.write_var_bytes(b"a");
        w.write_var_bytes(b"2");
        assert!(ModuleState::from_bytes(&w.into_bytes()).is_err());
    }
}
