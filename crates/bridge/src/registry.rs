//! Per-snapshot function registry.

use std::collections::BTreeMap;

use floe_vm::{Param, Program};

use crate::exports::ExportTable;
use crate::fault::{Fault, FaultKind};

/// A resolved dispatch target, pinned to the program it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub name: String,
    /// Index into the program's function table.
    pub index: usize,
    pub offset: u32,
    pub params: Vec<Param>,
    pub returns: bool,
    pub safe: bool,
    /// Checksum of the program this entry was built from; invoking it
    /// against any other program is refused.
    pub program_checksum: u32,
}

/// The exported-name table of one loaded snapshot.
///
/// A name resolves only when all three hold: it is in the build-time
/// export set for the module, the program defines it, and the definition
/// is flagged exported. Entries live in a `BTreeMap`, so identical
/// snapshot bytes always produce the identical registry.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    module: String,
    entries: BTreeMap<String, FunctionEntry>,
    program_checksum: u32,
}

impl FunctionRegistry {
    pub fn build(module: &str, exports: &ExportTable, program: &Program) -> Self {
        let program_checksum = program.checksum();
        let mut entries = BTreeMap::new();
        if let Some(allowed) = exports.names(module) {
            for (index, func) in program.functions().iter().enumerate() {
                if !func.exported || !allowed.contains(func.name.as_str()) {
                    continue;
                }
                entries.insert(
                    func.name.clone(),
                    FunctionEntry {
                        name: func.name.clone(),
                        index,
                        offset: func.offset,
                        params: func.params.clone(),
                        returns: func.returns,
                        safe: func.safe,
                        program_checksum,
                    },
                );
            }
        }
        log::debug!(
            "registry for `{module}`: {} of {} function(s) exported",
            entries.len(),
            program.functions().len()
        );
        FunctionRegistry {
            module: module.to_owned(),
            entries,
            program_checksum,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn program_checksum(&self) -> u32 {
        self.program_checksum
    }

    /// Pure lookup; no side effects on the snapshot.
    pub fn resolve(&self, function: &str) -> Result<&FunctionEntry, Fault> {
        self.entries
            .get(function)
            .ok_or_else(|| Fault::unknown_function(&self.module, function))
    }

    /// Exported names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floe_vm::{FunctionDef, OpCode, ParamKind, Script};

    fn program() -> Program {
        let def = |name: &str, offset: u32, exported: bool| FunctionDef {
            name: name.into(),
            offset,
            params: vec![Param::new("team", ParamKind::String)],
            locals: 0,
            returns: false,
            exported,
            safe: false,
        };
        Program::new(
            Script::new(vec![OpCode::Ret as u8, OpCode::Ret as u8, OpCode::Ret as u8]),
            vec![
                def("join_game", 0, true),
                def("settle_internal", 1, false),
                def("undeclared_extra", 2, true),
            ],
            0,
        )
        .unwrap()
    }

    fn exports() -> ExportTable {
        ExportTable::new().with_module(
            "betting",
            ["join_game", "settle_internal", "dropped_by_upgrade"],
        )
    }

    #[test]
    fn admits_only_the_triple_intersection() {
        let registry = FunctionRegistry::build("betting", &exports(), &program());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["join_game"]);

        // Defined and in the table, but not flagged exported.
        let err = registry.resolve("settle_internal").unwrap_err();
        assert_eq!(err.kind, FaultKind::UnknownFunction);

        // Defined and flagged, but never in the build-time table.
        assert!(registry.resolve("undeclared_extra").is_err());

        // In the table, but the loaded program no longer defines it.
        assert!(registry.resolve("dropped_by_upgrade").is_err());
    }

    #[test]
    fn resolve_carries_the_signature() {
        let registry = FunctionRegistry::build("betting", &exports(), &program());
        let entry = registry.resolve("join_game").unwrap();
        assert_eq!(entry.index, 0);
        assert_eq!(entry.params.len(), 1);
        assert_eq!(entry.program_checksum, program().checksum());
    }

    #[test]
    fn unknown_module_yields_an_empty_registry() {
        let registry = FunctionRegistry::build("lottery", &exports(), &program());
        assert!(registry.is_empty());
        assert_eq!(
            registry.resolve("join_game").unwrap_err().kind,
            FaultKind::UnknownFunction
        );
    }
}
