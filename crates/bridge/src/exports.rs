//! Build-time export tables.
//!
//! The names a module may expose are fixed when its host-side entry stubs
//! are generated, not discovered from whatever the loaded snapshot happens
//! to define. The registry later intersects this table with the program's
//! own function table, so a stale snapshot can neither add nor resurrect
//! an export.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTable {
    modules: BTreeMap<String, BTreeSet<String>>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `names` as the fixed export set for `module`. Repeated
    /// calls for the same module extend the set.
    pub fn with_module<I, S>(mut self, module: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.modules.entry(module.into()).or_default();
        entry.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn names(&self, module: &str) -> Option<&BTreeSet<String>> {
        self.modules.get(module)
    }

    pub fn contains(&self, module: &str, function: &str) -> bool {
        self.modules
            .get(module)
            .is_some_and(|names| names.contains(function))
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}
