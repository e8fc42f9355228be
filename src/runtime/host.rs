//! Host-provided modules
//!
//! Embedders publish host functions, globals, memories, and tables by
//! building a [`HostModule`] and registering it in the store under a name.
//! Wasm modules then import those entities exactly as they would import from
//! another wasm module.

use crate::syntax::{GlobalType, MemoryType, TableType};

use super::func::FuncInst;
use super::global::{GlobalError, GlobalInst};
use super::instance::{ExternVal, ModuleInst};
use super::memory::{MemoryError, MemoryInst};
use super::table::{TableError, TableInst};
use super::Value;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Builder for a module made entirely of host-provided exports
#[derive(Debug, Default)]
pub struct HostModule {
    exports: HashMap<String, ExternVal>,
}

impl HostModule {
    pub fn new() -> Self {
        HostModule::default()
    }

    /// Export a function
    pub fn func(mut self, name: impl Into<String>, func: FuncInst) -> Self {
        self.exports.insert(name.into(), ExternVal::Func(func));
        self
    }

    /// Export a global initialised to `value`
    pub fn global(mut self, name: impl Into<String>, ty: GlobalType, value: Value) -> Result<Self, GlobalError> {
        let global = GlobalInst::alloc(ty, value)?;
        self.exports.insert(name.into(), ExternVal::Global(Rc::new(global)));
        Ok(self)
    }

    /// Export a fresh zeroed memory
    pub fn memory(mut self, name: impl Into<String>, ty: MemoryType) -> Result<Self, MemoryError> {
        let memory = MemoryInst::alloc(&ty)?;
        self.exports
            .insert(name.into(), ExternVal::Memory(Rc::new(RefCell::new(memory))));
        Ok(self)
    }

    /// Export a fresh empty table
    pub fn table(mut self, name: impl Into<String>, ty: TableType) -> Result<Self, TableError> {
        let table = TableInst::alloc(&ty)?;
        self.exports
            .insert(name.into(), ExternVal::Table(Rc::new(RefCell::new(table))));
        Ok(self)
    }

    /// Export an existing extern, sharing it with other modules
    pub fn extern_val(mut self, name: impl Into<String>, value: ExternVal) -> Self {
        self.exports.insert(name.into(), value);
        self
    }

    pub(super) fn into_instance(self) -> ModuleInst {
        ModuleInst {
            exports: self.exports,
            ..ModuleInst::default()
        }
    }
}
