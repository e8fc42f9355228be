//! Module instances and external values
//!
//! A [`ModuleInst`] is the runtime instantiation of a module: resolved
//! imports followed by module-own entities, plus the export map. Imported
//! entities occupy the low indices of each vector so that module-local
//! indices address correctly without translation.
//!
//! Entities are shared-ownership handles (`Rc`), never container inclusion:
//! a module importing another's memory holds a handle to the same cell, and
//! no cycles arise because functions name their owning module by
//! [`ModuleRef`](super::ModuleRef), not by pointer.

use crate::syntax::{FuncType, GlobalType, Limits, MemoryType, Module, TableType};

use super::func::FuncInst;
use super::global::GlobalInst;
use super::memory::MemoryInst;
use super::table::TableInst;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A value that can cross module boundaries via import/export
#[derive(Debug, Clone)]
pub enum ExternVal {
    Func(FuncInst),
    Table(Rc<RefCell<TableInst>>),
    Memory(Rc<RefCell<MemoryInst>>),
    Global(Rc<GlobalInst>),
}

impl ExternVal {
    /// The current external type of this value
    ///
    /// Tables and memories report their current size as the minimum, which is
    /// what import matching compares against.
    pub fn extern_type(&self) -> ExternType {
        match self {
            ExternVal::Func(f) => ExternType::Func(f.ty().clone()),
            ExternVal::Table(t) => ExternType::Table(t.borrow().ty()),
            ExternVal::Memory(m) => ExternType::Memory(m.borrow().ty()),
            ExternVal::Global(g) => ExternType::Global(g.ty()),
        }
    }
}

/// The type of an external value
#[derive(Debug, Clone, PartialEq)]
pub enum ExternType {
    Func(FuncType),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

impl ExternType {
    /// Import subtyping: does an `actual` extern satisfy an `expected`
    /// import declaration?
    ///
    /// Function and global types match exactly; table and memory limits
    /// match when the actual minimum is at least the expected one and the
    /// actual maximum does not exceed an expected maximum.
    pub fn matches(&self, expected: &ExternType) -> bool {
        match (self, expected) {
            (ExternType::Func(a), ExternType::Func(e)) => a == e,
            (ExternType::Global(a), ExternType::Global(e)) => a == e,
            (ExternType::Table(a), ExternType::Table(e)) => limits_match(&a.limits, &e.limits),
            (ExternType::Memory(a), ExternType::Memory(e)) => limits_match(&a.limits, &e.limits),
            _ => false,
        }
    }
}

fn limits_match(actual: &Limits, expected: &Limits) -> bool {
    if actual.min < expected.min {
        return false;
    }
    match expected.max {
        None => true,
        Some(expected_max) => match actual.max {
            Some(actual_max) => actual_max <= expected_max,
            None => false,
        },
    }
}

/// A runtime module instance
#[derive(Debug, Clone, Default)]
pub struct ModuleInst {
    /// The decoded module this instance was created from
    pub module: Rc<Module>,
    /// The module's type vector
    pub types: Vec<FuncType>,
    /// Function index space: imports first, then module-defined
    pub funcs: Vec<FuncInst>,
    /// Table index space
    pub tables: Vec<Rc<RefCell<TableInst>>>,
    /// Memory index space
    pub memories: Vec<Rc<RefCell<MemoryInst>>>,
    /// Global index space
    pub globals: Vec<Rc<GlobalInst>>,
    /// Exports by name
    pub exports: HashMap<String, ExternVal>,
}

impl ModuleInst {
    /// An instance holding only the module AST and its types; imports and
    /// allocations are filled in by the instantiation pipeline.
    pub fn new(module: Rc<Module>) -> ModuleInst {
        ModuleInst {
            types: module.types.clone(),
            module,
            ..ModuleInst::default()
        }
    }

    /// Look up an export by name
    pub fn export(&self, name: &str) -> Option<&ExternVal> {
        self.exports.get(name)
    }
}
