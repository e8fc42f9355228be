//! Module instantiation
//!
//! Linking and allocation happen in specification order: resolve imports,
//! allocate module-own entities, evaluate global initialisers, apply element
//! and data segments, publish exports, then run the start function. Segment
//! application is not transactional: segments run in declared order and a
//! later failure leaves earlier writes in place.

use crate::syntax::{ExportDesc, Expr, Import, ImportDesc, Module, Region};

use super::executor;
use super::func::FuncInst;
use super::global::GlobalInst;
use super::instance::{ExternType, ExternVal, ModuleInst};
use super::memory::MemoryInst;
use super::store::{ModuleRef, Store};
use super::table::TableInst;
use super::{EvalError, Value};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

impl Store {
    /// Instantiate `module`, resolving its imports through `names`, a
    /// host-supplied registry mapping module names to registered instances.
    ///
    /// On success the instance is registered in the store under the returned
    /// ref. On failure nothing is registered, although writes already made
    /// through imported (shared) tables and memories remain.
    pub fn instantiate(
        &mut self,
        module: &Module,
        names: &HashMap<String, ModuleRef>,
    ) -> Result<ModuleRef, EvalError> {
        let module = Rc::new(module.clone());
        let mut inst = ModuleInst::new(module.clone());

        // Resolve imports in declared order; each kind appends to its index
        // space so imports occupy the low indices
        for import in &module.imports {
            match self.resolve_import(&module, import, names)? {
                ExternVal::Func(func) => inst.funcs.push(func),
                ExternVal::Table(table) => inst.tables.push(table),
                ExternVal::Memory(memory) => inst.memories.push(memory),
                ExternVal::Global(global) => inst.globals.push(global),
            }
        }

        let module_ref = self.next_key();

        // Allocate module-own entities. Functions record the ref so calls
        // resolve in this module even when reached from another instance.
        for func in &module.funcs {
            let ty = module
                .types
                .get(func.type_idx as usize)
                .cloned()
                .ok_or_else(|| EvalError::crash(Region::default(), format!("unknown type index {}", func.type_idx)))?;
            inst.funcs.push(FuncInst::ast(ty, module_ref, Rc::new(func.clone())));
        }
        for table_type in &module.tables {
            let table = TableInst::alloc(table_type).map_err(|err| EvalError::link(Region::default(), err.to_string()))?;
            inst.tables.push(Rc::new(RefCell::new(table)));
        }
        for memory_type in &module.memories {
            let memory =
                MemoryInst::alloc(memory_type).map_err(|err| EvalError::link(Region::default(), err.to_string()))?;
            inst.memories.push(Rc::new(RefCell::new(memory)));
        }

        // Global initialisers are evaluated against the in-progress instance,
        // which already holds the resolved imports
        for def in &module.globals {
            let value = self.eval_with_snapshot(module_ref, &inst, &def.init)?;
            let global =
                GlobalInst::alloc(def.ty, value).map_err(|err| EvalError::link(Region::default(), err.to_string()))?;
            inst.globals.push(Rc::new(global));
        }

        self.apply_element_segments(module_ref, &module, &inst)?;
        self.apply_data_segments(module_ref, &module, &inst)?;

        for export in &module.exports {
            let value = export_value(&inst, export.desc)?;
            inst.exports.insert(export.name.clone(), value);
        }

        tracing::debug!(
            module = %module_ref,
            funcs = inst.funcs.len(),
            tables = inst.tables.len(),
            memories = inst.memories.len(),
            globals = inst.globals.len(),
            "module instantiated"
        );

        // Register before running the start function so its calls resolve;
        // deregister again if it fails
        self.insert(module_ref, Rc::new(inst));
        if let Some(start) = module.start {
            let func = self
                .instance(module_ref)
                .and_then(|inst| inst.funcs.get(start as usize).cloned());
            let run = match func {
                Some(func) => executor::invoke_function(self, module_ref, func, Vec::new()),
                None => Err(EvalError::crash(
                    Region::default(),
                    format!("unknown function index {start}"),
                )),
            };
            if let Err(err) = run {
                self.remove(module_ref);
                return Err(err);
            }
        }

        Ok(module_ref)
    }

    fn resolve_import(
        &self,
        module: &Module,
        import: &Import,
        names: &HashMap<String, ModuleRef>,
    ) -> Result<ExternVal, EvalError> {
        let full_name = format!("{}.{}", import.module, import.name);

        let exporter_ref = names
            .get(&import.module)
            .ok_or_else(|| EvalError::link(Region::default(), format!("Missing module for import: {full_name}")))?;
        let exporter = self
            .instance(*exporter_ref)
            .ok_or_else(|| EvalError::link(Region::default(), format!("Missing module for import: {full_name}")))?;
        let value = exporter
            .export(&import.name)
            .ok_or_else(|| EvalError::link(Region::default(), format!("Missing extern for import: {full_name}")))?;

        let expected = match &import.desc {
            ImportDesc::Func(type_idx) => {
                let ty = module.types.get(*type_idx as usize).cloned().ok_or_else(|| {
                    EvalError::crash(Region::default(), format!("unknown type index {type_idx}"))
                })?;
                ExternType::Func(ty)
            }
            ImportDesc::Table(ty) => ExternType::Table(*ty),
            ImportDesc::Memory(ty) => ExternType::Memory(*ty),
            ImportDesc::Global(ty) => ExternType::Global(*ty),
        };
        if !value.extern_type().matches(&expected) {
            return Err(EvalError::link(Region::default(), "incompatible import type"));
        }

        Ok(value.clone())
    }

    /// Evaluate a constant expression against an instance that is still
    /// being built, by registering a snapshot of it for the duration
    fn eval_with_snapshot(
        &mut self,
        module_ref: ModuleRef,
        inst: &ModuleInst,
        expr: &Expr,
    ) -> Result<Value, EvalError> {
        self.insert(module_ref, Rc::new(inst.clone()));
        let result = executor::eval_const_expr(self, module_ref, expr);
        self.remove(module_ref);
        result
    }

    fn apply_element_segments(
        &mut self,
        module_ref: ModuleRef,
        module: &Module,
        inst: &ModuleInst,
    ) -> Result<(), EvalError> {
        for segment in &module.elements {
            let table = inst
                .tables
                .get(segment.table as usize)
                .cloned()
                .ok_or_else(|| EvalError::crash(Region::default(), format!("undefined table {}", segment.table)))?;

            let offset = self.eval_with_snapshot(module_ref, inst, &segment.offset)?;
            let offset = offset
                .as_i32()
                .ok_or_else(|| EvalError::crash(Region::default(), "element segment offset must be i32"))?
                as u32;

            let does_not_fit = || EvalError::link(Region::default(), "elements segment does not fit table");
            let end = offset.checked_add(segment.init.len() as u32).ok_or_else(does_not_fit)?;
            if end > table.borrow().size() {
                return Err(does_not_fit());
            }

            let funcs = segment
                .init
                .iter()
                .map(|index| {
                    inst.funcs.get(*index as usize).cloned().ok_or_else(|| {
                        EvalError::crash(Region::default(), format!("unknown function index {index}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            table.borrow_mut().blit(offset, &funcs).map_err(|_| does_not_fit())?;
        }
        Ok(())
    }

    fn apply_data_segments(
        &mut self,
        module_ref: ModuleRef,
        module: &Module,
        inst: &ModuleInst,
    ) -> Result<(), EvalError> {
        for segment in &module.data {
            let memory = inst
                .memories
                .get(segment.memory as usize)
                .cloned()
                .ok_or_else(|| EvalError::crash(Region::default(), format!("undefined memory {}", segment.memory)))?;

            let offset = self.eval_with_snapshot(module_ref, inst, &segment.offset)?;
            let offset = offset
                .as_i32()
                .ok_or_else(|| EvalError::crash(Region::default(), "data segment offset must be i32"))?
                as u32 as u64;

            let does_not_fit = || EvalError::link(Region::default(), "data segment does not fit memory");
            let end = offset + segment.bytes.len() as u64;
            if end > memory.borrow().bound() {
                return Err(does_not_fit());
            }
            memory
                .borrow_mut()
                .store_bytes(offset, &segment.bytes)
                .map_err(|_| does_not_fit())?;
        }
        Ok(())
    }
}

fn export_value(inst: &ModuleInst, desc: ExportDesc) -> Result<ExternVal, EvalError> {
    let missing = |kind: &str, index: u32| EvalError::crash(Region::default(), format!("unknown {kind} index {index}"));
    Ok(match desc {
        ExportDesc::Func(index) => {
            ExternVal::Func(inst.funcs.get(index as usize).cloned().ok_or_else(|| missing("function", index))?)
        }
        ExportDesc::Table(index) => {
            ExternVal::Table(inst.tables.get(index as usize).cloned().ok_or_else(|| missing("table", index))?)
        }
        ExportDesc::Memory(index) => {
            ExternVal::Memory(inst.memories.get(index as usize).cloned().ok_or_else(|| missing("memory", index))?)
        }
        ExportDesc::Global(index) => {
            ExternVal::Global(inst.globals.get(index as usize).cloned().ok_or_else(|| missing("global", index))?)
        }
    })
}
