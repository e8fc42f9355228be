//! The module store
//!
//! The store maps integer [`ModuleRef`]s to module instances and is the only
//! way executing code reaches a module: a function instance records the ref
//! of its owning module, and the interpreter resolves it here at call time.
//! This indirection is what keeps the instance graph acyclic.
//!
//! Execution never changes the shape of the store; all run-time mutation
//! goes through the interior-mutable cells held by the instances.

use super::executor;
use super::host::HostModule;
use super::instance::{ExternVal, ModuleInst};
use super::{EvalError, Value};

use crate::syntax::Region;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// An opaque integer key naming a module instance in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleRef(pub u32);

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// Owns all module instances and dispatches exported functions and globals
#[derive(Debug, Default)]
pub struct Store {
    modules: HashMap<ModuleRef, Rc<ModuleInst>>,
}

impl Store {
    /// Create a new empty store
    pub fn new() -> Self {
        Store::default()
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Get a registered instance
    pub fn instance(&self, module: ModuleRef) -> Option<&Rc<ModuleInst>> {
        self.modules.get(&module)
    }

    /// The smallest positive integer not currently a key, searched upward
    /// from `max(1, len)`. Keys stay dense under the usual
    /// instantiate-only workload.
    pub(super) fn next_key(&self) -> ModuleRef {
        let mut candidate = std::cmp::max(1, self.modules.len() as u32);
        while self.modules.contains_key(&ModuleRef(candidate)) {
            candidate += 1;
        }
        ModuleRef(candidate)
    }

    pub(super) fn insert(&mut self, module: ModuleRef, inst: Rc<ModuleInst>) {
        self.modules.insert(module, inst);
    }

    pub(super) fn remove(&mut self, module: ModuleRef) {
        self.modules.remove(&module);
    }

    /// Register a host-provided module, making its exports importable
    pub fn allocate_host_module(&mut self, host: HostModule) -> ModuleRef {
        let module = self.next_key();
        self.insert(module, Rc::new(host.into_instance()));
        tracing::debug!(%module, "registered host module");
        module
    }

    /// Invoke an exported function by name
    ///
    /// Drives the interpreter until the function returns, traps, or exhausts
    /// its call budget. Results are bottom-of-stack first, matching the
    /// function's declared result order.
    pub fn invoke_export(
        &self,
        module: ModuleRef,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, EvalError> {
        tracing::trace!(%module, name, args = args.len(), "invoke export");
        match self.lookup_export(module, name)? {
            ExternVal::Func(func) => executor::invoke_function(self, module, func.clone(), args),
            _ => Err(EvalError::crash(
                Region::default(),
                format!("{name} is not a function export"),
            )),
        }
    }

    /// Read an exported global by name
    pub fn get_global_export(&self, module: ModuleRef, name: &str) -> Result<Value, EvalError> {
        match self.lookup_export(module, name)? {
            ExternVal::Global(global) => Ok(global.load()),
            _ => Err(EvalError::crash(
                Region::default(),
                format!("{name} is not a global export"),
            )),
        }
    }

    fn lookup_export(&self, module: ModuleRef, name: &str) -> Result<&ExternVal, EvalError> {
        let inst = self
            .instance(module)
            .ok_or_else(|| EvalError::crash(Region::default(), format!("unknown module reference {module}")))?;
        inst.export(name)
            .ok_or_else(|| EvalError::crash(Region::default(), format!("unknown export: {name}")))
    }
}
