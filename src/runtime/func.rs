//! Function instances
//!
//! A function instance is either a module-defined function (executed by the
//! interpreter in its owning module's context) or a host function. Host
//! functions come in two flavours: infallible, and fallible where an `Err`
//! surfaces as a trap. Host traps are an explicit return value, never a
//! panic.

use crate::syntax::{FuncType, Function};

use super::store::ModuleRef;
use super::Value;

use std::rc::Rc;

/// Signature of an infallible host function
pub type HostFn = dyn Fn(Vec<Value>) -> Vec<Value>;

/// Signature of a fallible host function; `Err` becomes a trap
pub type FallibleHostFn = dyn Fn(Vec<Value>) -> Result<Vec<Value>, String>;

/// A callable function instance
///
/// Cloning is cheap: the code or closure is behind an `Rc`. The `Ast`
/// variant records its owning module so `call` and `call_indirect` targets
/// resolve locals and globals in the callee's module, not the caller's.
#[derive(Clone)]
pub enum FuncInst {
    /// Function defined by a module, executed by the interpreter
    Ast {
        ty: FuncType,
        module: ModuleRef,
        code: Rc<Function>,
    },
    /// Host function that cannot fail
    Host { ty: FuncType, func: Rc<HostFn> },
    /// Host function whose failure becomes a trap
    HostFallible { ty: FuncType, func: Rc<FallibleHostFn> },
}

impl FuncInst {
    /// Allocate a module-defined function owned by `module`
    pub fn ast(ty: FuncType, module: ModuleRef, code: Rc<Function>) -> FuncInst {
        FuncInst::Ast { ty, module, code }
    }

    /// Wrap an infallible host function
    pub fn host(ty: FuncType, func: impl Fn(Vec<Value>) -> Vec<Value> + 'static) -> FuncInst {
        FuncInst::Host {
            ty,
            func: Rc::new(func),
        }
    }

    /// Wrap a fallible host function; an `Err` result traps with its message
    pub fn host_fallible(
        ty: FuncType,
        func: impl Fn(Vec<Value>) -> Result<Vec<Value>, String> + 'static,
    ) -> FuncInst {
        FuncInst::HostFallible {
            ty,
            func: Rc::new(func),
        }
    }

    /// The declared type, regardless of variant
    pub fn ty(&self) -> &FuncType {
        match self {
            FuncInst::Ast { ty, .. } | FuncInst::Host { ty, .. } | FuncInst::HostFallible { ty, .. } => ty,
        }
    }
}

impl std::fmt::Debug for FuncInst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FuncInst::Ast { ty, module, .. } => f
                .debug_struct("Ast")
                .field("ty", ty)
                .field("module", module)
                .finish_non_exhaustive(),
            FuncInst::Host { ty, .. } => f.debug_struct("Host").field("ty", ty).finish_non_exhaustive(),
            FuncInst::HostFallible { ty, .. } => {
                f.debug_struct("HostFallible").field("ty", ty).finish_non_exhaustive()
            }
        }
    }
}
