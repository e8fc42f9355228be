//! Global variable instances
//!
//! A global is a typed single-slot mutable cell. Execution is single-threaded,
//! so interior mutability through `Cell` suffices; the cell is shared between
//! the owning module instance and any module that imports it.

use crate::syntax::GlobalType;

use super::Value;

use std::cell::Cell;

/// Failures raised by global allocation and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GlobalError {
    #[error("write to immutable global")]
    NotMutable,
    #[error("type mismatch at global write")]
    Type,
}

/// A WebAssembly global instance
#[derive(Debug)]
pub struct GlobalInst {
    ty: GlobalType,
    value: Cell<Value>,
}

impl GlobalInst {
    /// Allocate a global holding `value`, which must match the declared type
    pub fn alloc(ty: GlobalType, value: Value) -> Result<Self, GlobalError> {
        if value.typ() != ty.value_type {
            return Err(GlobalError::Type);
        }
        Ok(GlobalInst {
            ty,
            value: Cell::new(value),
        })
    }

    pub fn ty(&self) -> GlobalType {
        self.ty
    }

    /// Read the current value
    pub fn load(&self) -> Value {
        self.value.get()
    }

    /// Write a new value; fails on immutable globals and type mismatches
    pub fn store(&self, value: Value) -> Result<(), GlobalError> {
        if !self.ty.mutable {
            return Err(GlobalError::NotMutable);
        }
        if value.typ() != self.ty.value_type {
            return Err(GlobalError::Type);
        }
        self.value.set(value);
        Ok(())
    }
}
