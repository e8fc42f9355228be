//! WebAssembly table implementation
//!
//! A table is a bounded vector of optional function references. Slots start
//! empty; element segments fill them at instantiation, and `call_indirect`
//! reads them at run time. Type checking at the call site must be rigorous:
//! any signature mismatch traps.

use crate::syntax::{Limits, TableType};

use super::FuncInst;

/// Failures raised by table allocation and access
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("out of bounds table access")]
    Bounds,
    #[error("table size exceeded")]
    SizeExceeded,
}

/// A WebAssembly table instance
#[derive(Debug)]
pub struct TableInst {
    /// The elements; None is an uninitialised slot
    elements: Vec<Option<FuncInst>>,

    /// Declared maximum size, if any
    max: Option<u32>,
}

impl TableInst {
    /// Allocate a table for the given declaration
    ///
    /// Rejects declarations whose minimum exceeds their maximum.
    pub fn alloc(ty: &TableType) -> Result<Self, TableError> {
        if let Some(max) = ty.limits.max {
            if ty.limits.min > max {
                return Err(TableError::SizeExceeded);
            }
        }
        Ok(TableInst {
            elements: vec![None; ty.limits.min as usize],
            max: ty.limits.max,
        })
    }

    /// Current number of slots
    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    /// The table's current type: current size as minimum, declared maximum
    pub fn ty(&self) -> TableType {
        TableType {
            limits: Limits {
                min: self.size(),
                max: self.max,
            },
        }
    }

    /// Read slot `index`
    ///
    /// Returns `None` both for an out-of-bounds index and an uninitialised
    /// slot; `call_indirect` treats either as an uninitialised element.
    pub fn load(&self, index: u32) -> Option<FuncInst> {
        self.elements.get(index as usize).and_then(|slot| slot.clone())
    }

    /// Write a run of function references starting at `offset`
    ///
    /// The whole run must fit; a partial write never happens.
    pub fn blit(&mut self, offset: u32, funcs: &[FuncInst]) -> Result<(), TableError> {
        let end = (offset as usize)
            .checked_add(funcs.len())
            .ok_or(TableError::Bounds)?;
        if end > self.elements.len() {
            return Err(TableError::Bounds);
        }
        for (slot, func) in self.elements[offset as usize..end].iter_mut().zip(funcs) {
            *slot = Some(func.clone());
        }
        Ok(())
    }

    /// Grow the table by `delta` empty slots, returning the previous size
    pub fn grow(&mut self, delta: u32) -> Result<u32, TableError> {
        let old_size = self.size();
        let new_size = old_size.checked_add(delta).ok_or(TableError::SizeExceeded)?;
        if let Some(max) = self.max {
            if new_size > max {
                return Err(TableError::SizeExceeded);
            }
        }
        self.elements.resize(new_size as usize, None);
        Ok(old_size)
    }
}
