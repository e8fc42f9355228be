//! WebAssembly linear memory implementation
//!
//! Provides safe, bounds-checked access to linear memory. Addressing uses a
//! 64-bit effective address (zero-extended i32 base plus static offset), so
//! range checks cannot wrap.
//!
//! Memory layout follows the WebAssembly specification:
//! - Page size: 64KB (65,536 bytes)
//! - Address space: 32-bit (max 4GB)
//! - Out-of-bounds access: traps (runtime error)

use crate::syntax::{MemoryType, PackSize, Signedness, ValueType};

use super::Value;

/// WebAssembly page size in bytes (64KB)
pub const PAGE_SIZE: u64 = 65536;

/// Maximum number of pages (2^16 = 64K pages = 4GB total)
pub const MAX_PAGES: u32 = 65536;

/// Failures raised by memory allocation and access
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("out of bounds memory access")]
    Bounds,
    #[error("memory size overflow")]
    SizeOverflow,
    #[error("memory size limit reached")]
    SizeLimit,
    #[error("type mismatch at memory access")]
    Type,
    #[error("out of memory")]
    OutOfMemory,
}

/// A WebAssembly linear memory instance
///
/// All access is bounds-checked before touching the underlying data; growth
/// validates against the declared and system maximums.
#[derive(Debug)]
pub struct MemoryInst {
    /// The actual memory data, always a whole number of pages
    data: Vec<u8>,

    /// Maximum size in pages (None = system maximum)
    max_pages: Option<u32>,
}

impl MemoryInst {
    /// Allocate a zeroed memory for the given declaration
    pub fn alloc(ty: &MemoryType) -> Result<Self, MemoryError> {
        let min = ty.limits.min;
        if min > MAX_PAGES {
            return Err(MemoryError::SizeLimit);
        }
        if let Some(max) = ty.limits.max {
            if min > max || max > MAX_PAGES {
                return Err(MemoryError::SizeLimit);
            }
        }

        let initial_bytes = min as u64 * PAGE_SIZE;
        let mut data = Vec::new();
        data.try_reserve_exact(initial_bytes as usize)
            .map_err(|_| MemoryError::OutOfMemory)?;
        data.resize(initial_bytes as usize, 0);

        Ok(MemoryInst {
            data,
            max_pages: ty.limits.max,
        })
    }

    /// Current memory size in pages
    pub fn size(&self) -> u32 {
        (self.data.len() as u64 / PAGE_SIZE) as u32
    }

    /// Current memory size in bytes
    pub fn bound(&self) -> u64 {
        self.data.len() as u64
    }

    /// The memory's current type: current size as minimum, declared maximum
    pub fn ty(&self) -> MemoryType {
        MemoryType {
            limits: crate::syntax::Limits {
                min: self.size(),
                max: self.max_pages,
            },
        }
    }

    /// Grow memory by `delta` pages, returning the previous size in pages
    ///
    /// Growth never corrupts existing contents; on failure the memory is
    /// unchanged and the caller decides how to surface the error
    /// (`memory.grow` maps any failure to -1 rather than trapping).
    pub fn grow(&mut self, delta: u32) -> Result<u32, MemoryError> {
        let current = self.size();
        let new_pages = current.checked_add(delta).ok_or(MemoryError::SizeOverflow)?;

        let effective_max = self.max_pages.unwrap_or(MAX_PAGES);
        if new_pages > effective_max || new_pages > MAX_PAGES {
            return Err(MemoryError::SizeLimit);
        }

        let new_bytes = new_pages as u64 * PAGE_SIZE;
        self.data
            .try_reserve_exact((new_bytes - self.bound()) as usize)
            .map_err(|_| MemoryError::OutOfMemory)?;
        self.data.resize(new_bytes as usize, 0);
        Ok(current)
    }

    /// Check that `[addr, addr + width)` lies within bounds
    #[inline]
    fn check(&self, addr: u64, width: u64) -> Result<usize, MemoryError> {
        let end = addr.checked_add(width).ok_or(MemoryError::Bounds)?;
        if end > self.bound() {
            return Err(MemoryError::Bounds);
        }
        Ok(addr as usize)
    }

    fn read_array<const N: usize>(&self, addr: u64) -> Result<[u8; N], MemoryError> {
        let start = self.check(addr, N as u64)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.data[start..start + N]);
        Ok(buf)
    }

    /// Load a full-width value of type `ty` (little-endian)
    pub fn load_value(&self, addr: u64, ty: ValueType) -> Result<Value, MemoryError> {
        Ok(match ty {
            ValueType::I32 => Value::I32(i32::from_le_bytes(self.read_array(addr)?)),
            ValueType::I64 => Value::I64(i64::from_le_bytes(self.read_array(addr)?)),
            ValueType::F32 => Value::F32(f32::from_le_bytes(self.read_array(addr)?)),
            ValueType::F64 => Value::F64(f64::from_le_bytes(self.read_array(addr)?)),
        })
    }

    /// Store a full-width value (little-endian)
    pub fn store_value(&mut self, addr: u64, value: Value) -> Result<(), MemoryError> {
        match value {
            Value::I32(v) => self.store_bytes(addr, &v.to_le_bytes()),
            Value::I64(v) => self.store_bytes(addr, &v.to_le_bytes()),
            Value::F32(v) => self.store_bytes(addr, &v.to_le_bytes()),
            Value::F64(v) => self.store_bytes(addr, &v.to_le_bytes()),
        }
    }

    /// Load a packed integer of width `sz`, extended to `ty`
    ///
    /// Only integer result types are valid; `S32` packing is only meaningful
    /// for i64 results.
    pub fn load_packed(
        &self,
        addr: u64,
        sz: PackSize,
        sign: Signedness,
        ty: ValueType,
    ) -> Result<Value, MemoryError> {
        // Widen through u64/i64 and narrow at the end
        let raw: u64 = match sz {
            PackSize::S8 => self.read_array::<1>(addr)?[0] as u64,
            PackSize::S16 => u16::from_le_bytes(self.read_array(addr)?) as u64,
            PackSize::S32 => u32::from_le_bytes(self.read_array(addr)?) as u64,
        };
        let extended: i64 = match sign {
            Signedness::Unsigned => raw as i64,
            Signedness::Signed => match sz {
                PackSize::S8 => raw as u8 as i8 as i64,
                PackSize::S16 => raw as u16 as i16 as i64,
                PackSize::S32 => raw as u32 as i32 as i64,
            },
        };
        match (ty, sz) {
            (ValueType::I32, PackSize::S8 | PackSize::S16) => Ok(Value::I32(extended as i32)),
            (ValueType::I64, _) => Ok(Value::I64(extended)),
            _ => Err(MemoryError::Type),
        }
    }

    /// Store the low `sz` bytes of an integer value
    pub fn store_packed(&mut self, addr: u64, sz: PackSize, value: Value) -> Result<(), MemoryError> {
        let raw: u64 = match value {
            Value::I32(v) => v as u32 as u64,
            Value::I64(v) => v as u64,
            Value::F32(_) | Value::F64(_) => return Err(MemoryError::Type),
        };
        match sz {
            PackSize::S8 => self.store_bytes(addr, &[raw as u8]),
            PackSize::S16 => self.store_bytes(addr, &(raw as u16).to_le_bytes()),
            PackSize::S32 => self.store_bytes(addr, &(raw as u32).to_le_bytes()),
        }
    }

    /// Write a slice of bytes to memory
    pub fn store_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        let addr = self.check(addr, bytes.len() as u64)?;
        self.data[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
