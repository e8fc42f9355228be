//! Abstract syntax for decoded WebAssembly modules
//!
//! The types here are what an external binary or text decoder produces and
//! what the runtime consumes. Decoding and validation themselves live outside
//! this crate.

pub mod instruction;
pub mod module;
pub mod region;

pub use instruction::{BlockType, Instr, InstrKind, LoadOp, MemArg, PackSize, Signedness, StoreOp};
pub use module::{
    DataSegment, ElemSegment, Export, ExportDesc, Expr, FuncType, Function, GlobalDef, GlobalType, Import, ImportDesc,
    Limits, MemoryType, Module, TableType, ValueType,
};
pub use region::Region;
