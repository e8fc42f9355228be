//! A WebAssembly interpreter core written in Rust.
//!
//! wasmite executes already-decoded WebAssembly modules: it links them
//! against host-provided imports and previously instantiated modules,
//! allocates their runtime entities, runs element and data segment
//! initialisers and the start function, and then dispatches exported
//! functions and globals by name. Execution is a small-step interpreter over
//! the module's abstract syntax with an explicit value stack and a bounded
//! call budget.
//!
//! Binary/text decoding and validation are deliberately out of scope: an
//! external decoder produces the [`syntax`] AST this crate consumes, and the
//! interpreter assumes validated input.
//!
//! # Modules
//!
//! - [`syntax`] -- The decoded-module AST: the contract with the decoder.
//! - [`runtime`] -- The store, module instances, and the interpreter.
//!
//! # Example
//!
//! Build a module exporting an add function, instantiate it, and call it:
//!
//! ```
//! use wasmite::syntax::instruction::{BinOp, IBinOp};
//! use wasmite::syntax::{
//!     Export, ExportDesc, FuncType, Function, Instr, InstrKind, Module, ValueType,
//! };
//! use wasmite::runtime::{Store, Value};
//! use std::collections::HashMap;
//!
//! let module = Module {
//!     types: vec![FuncType::new(
//!         vec![ValueType::I32, ValueType::I32],
//!         vec![ValueType::I32],
//!     )],
//!     funcs: vec![Function {
//!         type_idx: 0,
//!         locals: vec![],
//!         body: vec![
//!             Instr::new(InstrKind::LocalGet { local: 0 }),
//!             Instr::new(InstrKind::LocalGet { local: 1 }),
//!             Instr::new(InstrKind::Binary {
//!                 ty: ValueType::I32,
//!                 op: BinOp::I(IBinOp::Add),
//!             }),
//!         ],
//!     }],
//!     exports: vec![Export {
//!         name: "add".to_string(),
//!         desc: ExportDesc::Func(0),
//!     }],
//!     ..Module::default()
//! };
//!
//! let mut store = Store::new();
//! let module_ref = store.instantiate(&module, &HashMap::new()).unwrap();
//! let results = store
//!     .invoke_export(module_ref, "add", vec![Value::I32(2), Value::I32(3)])
//!     .unwrap();
//! assert_eq!(results, vec![Value::I32(5)]);
//! ```

pub mod runtime;
pub mod syntax;
