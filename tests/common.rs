//! Shared helpers for integration tests
#![allow(dead_code)]

use wasmite::runtime::Value;
use wasmite::syntax::instruction::{BinOp, IBinOp, IRelOp, RelOp};
use wasmite::syntax::{
    Export, ExportDesc, FuncType, Function, Instr, InstrKind, Module, ValueType,
};

/// An instruction with a default region
pub fn i(kind: InstrKind) -> Instr {
    Instr::new(kind)
}

/// A constant instruction pushing `value`
pub fn konst(value: Value) -> Instr {
    i(match value {
        Value::I32(value) => InstrKind::I32Const { value },
        Value::I64(value) => InstrKind::I64Const { value },
        Value::F32(value) => InstrKind::F32Const { value },
        Value::F64(value) => InstrKind::F64Const { value },
    })
}

pub fn i32_add() -> InstrKind {
    InstrKind::Binary {
        ty: ValueType::I32,
        op: BinOp::I(IBinOp::Add),
    }
}

pub fn i32_ne() -> InstrKind {
    InstrKind::Compare {
        ty: ValueType::I32,
        op: RelOp::I(IRelOp::Ne),
    }
}

/// A module with a single exported function
pub fn func_module(
    export: &str,
    params: Vec<ValueType>,
    results: Vec<ValueType>,
    locals: Vec<ValueType>,
    body: Vec<Instr>,
) -> Module {
    Module {
        types: vec![FuncType::new(params, results)],
        funcs: vec![Function {
            type_idx: 0,
            locals,
            body,
        }],
        exports: vec![Export {
            name: export.to_string(),
            desc: ExportDesc::Func(0),
        }],
        ..Module::default()
    }
}

/// (func (export "add") (param i32 i32) (result i32) local.get 0 local.get 1 i32.add)
pub fn add_module() -> Module {
    func_module(
        "add",
        vec![ValueType::I32, ValueType::I32],
        vec![ValueType::I32],
        vec![],
        vec![
            i(InstrKind::LocalGet { local: 0 }),
            i(InstrKind::LocalGet { local: 1 }),
            i(i32_add()),
        ],
    )
}
