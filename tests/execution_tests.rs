//! End-to-end execution scenarios driven through the public API

mod common;

use common::*;

use wasmite::runtime::{EvalError, FuncInst, HostModule, Store, Value};
use wasmite::syntax::{
    BlockType, Export, ExportDesc, ElemSegment, FuncType, Function, Import, ImportDesc, InstrKind, Limits, LoadOp,
    MemArg, MemoryType, Module, StoreOp, TableType, ValueType,
};

use std::collections::HashMap;

fn instantiate(module: &Module) -> (Store, wasmite::runtime::ModuleRef) {
    let mut store = Store::new();
    let module_ref = store
        .instantiate(module, &HashMap::new())
        .expect("instantiation should succeed");
    (store, module_ref)
}

fn expect_trap(result: Result<Vec<Value>, EvalError>, needle: &str) {
    match result {
        Err(EvalError::Trap { message, .. }) => {
            assert!(message.contains(needle), "expected trap '{needle}', got '{message}'")
        }
        other => panic!("expected trap '{needle}', got {other:?}"),
    }
}

#[test]
fn test_arithmetic() {
    let (store, module_ref) = instantiate(&add_module());
    let results = store
        .invoke_export(module_ref, "add", vec![Value::I32(2), Value::I32(3)])
        .unwrap();
    assert_eq!(results, vec![Value::I32(5)]);

    let results = store
        .invoke_export(module_ref, "add", vec![Value::I32(i32::MAX), Value::I32(1)])
        .unwrap();
    assert_eq!(results, vec![Value::I32(i32::MIN)]);
}

#[test]
fn test_unreachable_trap() {
    let module = func_module("t", vec![], vec![], vec![], vec![i(InstrKind::Unreachable)]);
    let (store, module_ref) = instantiate(&module);
    expect_trap(store.invoke_export(module_ref, "t", vec![]), "unreachable executed");
}

#[test]
fn test_loop_sum() {
    // sum = 1 + 2 + ... + n, looping with br_if 0
    let loop_body = vec![
        i(InstrKind::LocalGet { local: 1 }),
        i(InstrKind::LocalGet { local: 0 }),
        i(i32_add()),
        i(InstrKind::LocalSet { local: 1 }),
        i(InstrKind::LocalGet { local: 0 }),
        konst(Value::I32(-1)),
        i(i32_add()),
        i(InstrKind::LocalTee { local: 0 }),
        konst(Value::I32(0)),
        i(i32_ne()),
        i(InstrKind::BrIf { depth: 0 }),
    ];
    let module = func_module(
        "sum",
        vec![ValueType::I32],
        vec![ValueType::I32],
        vec![ValueType::I32],
        vec![
            i(InstrKind::Loop {
                result: BlockType::Empty,
                body: loop_body,
            }),
            i(InstrKind::LocalGet { local: 1 }),
        ],
    );
    let (store, module_ref) = instantiate(&module);
    let results = store.invoke_export(module_ref, "sum", vec![Value::I32(10)]).unwrap();
    assert_eq!(results, vec![Value::I32(55)]);
}

fn memory_module() -> Module {
    Module {
        types: vec![
            FuncType::new(vec![], vec![ValueType::I32]),
            FuncType::new(vec![ValueType::I32], vec![ValueType::I32]),
        ],
        funcs: vec![
            Function {
                type_idx: 0,
                locals: vec![],
                body: vec![i(InstrKind::MemorySize)],
            },
            Function {
                type_idx: 1,
                locals: vec![],
                body: vec![i(InstrKind::LocalGet { local: 0 }), i(InstrKind::MemoryGrow)],
            },
        ],
        memories: vec![MemoryType {
            limits: Limits { min: 1, max: Some(4) },
        }],
        exports: vec![
            Export {
                name: "size".to_string(),
                desc: ExportDesc::Func(0),
            },
            Export {
                name: "grow".to_string(),
                desc: ExportDesc::Func(1),
            },
        ],
        ..Module::default()
    }
}

#[test]
fn test_memory_grow_protocol() {
    let (store, module_ref) = instantiate(&memory_module());

    let size = |store: &Store| store.invoke_export(module_ref, "size", vec![]).unwrap();
    assert_eq!(size(&store), vec![Value::I32(1)]);

    // Successful growth returns the prior page count
    let grown = store.invoke_export(module_ref, "grow", vec![Value::I32(2)]).unwrap();
    assert_eq!(grown, vec![Value::I32(1)]);
    assert_eq!(size(&store), vec![Value::I32(3)]);

    // Failure returns -1 and leaves the size unchanged
    let failed = store.invoke_export(module_ref, "grow", vec![Value::I32(100)]).unwrap();
    assert_eq!(failed, vec![Value::I32(-1)]);
    assert_eq!(size(&store), vec![Value::I32(3)]);
}

#[test]
fn test_memory_load_store() {
    let memarg = MemArg { align: 2, offset: 0 };
    let module = Module {
        types: vec![
            FuncType::new(vec![ValueType::I32, ValueType::I32], vec![]),
            FuncType::new(vec![ValueType::I32], vec![ValueType::I32]),
        ],
        funcs: vec![
            Function {
                type_idx: 0,
                locals: vec![],
                body: vec![
                    i(InstrKind::LocalGet { local: 0 }),
                    i(InstrKind::LocalGet { local: 1 }),
                    i(InstrKind::Store(StoreOp {
                        ty: ValueType::I32,
                        packed: None,
                        memarg,
                    })),
                ],
            },
            Function {
                type_idx: 1,
                locals: vec![],
                body: vec![
                    i(InstrKind::LocalGet { local: 0 }),
                    i(InstrKind::Load(LoadOp {
                        ty: ValueType::I32,
                        packed: None,
                        memarg,
                    })),
                ],
            },
        ],
        memories: vec![MemoryType {
            limits: Limits { min: 1, max: None },
        }],
        exports: vec![
            Export {
                name: "poke".to_string(),
                desc: ExportDesc::Func(0),
            },
            Export {
                name: "peek".to_string(),
                desc: ExportDesc::Func(1),
            },
        ],
        ..Module::default()
    };
    let (store, module_ref) = instantiate(&module);

    store
        .invoke_export(module_ref, "poke", vec![Value::I32(64), Value::I32(-7)])
        .unwrap();
    let loaded = store.invoke_export(module_ref, "peek", vec![Value::I32(64)]).unwrap();
    assert_eq!(loaded, vec![Value::I32(-7)]);

    // Out-of-bounds access traps
    expect_trap(
        store.invoke_export(module_ref, "peek", vec![Value::I32(65536 - 2)]),
        "out of bounds memory access",
    );
    expect_trap(
        store.invoke_export(module_ref, "peek", vec![Value::I32(-1)]),
        "out of bounds memory access",
    );
}

fn indirect_module() -> Module {
    Module {
        types: vec![
            FuncType::new(vec![], vec![ValueType::I32]),
            FuncType::new(vec![], vec![ValueType::I64]),
        ],
        funcs: vec![
            Function {
                type_idx: 0,
                locals: vec![],
                body: vec![konst(Value::I32(7))],
            },
            Function {
                type_idx: 0,
                locals: vec![],
                body: vec![konst(Value::I32(0)), i(InstrKind::CallIndirect { type_idx: 0 })],
            },
            Function {
                type_idx: 1,
                locals: vec![],
                body: vec![konst(Value::I32(0)), i(InstrKind::CallIndirect { type_idx: 1 })],
            },
            Function {
                type_idx: 0,
                locals: vec![],
                body: vec![konst(Value::I32(1)), i(InstrKind::CallIndirect { type_idx: 0 })],
            },
        ],
        tables: vec![TableType {
            limits: Limits { min: 2, max: None },
        }],
        elements: vec![ElemSegment {
            table: 0,
            offset: vec![konst(Value::I32(0))],
            init: vec![0],
        }],
        exports: vec![
            Export {
                name: "call_ok".to_string(),
                desc: ExportDesc::Func(1),
            },
            Export {
                name: "call_wrong_type".to_string(),
                desc: ExportDesc::Func(2),
            },
            Export {
                name: "call_empty".to_string(),
                desc: ExportDesc::Func(3),
            },
        ],
        ..Module::default()
    }
}

#[test]
fn test_call_indirect() {
    let (store, module_ref) = instantiate(&indirect_module());

    let ok = store.invoke_export(module_ref, "call_ok", vec![]).unwrap();
    assert_eq!(ok, vec![Value::I32(7)]);

    expect_trap(
        store.invoke_export(module_ref, "call_wrong_type", vec![]),
        "indirect call type mismatch",
    );
    expect_trap(
        store.invoke_export(module_ref, "call_empty", vec![]),
        "uninitialized element 1",
    );
}

#[test]
fn test_call_stack_exhaustion() {
    // A function that calls itself unconditionally
    let module = func_module("boom", vec![], vec![], vec![], vec![i(InstrKind::Call { func: 0 })]);
    let (store, module_ref) = instantiate(&module);

    match store.invoke_export(module_ref, "boom", vec![]) {
        Err(EvalError::Exhaustion { message, .. }) => assert_eq!(message, "call stack exhausted"),
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[test]
fn test_bounded_recursion_succeeds() {
    // f(n) = n == 0 ? 0 : f(n - 1); depth 250 stays within the budget
    let module = func_module(
        "rec",
        vec![ValueType::I32],
        vec![ValueType::I32],
        vec![],
        vec![
            i(InstrKind::LocalGet { local: 0 }),
            i(InstrKind::If {
                result: BlockType::Value(ValueType::I32),
                then_body: vec![
                    i(InstrKind::LocalGet { local: 0 }),
                    konst(Value::I32(-1)),
                    i(i32_add()),
                    i(InstrKind::Call { func: 0 }),
                ],
                else_body: vec![konst(Value::I32(0))],
            }),
        ],
    );
    let (store, module_ref) = instantiate(&module);

    let results = store.invoke_export(module_ref, "rec", vec![Value::I32(250)]).unwrap();
    assert_eq!(results, vec![Value::I32(0)]);

    // Deeper than the budget allows
    match store.invoke_export(module_ref, "rec", vec![Value::I32(1000)]) {
        Err(EvalError::Exhaustion { message, .. }) => assert_eq!(message, "call stack exhausted"),
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

fn global_module() -> Module {
    use wasmite::syntax::{GlobalDef, GlobalType};
    Module {
        types: vec![
            FuncType::new(vec![ValueType::I32], vec![]),
            FuncType::new(vec![], vec![ValueType::I32]),
        ],
        funcs: vec![
            Function {
                type_idx: 0,
                locals: vec![],
                body: vec![i(InstrKind::LocalGet { local: 0 }), i(InstrKind::GlobalSet { global: 0 })],
            },
            Function {
                type_idx: 1,
                locals: vec![],
                body: vec![i(InstrKind::GlobalGet { global: 0 })],
            },
        ],
        globals: vec![GlobalDef {
            ty: GlobalType {
                value_type: ValueType::I32,
                mutable: true,
            },
            init: vec![konst(Value::I32(11))],
        }],
        exports: vec![
            Export {
                name: "set".to_string(),
                desc: ExportDesc::Func(0),
            },
            Export {
                name: "get".to_string(),
                desc: ExportDesc::Func(1),
            },
            Export {
                name: "g".to_string(),
                desc: ExportDesc::Global(0),
            },
        ],
        ..Module::default()
    }
}

#[test]
fn test_global_roundtrip() {
    let (store, module_ref) = instantiate(&global_module());

    // Initialiser ran
    assert_eq!(store.get_global_export(module_ref, "g").unwrap(), Value::I32(11));

    store.invoke_export(module_ref, "set", vec![Value::I32(99)]).unwrap();
    assert_eq!(store.invoke_export(module_ref, "get", vec![]).unwrap(), vec![Value::I32(99)]);
    assert_eq!(store.get_global_export(module_ref, "g").unwrap(), Value::I32(99));
}

#[test]
fn test_host_functions() {
    let mut store = Store::new();
    let host = HostModule::new()
        .func(
            "double",
            FuncInst::host(
                FuncType::new(vec![ValueType::I32], vec![ValueType::I32]),
                |args| match args.as_slice() {
                    [Value::I32(v)] => vec![Value::I32(v * 2)],
                    _ => unreachable!("arguments are type checked"),
                },
            ),
        )
        .func(
            "fail",
            FuncInst::host_fallible(FuncType::new(vec![], vec![]), |_| Err("host says no".to_string())),
        );
    let host_ref = store.allocate_host_module(host);
    let names = HashMap::from([("env".to_string(), host_ref)]);

    let module = Module {
        types: vec![
            FuncType::new(vec![ValueType::I32], vec![ValueType::I32]),
            FuncType::new(vec![], vec![]),
        ],
        imports: vec![
            Import {
                module: "env".to_string(),
                name: "double".to_string(),
                desc: ImportDesc::Func(0),
            },
            Import {
                module: "env".to_string(),
                name: "fail".to_string(),
                desc: ImportDesc::Func(1),
            },
        ],
        funcs: vec![
            // call the imported double, then add one
            Function {
                type_idx: 0,
                locals: vec![],
                body: vec![
                    i(InstrKind::LocalGet { local: 0 }),
                    i(InstrKind::Call { func: 0 }),
                    konst(Value::I32(1)),
                    i(i32_add()),
                ],
            },
            Function {
                type_idx: 1,
                locals: vec![],
                body: vec![i(InstrKind::Call { func: 1 })],
            },
        ],
        exports: vec![
            Export {
                name: "double_plus_one".to_string(),
                desc: ExportDesc::Func(2),
            },
            Export {
                name: "call_fail".to_string(),
                desc: ExportDesc::Func(3),
            },
        ],
        ..Module::default()
    };
    let module_ref = store.instantiate(&module, &names).unwrap();

    let results = store
        .invoke_export(module_ref, "double_plus_one", vec![Value::I32(20)])
        .unwrap();
    assert_eq!(results, vec![Value::I32(41)]);

    expect_trap(store.invoke_export(module_ref, "call_fail", vec![]), "host says no");
}

#[test]
fn test_invoking_non_function_export_is_crash() {
    let (store, module_ref) = instantiate(&global_module());
    let err = store.invoke_export(module_ref, "g", vec![]).unwrap_err();
    assert!(matches!(err, EvalError::Crash { .. }));
}
