//! Small-step instruction interpreter
//!
//! Execution is a small-step operational semantics over an administrative
//! instruction stream: plain instructions, call requests, poisoned traps,
//! pending returns and branches, and the label/frame contexts that scope
//! them. Each step rewrites the head of the stream; labels and frames own
//! their inner streams exclusively, so the whole state is a tree with no
//! aliasing.
//!
//! The interpreter reads and writes the mutable cells held by module
//! instances but never changes the shape of the store itself.

use crate::syntax::{BlockType, FuncType, Instr, InstrKind, Region};

use super::func::FuncInst;
use super::instance::ModuleInst;
use super::ops;
use super::stack::Stack;
use super::store::{ModuleRef, Store};
use super::{DEFAULT_BUDGET, EvalError, Value};

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

/// An activation record: the owning module and this call's locals
///
/// Locals are interior-mutable cells shared between the frame stored in the
/// `Framed` context and the configuration stepping inside it, so cloning a
/// frame aliases its locals rather than copying them.
#[derive(Debug, Clone)]
pub struct Frame {
    pub module: ModuleRef,
    locals: Rc<Vec<Cell<Value>>>,
}

impl Frame {
    pub fn new(module: ModuleRef, locals: Vec<Value>) -> Frame {
        Frame {
            module,
            locals: Rc::new(locals.into_iter().map(Cell::new).collect()),
        }
    }

    fn local(&self, index: u32) -> Option<&Cell<Value>> {
        self.locals.get(index as usize)
    }
}

/// The stepper's working alphabet
#[derive(Debug)]
enum AdminInstr {
    /// A syntactic instruction
    Plain(Instr),
    /// A call request
    Invoke(FuncInst),
    /// A poisoned instruction; aborts enclosing labels and frames as it
    /// propagates outward
    Trapping { region: Region, message: String },
    /// A pending function return carrying the returning code's value stack
    Returning(Vec<Value>),
    /// A pending branch; the depth is decremented at each label boundary
    Breaking(u32, Vec<Value>),
    /// A block/loop/if context: result arity, continuation instructions
    /// prepended when a branch targets this label, and the inner stream
    Label {
        arity: usize,
        cont: Vec<Instr>,
        inner: Code,
    },
    /// A function activation: result arity, its frame, and the inner stream
    Framed {
        arity: usize,
        frame: Frame,
        inner: Code,
    },
}

/// An evaluation state: a value stack and an instruction stream
#[derive(Debug, Default)]
struct Code {
    values: Stack,
    instrs: VecDeque<AdminInstr>,
}

impl Code {
    fn from_instrs(instrs: &[Instr]) -> Code {
        Code {
            values: Stack::new(),
            instrs: instrs.iter().cloned().map(AdminInstr::Plain).collect(),
        }
    }
}

/// One execution context: the store, the current frame, and the remaining
/// call budget
struct Config<'a> {
    store: &'a Store,
    frame: Frame,
    budget: u32,
}

impl Config<'_> {
    fn instance(&self, region: Region) -> Result<&Rc<ModuleInst>, EvalError> {
        self.store.instance(self.frame.module).ok_or_else(|| {
            EvalError::crash(region, format!("unknown module reference {}", self.frame.module))
        })
    }
}

/// Invoke a function and drive the stepper until its instruction stream is
/// empty. Returns the remaining value stack, bottom first.
pub(super) fn invoke_function(
    store: &Store,
    module: ModuleRef,
    func: FuncInst,
    args: Vec<Value>,
) -> Result<Vec<Value>, EvalError> {
    let mut config = Config {
        store,
        frame: Frame::new(module, Vec::new()),
        budget: DEFAULT_BUDGET,
    };
    let mut code = Code {
        values: Stack::from_values(args),
        instrs: VecDeque::from([AdminInstr::Invoke(func)]),
    };
    while !code.instrs.is_empty() {
        step(&mut config, &mut code)?;
    }
    Ok(code.values.drain())
}

/// Evaluate a constant expression to exactly one value
pub(super) fn eval_const_expr(store: &Store, module: ModuleRef, expr: &[Instr]) -> Result<Value, EvalError> {
    let mut config = Config {
        store,
        frame: Frame::new(module, Vec::new()),
        budget: DEFAULT_BUDGET,
    };
    let mut code = Code::from_instrs(expr);
    while !code.instrs.is_empty() {
        step(&mut config, &mut code)?;
    }
    match code.values.drain().as_slice() {
        [value] => Ok(*value),
        _ => Err(EvalError::crash(
            Region::default(),
            "constant expression must produce exactly one value",
        )),
    }
}

/// Advance one administrative instruction
fn step(config: &mut Config, code: &mut Code) -> Result<(), EvalError> {
    let Some(head) = code.instrs.pop_front() else {
        return Ok(());
    };
    match head {
        AdminInstr::Plain(instr) => exec_instr(config, code, instr),
        AdminInstr::Invoke(func) => invoke(config, code, func),
        AdminInstr::Trapping { region, message } => Err(EvalError::trap(region, message)),
        AdminInstr::Returning(_) => Err(EvalError::crash(Region::default(), "undefined frame")),
        AdminInstr::Breaking(_, _) => Err(EvalError::crash(Region::default(), "undefined label")),
        AdminInstr::Label { arity, cont, inner } => step_label(config, code, arity, cont, inner),
        AdminInstr::Framed { arity, frame, inner } => step_framed(config, code, arity, frame, inner),
    }
}

/// Step a label context: unwind finished blocks, route traps/returns
/// outward, take branches targeting this label, or step inside
fn step_label(
    config: &mut Config,
    outer: &mut Code,
    arity: usize,
    cont: Vec<Instr>,
    mut inner: Code,
) -> Result<(), EvalError> {
    let Some(head) = inner.instrs.pop_front() else {
        // Block finished: its values flow out and the label is dropped
        outer.values.push_all(inner.values.drain());
        return Ok(());
    };
    match head {
        surfaced @ (AdminInstr::Trapping { .. } | AdminInstr::Returning(_)) => {
            outer.instrs.push_front(surfaced);
        }
        AdminInstr::Breaking(0, values) => {
            let skip = values
                .len()
                .checked_sub(arity)
                .ok_or_else(|| EvalError::crash(Region::default(), "stack underflow"))?;
            outer.values.push_all(values.into_iter().skip(skip));
            // For loops the continuation re-enters the label
            for instr in cont.into_iter().rev() {
                outer.instrs.push_front(AdminInstr::Plain(instr));
            }
        }
        AdminInstr::Breaking(depth, values) => {
            outer.instrs.push_front(AdminInstr::Breaking(depth - 1, values));
        }
        other => {
            inner.instrs.push_front(other);
            step(config, &mut inner)?;
            outer.instrs.push_front(AdminInstr::Label { arity, cont, inner });
        }
    }
    Ok(())
}

/// Step a frame context: deliver results, route traps outward, and step
/// inside with the callee's frame and a decremented budget
fn step_framed(
    config: &mut Config,
    outer: &mut Code,
    arity: usize,
    frame: Frame,
    mut inner: Code,
) -> Result<(), EvalError> {
    let Some(head) = inner.instrs.pop_front() else {
        // Function body finished without an explicit return
        outer.values.push_all(inner.values.drain());
        return Ok(());
    };
    match head {
        surfaced @ AdminInstr::Trapping { .. } => {
            outer.instrs.push_front(surfaced);
        }
        AdminInstr::Returning(values) => {
            let skip = values
                .len()
                .checked_sub(arity)
                .ok_or_else(|| EvalError::crash(Region::default(), "stack underflow"))?;
            outer.values.push_all(values.into_iter().skip(skip));
        }
        // Branches never cross a frame boundary; labels inside the frame
        // must have absorbed them
        AdminInstr::Breaking(_, _) => {
            return Err(EvalError::crash(Region::default(), "undefined label"));
        }
        other => {
            inner.instrs.push_front(other);
            let mut callee = Config {
                store: config.store,
                frame: frame.clone(),
                budget: config.budget.saturating_sub(1),
            };
            step(&mut callee, &mut inner)?;
            outer.instrs.push_front(AdminInstr::Framed { arity, frame, inner });
        }
    }
    Ok(())
}

/// Handle a call request: marshal arguments, then either push a frame for a
/// module function or run a host function to completion
fn invoke(config: &mut Config, code: &mut Code, func: FuncInst) -> Result<(), EvalError> {
    let region = Region::default();
    let ty = func.ty().clone();

    let args = code
        .values
        .split_top(ty.params.len())
        .ok_or_else(|| EvalError::crash(region, "stack underflow"))?;
    for (arg, expected) in args.iter().zip(&ty.params) {
        if arg.typ() != *expected {
            return Err(EvalError::crash(region, "argument type mismatch"));
        }
    }

    match func {
        FuncInst::Ast { module, code: body, .. } => {
            // Budget bounds nested frame entries; host calls push no frame
            if config.budget == 0 {
                return Err(EvalError::exhaustion(region, "call stack exhausted"));
            }
            // The callee resolves in its own module, which must be registered
            config.instance_of(module, region)?;
            tracing::trace!(%module, budget = config.budget, "enter frame");

            let mut locals = args;
            locals.extend(body.locals.iter().map(|ty| Value::zero(*ty)));
            let frame = Frame::new(module, locals);

            let block = Instr::new(InstrKind::Block {
                result: block_type(&ty, region)?,
                body: body.body.clone(),
            });
            let inner = Code {
                values: Stack::new(),
                instrs: VecDeque::from([AdminInstr::Plain(block)]),
            };
            code.instrs.push_front(AdminInstr::Framed {
                arity: ty.results.len(),
                frame,
                inner,
            });
        }
        FuncInst::Host { func, .. } => {
            let results = func(args);
            check_host_results(&ty, &results, region)?;
            code.values.push_all(results);
        }
        FuncInst::HostFallible { func, .. } => match func(args) {
            Ok(results) => {
                check_host_results(&ty, &results, region)?;
                code.values.push_all(results);
            }
            Err(message) => code.instrs.push_front(AdminInstr::Trapping { region, message }),
        },
    }
    Ok(())
}

impl Config<'_> {
    fn instance_of(&self, module: ModuleRef, region: Region) -> Result<&Rc<ModuleInst>, EvalError> {
        self.store
            .instance(module)
            .ok_or_else(|| EvalError::crash(region, format!("unknown module reference {module}")))
    }
}

fn block_type(ty: &FuncType, region: Region) -> Result<BlockType, EvalError> {
    match ty.results.as_slice() {
        [] => Ok(BlockType::Empty),
        [result] => Ok(BlockType::Value(*result)),
        _ => Err(EvalError::crash(region, "multiple function results are not supported")),
    }
}

fn check_host_results(ty: &FuncType, results: &[Value], region: Region) -> Result<(), EvalError> {
    if results.len() != ty.results.len() {
        return Err(EvalError::crash(region, "host function result arity mismatch"));
    }
    for (result, expected) in results.iter().zip(&ty.results) {
        if result.typ() != *expected {
            return Err(EvalError::crash(region, "host function result type mismatch"));
        }
    }
    Ok(())
}

fn stack_crash(region: Region) -> EvalError {
    EvalError::crash(region, "missing or ill-typed operand on stack")
}

fn trap(code: &mut Code, region: Region, message: impl Into<String>) {
    code.instrs.push_front(AdminInstr::Trapping {
        region,
        message: message.into(),
    });
}

/// Execute one plain instruction against the current code
fn exec_instr(config: &mut Config, code: &mut Code, instr: Instr) -> Result<(), EvalError> {
    let region = instr.region;
    match instr.kind {
        InstrKind::Unreachable => trap(code, region, "unreachable executed"),
        InstrKind::Nop => {}

        InstrKind::Drop => {
            code.values.pop().ok_or_else(|| stack_crash(region))?;
        }
        InstrKind::Select => {
            let cond = code.values.pop_i32().ok_or_else(|| stack_crash(region))?;
            let on_zero = code.values.pop().ok_or_else(|| stack_crash(region))?;
            let on_nonzero = code.values.pop().ok_or_else(|| stack_crash(region))?;
            code.values.push(if cond != 0 { on_nonzero } else { on_zero });
        }

        InstrKind::Block { result, body } => {
            code.instrs.push_front(AdminInstr::Label {
                arity: result.arity(),
                cont: Vec::new(),
                inner: Code::from_instrs(&body),
            });
        }
        InstrKind::Loop { result, body } => {
            // Branching to a loop's label re-runs it: the continuation is
            // the loop instruction itself
            let inner = Code::from_instrs(&body);
            let again = Instr::at(InstrKind::Loop { result, body }, region);
            code.instrs.push_front(AdminInstr::Label {
                arity: 0,
                cont: vec![again],
                inner,
            });
        }
        InstrKind::If {
            result,
            then_body,
            else_body,
        } => {
            let cond = code.values.pop_i32().ok_or_else(|| stack_crash(region))?;
            let chosen = if cond != 0 { then_body } else { else_body };
            code.instrs.push_front(AdminInstr::Label {
                arity: result.arity(),
                cont: Vec::new(),
                inner: Code::from_instrs(&chosen),
            });
        }

        InstrKind::Br { depth } => {
            let values = code.values.drain();
            code.instrs.push_front(AdminInstr::Breaking(depth, values));
        }
        InstrKind::BrIf { depth } => {
            let cond = code.values.pop_i32().ok_or_else(|| stack_crash(region))?;
            if cond != 0 {
                let values = code.values.drain();
                code.instrs.push_front(AdminInstr::Breaking(depth, values));
            }
        }
        InstrKind::BrTable { targets, default } => {
            let index = code.values.pop_i32().ok_or_else(|| stack_crash(region))?;
            let depth = if index < 0 || index as usize >= targets.len() {
                default
            } else {
                targets[index as usize]
            };
            let values = code.values.drain();
            code.instrs.push_front(AdminInstr::Breaking(depth, values));
        }
        InstrKind::Return => {
            let values = code.values.drain();
            code.instrs.push_front(AdminInstr::Returning(values));
        }

        InstrKind::Call { func } => {
            let inst = config.instance(region)?;
            let func = inst
                .funcs
                .get(func as usize)
                .cloned()
                .ok_or_else(|| EvalError::crash(region, format!("unknown function index {func}")))?;
            code.instrs.push_front(AdminInstr::Invoke(func));
        }
        InstrKind::CallIndirect { type_idx } => {
            let index = code.values.pop_i32().ok_or_else(|| stack_crash(region))? as u32;
            let inst = config.instance(region)?;
            let table = inst
                .tables
                .first()
                .cloned()
                .ok_or_else(|| EvalError::crash(region, "undefined table"))?;
            let expected = inst
                .types
                .get(type_idx as usize)
                .cloned()
                .ok_or_else(|| EvalError::crash(region, format!("unknown type index {type_idx}")))?;
            match table.borrow().load(index) {
                None => trap(code, region, format!("uninitialized element {index}")),
                Some(func) if func.ty() != &expected => trap(code, region, "indirect call type mismatch"),
                Some(func) => code.instrs.push_front(AdminInstr::Invoke(func)),
            }
        }

        InstrKind::LocalGet { local } => {
            let cell = config
                .frame
                .local(local)
                .ok_or_else(|| EvalError::crash(region, format!("unknown local {local}")))?;
            code.values.push(cell.get());
        }
        InstrKind::LocalSet { local } => {
            let value = code.values.pop().ok_or_else(|| stack_crash(region))?;
            config
                .frame
                .local(local)
                .ok_or_else(|| EvalError::crash(region, format!("unknown local {local}")))?
                .set(value);
        }
        InstrKind::LocalTee { local } => {
            let value = *code.values.peek().ok_or_else(|| stack_crash(region))?;
            config
                .frame
                .local(local)
                .ok_or_else(|| EvalError::crash(region, format!("unknown local {local}")))?
                .set(value);
        }
        InstrKind::GlobalGet { global } => {
            let inst = config.instance(region)?;
            let global = inst
                .globals
                .get(global as usize)
                .ok_or_else(|| EvalError::crash(region, format!("unknown global {global}")))?;
            code.values.push(global.load());
        }
        InstrKind::GlobalSet { global } => {
            let value = code.values.pop().ok_or_else(|| stack_crash(region))?;
            let inst = config.instance(region)?;
            inst.globals
                .get(global as usize)
                .ok_or_else(|| EvalError::crash(region, format!("unknown global {global}")))?
                .store(value)
                .map_err(|err| EvalError::crash(region, err.to_string()))?;
        }

        InstrKind::Load(op) => {
            let base = code.values.pop_i32().ok_or_else(|| stack_crash(region))?;
            let addr = base as u32 as u64 + op.memarg.offset as u64;
            let inst = config.instance(region)?;
            let memory = inst
                .memories
                .first()
                .ok_or_else(|| EvalError::crash(region, "undefined memory"))?;
            let loaded = match op.packed {
                None => memory.borrow().load_value(addr, op.ty),
                Some((size, sign)) => memory.borrow().load_packed(addr, size, sign, op.ty),
            };
            match loaded {
                Ok(value) => code.values.push(value),
                Err(err) => trap(code, region, err.to_string()),
            }
        }
        InstrKind::Store(op) => {
            let value = code.values.pop().ok_or_else(|| stack_crash(region))?;
            let base = code.values.pop_i32().ok_or_else(|| stack_crash(region))?;
            let addr = base as u32 as u64 + op.memarg.offset as u64;
            let inst = config.instance(region)?;
            let memory = inst
                .memories
                .first()
                .ok_or_else(|| EvalError::crash(region, "undefined memory"))?;
            let stored = if value.typ() != op.ty {
                Err(super::memory::MemoryError::Type)
            } else {
                match op.packed {
                    None => memory.borrow_mut().store_value(addr, value),
                    Some(size) => memory.borrow_mut().store_packed(addr, size, value),
                }
            };
            if let Err(err) = stored {
                trap(code, region, err.to_string());
            }
        }
        InstrKind::MemorySize => {
            let inst = config.instance(region)?;
            let memory = inst
                .memories
                .first()
                .ok_or_else(|| EvalError::crash(region, "undefined memory"))?;
            let pages = memory.borrow().size();
            code.values.push(Value::I32(pages as i32));
        }
        InstrKind::MemoryGrow => {
            let delta = code.values.pop_i32().ok_or_else(|| stack_crash(region))?;
            let inst = config.instance(region)?;
            let memory = inst
                .memories
                .first()
                .ok_or_else(|| EvalError::crash(region, "undefined memory"))?;
            // Growth failure is a -1 result, never a trap
            let result = memory.borrow_mut().grow(delta as u32);
            code.values.push(Value::I32(result.map_or(-1, |prior| prior as i32)));
        }

        InstrKind::I32Const { value } => code.values.push(Value::I32(value)),
        InstrKind::I64Const { value } => code.values.push(Value::I64(value)),
        InstrKind::F32Const { value } => code.values.push(Value::F32(value)),
        InstrKind::F64Const { value } => code.values.push(Value::F64(value)),

        InstrKind::Test { ty, op } => {
            let value = code.values.pop().ok_or_else(|| stack_crash(region))?;
            push_numeric(code, region, ops::test(ty, op, value));
        }
        InstrKind::Compare { ty, op } => {
            let rhs = code.values.pop().ok_or_else(|| stack_crash(region))?;
            let lhs = code.values.pop().ok_or_else(|| stack_crash(region))?;
            push_numeric(code, region, ops::compare(ty, op, lhs, rhs));
        }
        InstrKind::Unary { ty, op } => {
            let value = code.values.pop().ok_or_else(|| stack_crash(region))?;
            push_numeric(code, region, ops::unary(ty, op, value));
        }
        InstrKind::Binary { ty, op } => {
            let rhs = code.values.pop().ok_or_else(|| stack_crash(region))?;
            let lhs = code.values.pop().ok_or_else(|| stack_crash(region))?;
            push_numeric(code, region, ops::binary(ty, op, lhs, rhs));
        }
        InstrKind::Convert { ty, op } => {
            let value = code.values.pop().ok_or_else(|| stack_crash(region))?;
            push_numeric(code, region, ops::convert(ty, op, value));
        }
    }
    Ok(())
}

fn push_numeric(code: &mut Code, region: Region, result: Result<Value, ops::NumericError>) {
    match result {
        Ok(value) => code.values.push(value),
        Err(err) => trap(code, region, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test::ExecTest;
    use crate::syntax::instruction::{BinOp, IBinOp, IRelOp, RelOp, TestOp};
    use crate::syntax::{BlockType, InstrKind, ValueType};
    use crate::runtime::Value;

    fn i32_add() -> InstrKind {
        InstrKind::Binary {
            ty: ValueType::I32,
            op: BinOp::I(IBinOp::Add),
        }
    }

    #[test]
    fn test_nop_and_const() {
        ExecTest::new()
            .instr(InstrKind::Nop)
            .instr(InstrKind::I32Const { value: 7 })
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(7)]);
    }

    #[test]
    fn test_drop_and_select() {
        ExecTest::new()
            .instr(InstrKind::I32Const { value: 1 })
            .instr(InstrKind::I32Const { value: 2 })
            .instr(InstrKind::Drop)
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(1)]);

        // Non-zero condition keeps the first pushed operand
        ExecTest::new()
            .instr(InstrKind::I32Const { value: 10 })
            .instr(InstrKind::I32Const { value: 20 })
            .instr(InstrKind::I32Const { value: 1 })
            .instr(InstrKind::Select)
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(10)]);

        ExecTest::new()
            .instr(InstrKind::I32Const { value: 10 })
            .instr(InstrKind::I32Const { value: 20 })
            .instr(InstrKind::I32Const { value: 0 })
            .instr(InstrKind::Select)
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(20)]);
    }

    #[test]
    fn test_block_yields_result() {
        ExecTest::new()
            .instr(InstrKind::Block {
                result: BlockType::Value(ValueType::I32),
                body: vec![
                    ExecTest::instr_of(InstrKind::I32Const { value: 3 }),
                    ExecTest::instr_of(InstrKind::I32Const { value: 4 }),
                    ExecTest::instr_of(i32_add()),
                ],
            })
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(7)]);
    }

    #[test]
    fn test_br_skips_rest_of_block() {
        ExecTest::new()
            .instr(InstrKind::Block {
                result: BlockType::Value(ValueType::I32),
                body: vec![
                    ExecTest::instr_of(InstrKind::I32Const { value: 42 }),
                    ExecTest::instr_of(InstrKind::Br { depth: 0 }),
                    ExecTest::instr_of(InstrKind::Unreachable),
                ],
            })
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(42)]);
    }

    #[test]
    fn test_br_depth_crosses_labels() {
        // br 1 from a nested block exits both blocks
        ExecTest::new()
            .instr(InstrKind::Block {
                result: BlockType::Value(ValueType::I32),
                body: vec![
                    ExecTest::instr_of(InstrKind::Block {
                        result: BlockType::Empty,
                        body: vec![
                            ExecTest::instr_of(InstrKind::I32Const { value: 9 }),
                            ExecTest::instr_of(InstrKind::Br { depth: 1 }),
                        ],
                    }),
                    ExecTest::instr_of(InstrKind::Unreachable),
                ],
            })
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(9)]);
    }

    #[test]
    fn test_if_else() {
        let body = |cond: i32| {
            ExecTest::new()
                .instr(InstrKind::I32Const { value: cond })
                .instr(InstrKind::If {
                    result: BlockType::Value(ValueType::I32),
                    then_body: vec![ExecTest::instr_of(InstrKind::I32Const { value: 1 })],
                    else_body: vec![ExecTest::instr_of(InstrKind::I32Const { value: 2 })],
                })
                .returns(ValueType::I32)
        };
        body(5).expect_results(vec![Value::I32(1)]);
        body(0).expect_results(vec![Value::I32(2)]);
    }

    #[test]
    fn test_br_table() {
        let body = |index: i32| {
            // (block (result i32) (block (br_table 0 1)) (i32.const 100) (br 0))
            ExecTest::new()
                .instr(InstrKind::Block {
                    result: BlockType::Value(ValueType::I32),
                    body: vec![
                        ExecTest::instr_of(InstrKind::Block {
                            result: BlockType::Empty,
                            body: vec![
                                ExecTest::instr_of(InstrKind::I32Const { value: index }),
                                ExecTest::instr_of(InstrKind::BrTable {
                                    targets: vec![0],
                                    default: 1,
                                }),
                            ],
                        }),
                        // Fallthrough from depth 0
                        ExecTest::instr_of(InstrKind::I32Const { value: 100 }),
                        ExecTest::instr_of(InstrKind::Br { depth: 0 }),
                    ],
                })
                .returns(ValueType::I32)
        };
        body(0).expect_results(vec![Value::I32(100)]);
        // Out-of-range (including negative) indices take the default, which
        // here exits the outer block without the marker
        body(7).expect_crash("stack underflow");
    }

    #[test]
    fn test_locals() {
        ExecTest::new()
            .param(ValueType::I32)
            .arg(Value::I32(5))
            .local(ValueType::I32)
            .instr(InstrKind::LocalGet { local: 0 })
            .instr(InstrKind::LocalSet { local: 1 })
            .instr(InstrKind::LocalGet { local: 1 })
            .instr(InstrKind::LocalTee { local: 1 })
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(5)]);
    }

    #[test]
    fn test_loop_sum() {
        // sum 1..=n with a loop and br_if
        let loop_body = vec![
            // local 1 += local 0
            ExecTest::instr_of(InstrKind::LocalGet { local: 1 }),
            ExecTest::instr_of(InstrKind::LocalGet { local: 0 }),
            ExecTest::instr_of(i32_add()),
            ExecTest::instr_of(InstrKind::LocalSet { local: 1 }),
            // local 0 -= 1
            ExecTest::instr_of(InstrKind::LocalGet { local: 0 }),
            ExecTest::instr_of(InstrKind::I32Const { value: -1 }),
            ExecTest::instr_of(i32_add()),
            ExecTest::instr_of(InstrKind::LocalTee { local: 0 }),
            // repeat while local 0 != 0
            ExecTest::instr_of(InstrKind::I32Const { value: 0 }),
            ExecTest::instr_of(InstrKind::Compare {
                ty: ValueType::I32,
                op: RelOp::I(IRelOp::Ne),
            }),
            ExecTest::instr_of(InstrKind::BrIf { depth: 0 }),
        ];
        ExecTest::new()
            .param(ValueType::I32)
            .arg(Value::I32(10))
            .local(ValueType::I32)
            .instr(InstrKind::Loop {
                result: BlockType::Empty,
                body: loop_body,
            })
            .instr(InstrKind::LocalGet { local: 1 })
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(55)]);
    }

    #[test]
    fn test_unreachable_traps() {
        ExecTest::new()
            .instr(InstrKind::Unreachable)
            .expect_trap("unreachable executed");
    }

    #[test]
    fn test_trap_aborts_enclosing_labels() {
        ExecTest::new()
            .instr(InstrKind::Block {
                result: BlockType::Empty,
                body: vec![ExecTest::instr_of(InstrKind::Block {
                    result: BlockType::Empty,
                    body: vec![ExecTest::instr_of(InstrKind::Unreachable)],
                })],
            })
            .expect_trap("unreachable executed");
    }

    #[test]
    fn test_early_return() {
        ExecTest::new()
            .instr(InstrKind::I32Const { value: 3 })
            .instr(InstrKind::Return)
            .instr(InstrKind::Unreachable)
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(3)]);
    }

    #[test]
    fn test_div_by_zero_traps() {
        ExecTest::new()
            .instr(InstrKind::I32Const { value: 1 })
            .instr(InstrKind::I32Const { value: 0 })
            .instr(InstrKind::Binary {
                ty: ValueType::I32,
                op: BinOp::I(IBinOp::DivS),
            })
            .returns(ValueType::I32)
            .expect_trap("integer divide by zero");
    }

    #[test]
    fn test_eqz() {
        ExecTest::new()
            .instr(InstrKind::I32Const { value: 0 })
            .instr(InstrKind::Test {
                ty: ValueType::I32,
                op: TestOp::Eqz,
            })
            .returns(ValueType::I32)
            .expect_results(vec![Value::I32(1)]);
    }
}
