//! Numeric operator dispatch
//!
//! Pure evaluation of the test, compare, unary, binary, and conversion
//! operator families, dispatched by operand type. Every function returns
//! `Result<Value, NumericError>`; the interpreter converts an error into a
//! trap. Type confusion (an operator applied to the wrong value type) cannot
//! happen on a validated module and reports `NumericError::Type`.
//!
//! Float arithmetic follows IEEE-754 with WebAssembly's NaN rules: any NaN
//! produced by an arithmetic operator is the canonical NaN, while the pure
//! sign-bit operators (`neg`, `abs`, `copysign`) pass payloads through.

use crate::syntax::instruction::{BinOp, CvtOp, FBinOp, FCvtOp, FRelOp, FUnOp, IBinOp, ICvtOp, IRelOp, IUnOp, RelOp,
                                 TestOp, UnOp};
use crate::syntax::ValueType;

use super::Value;

/// Failures raised by the numeric operator layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NumericError {
    #[error("integer divide by zero")]
    DivideByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    #[error("type mismatch")]
    Type,
}

const F32_CANONICAL_NAN: f32 = f32::from_bits(0x7fc0_0000);
const F64_CANONICAL_NAN: f64 = f64::from_bits(0x7ff8_0000_0000_0000);

fn canon_f32(x: f32) -> f32 {
    if x.is_nan() { F32_CANONICAL_NAN } else { x }
}

fn canon_f64(x: f64) -> f64 {
    if x.is_nan() { F64_CANONICAL_NAN } else { x }
}

/// Evaluate a test operator (integers only, result i32)
pub fn test(ty: ValueType, op: TestOp, value: Value) -> Result<Value, NumericError> {
    match (ty, op, value) {
        (ValueType::I32, TestOp::Eqz, Value::I32(v)) => Ok(Value::I32((v == 0) as i32)),
        (ValueType::I64, TestOp::Eqz, Value::I64(v)) => Ok(Value::I32((v == 0) as i32)),
        _ => Err(NumericError::Type),
    }
}

/// Evaluate a comparison operator over two same-typed operands, result i32
pub fn compare(ty: ValueType, op: RelOp, lhs: Value, rhs: Value) -> Result<Value, NumericError> {
    let truth = match (ty, op, lhs, rhs) {
        (ValueType::I32, RelOp::I(op), Value::I32(a), Value::I32(b)) => irel_32(op, a, b),
        (ValueType::I64, RelOp::I(op), Value::I64(a), Value::I64(b)) => irel_64(op, a, b),
        (ValueType::F32, RelOp::F(op), Value::F32(a), Value::F32(b)) => frel(op, a, b),
        (ValueType::F64, RelOp::F(op), Value::F64(a), Value::F64(b)) => frel(op, a, b),
        _ => return Err(NumericError::Type),
    };
    Ok(Value::I32(truth as i32))
}

fn irel_32(op: IRelOp, a: i32, b: i32) -> bool {
    match op {
        IRelOp::Eq => a == b,
        IRelOp::Ne => a != b,
        IRelOp::LtS => a < b,
        IRelOp::LtU => (a as u32) < (b as u32),
        IRelOp::GtS => a > b,
        IRelOp::GtU => (a as u32) > (b as u32),
        IRelOp::LeS => a <= b,
        IRelOp::LeU => (a as u32) <= (b as u32),
        IRelOp::GeS => a >= b,
        IRelOp::GeU => (a as u32) >= (b as u32),
    }
}

fn irel_64(op: IRelOp, a: i64, b: i64) -> bool {
    match op {
        IRelOp::Eq => a == b,
        IRelOp::Ne => a != b,
        IRelOp::LtS => a < b,
        IRelOp::LtU => (a as u64) < (b as u64),
        IRelOp::GtS => a > b,
        IRelOp::GtU => (a as u64) > (b as u64),
        IRelOp::LeS => a <= b,
        IRelOp::LeU => (a as u64) <= (b as u64),
        IRelOp::GeS => a >= b,
        IRelOp::GeU => (a as u64) >= (b as u64),
    }
}

// IEEE comparisons: any comparison with NaN is false, except ne which is true
fn frel<T: PartialOrd>(op: FRelOp, a: T, b: T) -> bool {
    match op {
        FRelOp::Eq => a == b,
        FRelOp::Ne => a != b,
        FRelOp::Lt => a < b,
        FRelOp::Gt => a > b,
        FRelOp::Le => a <= b,
        FRelOp::Ge => a >= b,
    }
}

/// Evaluate a unary operator, same-type result
pub fn unary(ty: ValueType, op: UnOp, value: Value) -> Result<Value, NumericError> {
    match (ty, op, value) {
        (ValueType::I32, UnOp::I(op), Value::I32(v)) => Ok(Value::I32(iun_32(op, v))),
        (ValueType::I64, UnOp::I(op), Value::I64(v)) => Ok(Value::I64(iun_64(op, v))),
        (ValueType::F32, UnOp::F(op), Value::F32(v)) => Ok(Value::F32(fun_32(op, v))),
        (ValueType::F64, UnOp::F(op), Value::F64(v)) => Ok(Value::F64(fun_64(op, v))),
        _ => Err(NumericError::Type),
    }
}

fn iun_32(op: IUnOp, v: i32) -> i32 {
    match op {
        IUnOp::Clz => v.leading_zeros() as i32,
        IUnOp::Ctz => v.trailing_zeros() as i32,
        IUnOp::Popcnt => v.count_ones() as i32,
    }
}

fn iun_64(op: IUnOp, v: i64) -> i64 {
    match op {
        IUnOp::Clz => v.leading_zeros() as i64,
        IUnOp::Ctz => v.trailing_zeros() as i64,
        IUnOp::Popcnt => v.count_ones() as i64,
    }
}

fn fun_32(op: FUnOp, v: f32) -> f32 {
    match op {
        FUnOp::Abs => v.abs(),
        FUnOp::Neg => -v,
        FUnOp::Ceil => canon_f32(v.ceil()),
        FUnOp::Floor => canon_f32(v.floor()),
        FUnOp::Trunc => canon_f32(v.trunc()),
        FUnOp::Nearest => canon_f32(v.round_ties_even()),
        FUnOp::Sqrt => canon_f32(v.sqrt()),
    }
}

fn fun_64(op: FUnOp, v: f64) -> f64 {
    match op {
        FUnOp::Abs => v.abs(),
        FUnOp::Neg => -v,
        FUnOp::Ceil => canon_f64(v.ceil()),
        FUnOp::Floor => canon_f64(v.floor()),
        FUnOp::Trunc => canon_f64(v.trunc()),
        FUnOp::Nearest => canon_f64(v.round_ties_even()),
        FUnOp::Sqrt => canon_f64(v.sqrt()),
    }
}

/// Evaluate a binary operator over two same-typed operands
///
/// `lhs` is the value that was deeper on the stack (`c1` in the
/// specification), `rhs` the one popped first.
pub fn binary(ty: ValueType, op: BinOp, lhs: Value, rhs: Value) -> Result<Value, NumericError> {
    match (ty, op, lhs, rhs) {
        (ValueType::I32, BinOp::I(op), Value::I32(a), Value::I32(b)) => ibin_32(op, a, b).map(Value::I32),
        (ValueType::I64, BinOp::I(op), Value::I64(a), Value::I64(b)) => ibin_64(op, a, b).map(Value::I64),
        (ValueType::F32, BinOp::F(op), Value::F32(a), Value::F32(b)) => Ok(Value::F32(fbin_32(op, a, b))),
        (ValueType::F64, BinOp::F(op), Value::F64(a), Value::F64(b)) => Ok(Value::F64(fbin_64(op, a, b))),
        _ => Err(NumericError::Type),
    }
}

fn ibin_32(op: IBinOp, a: i32, b: i32) -> Result<i32, NumericError> {
    Ok(match op {
        IBinOp::Add => a.wrapping_add(b),
        IBinOp::Sub => a.wrapping_sub(b),
        IBinOp::Mul => a.wrapping_mul(b),
        IBinOp::DivS => {
            if b == 0 {
                return Err(NumericError::DivideByZero);
            }
            if a == i32::MIN && b == -1 {
                return Err(NumericError::Overflow);
            }
            a / b
        }
        IBinOp::DivU => {
            if b == 0 {
                return Err(NumericError::DivideByZero);
            }
            ((a as u32) / (b as u32)) as i32
        }
        IBinOp::RemS => {
            if b == 0 {
                return Err(NumericError::DivideByZero);
            }
            // i32::MIN % -1 is 0, not an overflow
            a.wrapping_rem(b)
        }
        IBinOp::RemU => {
            if b == 0 {
                return Err(NumericError::DivideByZero);
            }
            ((a as u32) % (b as u32)) as i32
        }
        IBinOp::And => a & b,
        IBinOp::Or => a | b,
        IBinOp::Xor => a ^ b,
        // Shift counts are taken modulo the bit width
        IBinOp::Shl => a.wrapping_shl(b as u32),
        IBinOp::ShrS => a.wrapping_shr(b as u32),
        IBinOp::ShrU => ((a as u32).wrapping_shr(b as u32)) as i32,
        IBinOp::Rotl => a.rotate_left((b as u32) % 32),
        IBinOp::Rotr => a.rotate_right((b as u32) % 32),
    })
}

fn ibin_64(op: IBinOp, a: i64, b: i64) -> Result<i64, NumericError> {
    Ok(match op {
        IBinOp::Add => a.wrapping_add(b),
        IBinOp::Sub => a.wrapping_sub(b),
        IBinOp::Mul => a.wrapping_mul(b),
        IBinOp::DivS => {
            if b == 0 {
                return Err(NumericError::DivideByZero);
            }
            if a == i64::MIN && b == -1 {
                return Err(NumericError::Overflow);
            }
            a / b
        }
        IBinOp::DivU => {
            if b == 0 {
                return Err(NumericError::DivideByZero);
            }
            ((a as u64) / (b as u64)) as i64
        }
        IBinOp::RemS => {
            if b == 0 {
                return Err(NumericError::DivideByZero);
            }
            a.wrapping_rem(b)
        }
        IBinOp::RemU => {
            if b == 0 {
                return Err(NumericError::DivideByZero);
            }
            ((a as u64) % (b as u64)) as i64
        }
        IBinOp::And => a & b,
        IBinOp::Or => a | b,
        IBinOp::Xor => a ^ b,
        IBinOp::Shl => a.wrapping_shl(b as u32),
        IBinOp::ShrS => a.wrapping_shr(b as u32),
        IBinOp::ShrU => ((a as u64).wrapping_shr(b as u32)) as i64,
        IBinOp::Rotl => a.rotate_left((b as u64 % 64) as u32),
        IBinOp::Rotr => a.rotate_right((b as u64 % 64) as u32),
    })
}

fn fbin_32(op: FBinOp, a: f32, b: f32) -> f32 {
    match op {
        FBinOp::Add => canon_f32(a + b),
        FBinOp::Sub => canon_f32(a - b),
        FBinOp::Mul => canon_f32(a * b),
        FBinOp::Div => canon_f32(a / b),
        FBinOp::Min => {
            if a.is_nan() || b.is_nan() {
                F32_CANONICAL_NAN
            } else if a == b {
                // -0.0 orders below +0.0
                if a.is_sign_negative() { a } else { b }
            } else if a < b {
                a
            } else {
                b
            }
        }
        FBinOp::Max => {
            if a.is_nan() || b.is_nan() {
                F32_CANONICAL_NAN
            } else if a == b {
                if a.is_sign_negative() { b } else { a }
            } else if a > b {
                a
            } else {
                b
            }
        }
        FBinOp::CopySign => a.copysign(b),
    }
}

fn fbin_64(op: FBinOp, a: f64, b: f64) -> f64 {
    match op {
        FBinOp::Add => canon_f64(a + b),
        FBinOp::Sub => canon_f64(a - b),
        FBinOp::Mul => canon_f64(a * b),
        FBinOp::Div => canon_f64(a / b),
        FBinOp::Min => {
            if a.is_nan() || b.is_nan() {
                F64_CANONICAL_NAN
            } else if a == b {
                if a.is_sign_negative() { a } else { b }
            } else if a < b {
                a
            } else {
                b
            }
        }
        FBinOp::Max => {
            if a.is_nan() || b.is_nan() {
                F64_CANONICAL_NAN
            } else if a == b {
                if a.is_sign_negative() { b } else { a }
            } else if a > b {
                a
            } else {
                b
            }
        }
        FBinOp::CopySign => a.copysign(b),
    }
}

/// Evaluate a conversion; `ty` is the result type
pub fn convert(ty: ValueType, op: CvtOp, value: Value) -> Result<Value, NumericError> {
    use crate::syntax::instruction::{FCvtOp as F, ICvtOp as I};
    match (ty, op, value) {
        // To i32
        (ValueType::I32, CvtOp::I(I::WrapI64), Value::I64(v)) => Ok(Value::I32(v as i32)),
        (ValueType::I32, CvtOp::I(I::TruncSF32), Value::F32(x)) => trunc_to_i32(x as f64),
        (ValueType::I32, CvtOp::I(I::TruncUF32), Value::F32(x)) => trunc_to_u32(x as f64),
        (ValueType::I32, CvtOp::I(I::TruncSF64), Value::F64(x)) => trunc_to_i32(x),
        (ValueType::I32, CvtOp::I(I::TruncUF64), Value::F64(x)) => trunc_to_u32(x),
        (ValueType::I32, CvtOp::I(I::ReinterpretFloat), Value::F32(x)) => Ok(Value::I32(x.to_bits() as i32)),

        // To i64
        (ValueType::I64, CvtOp::I(I::ExtendSI32), Value::I32(v)) => Ok(Value::I64(v as i64)),
        (ValueType::I64, CvtOp::I(I::ExtendUI32), Value::I32(v)) => Ok(Value::I64(v as u32 as i64)),
        (ValueType::I64, CvtOp::I(I::TruncSF32), Value::F32(x)) => trunc_to_i64(x as f64),
        (ValueType::I64, CvtOp::I(I::TruncUF32), Value::F32(x)) => trunc_to_u64(x as f64),
        (ValueType::I64, CvtOp::I(I::TruncSF64), Value::F64(x)) => trunc_to_i64(x),
        (ValueType::I64, CvtOp::I(I::TruncUF64), Value::F64(x)) => trunc_to_u64(x),
        (ValueType::I64, CvtOp::I(I::ReinterpretFloat), Value::F64(x)) => Ok(Value::I64(x.to_bits() as i64)),

        // To f32
        (ValueType::F32, CvtOp::F(F::ConvertSI32), Value::I32(v)) => Ok(Value::F32(v as f32)),
        (ValueType::F32, CvtOp::F(F::ConvertUI32), Value::I32(v)) => Ok(Value::F32(v as u32 as f32)),
        (ValueType::F32, CvtOp::F(F::ConvertSI64), Value::I64(v)) => Ok(Value::F32(v as f32)),
        (ValueType::F32, CvtOp::F(F::ConvertUI64), Value::I64(v)) => Ok(Value::F32(v as u64 as f32)),
        (ValueType::F32, CvtOp::F(F::DemoteF64), Value::F64(x)) => Ok(Value::F32(canon_f32(x as f32))),
        (ValueType::F32, CvtOp::F(F::ReinterpretInt), Value::I32(v)) => Ok(Value::F32(f32::from_bits(v as u32))),

        // To f64
        (ValueType::F64, CvtOp::F(F::ConvertSI32), Value::I32(v)) => Ok(Value::F64(v as f64)),
        (ValueType::F64, CvtOp::F(F::ConvertUI32), Value::I32(v)) => Ok(Value::F64(v as u32 as f64)),
        (ValueType::F64, CvtOp::F(F::ConvertSI64), Value::I64(v)) => Ok(Value::F64(v as f64)),
        (ValueType::F64, CvtOp::F(F::ConvertUI64), Value::I64(v)) => Ok(Value::F64(v as u64 as f64)),
        (ValueType::F64, CvtOp::F(F::PromoteF32), Value::F32(x)) => Ok(Value::F64(canon_f64(x as f64))),
        (ValueType::F64, CvtOp::F(F::ReinterpretInt), Value::I64(v)) => Ok(Value::F64(f64::from_bits(v as u64))),

        _ => Err(NumericError::Type),
    }
}

// Float-to-int truncations go through f64 (exact for any f32 input) and
// bounds-check on power-of-two limits, which f64 represents exactly.

fn trunc_to_i32(x: f64) -> Result<Value, NumericError> {
    if x.is_nan() {
        return Err(NumericError::InvalidConversion);
    }
    let t = x.trunc();
    if t < -2147483648.0 || t >= 2147483648.0 {
        return Err(NumericError::Overflow);
    }
    Ok(Value::I32(t as i32))
}

fn trunc_to_u32(x: f64) -> Result<Value, NumericError> {
    if x.is_nan() {
        return Err(NumericError::InvalidConversion);
    }
    let t = x.trunc();
    if t < 0.0 || t >= 4294967296.0 {
        return Err(NumericError::Overflow);
    }
    Ok(Value::I32(t as u32 as i32))
}

fn trunc_to_i64(x: f64) -> Result<Value, NumericError> {
    if x.is_nan() {
        return Err(NumericError::InvalidConversion);
    }
    let t = x.trunc();
    if t < -9223372036854775808.0 || t >= 9223372036854775808.0 {
        return Err(NumericError::Overflow);
    }
    Ok(Value::I64(t as i64))
}

fn trunc_to_u64(x: f64) -> Result<Value, NumericError> {
    if x.is_nan() {
        return Err(NumericError::InvalidConversion);
    }
    let t = x.trunc();
    if t < 0.0 || t >= 18446744073709551616.0 {
        return Err(NumericError::Overflow);
    }
    Ok(Value::I64(t as u64 as i64))
}
