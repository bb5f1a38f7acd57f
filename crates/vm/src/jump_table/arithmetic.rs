//! Arithmetic and unary opcodes (spec.md §4.3 "Operators").

use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::istate::InterpreterState;
use crate::object::ObjectRef;
use crate::op_code::OpCode;
use crate::value::Value;

use super::{JumpTable, Step};

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::Add, add);
    table.set(OpCode::Sub, sub);
    table.set(OpCode::Mul, mul);
    table.set(OpCode::Div, div);
    table.set(OpCode::Mod, rem);
    table.set(OpCode::UnaryMinus, unary_minus);
    table.set(OpCode::UnaryNot, unary_not);
}

/// `+` is overloaded for string concatenation (spec.md §4.2 rope
/// strings); every other arithmetic opcode is integer-only.
fn add(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let lhs = state.get_reg(inst.a);
    let rhs = state.get_reg(inst.b);
    let result = match (lhs, rhs) {
        (Value::Object(ObjectRef::String(_)), Value::Object(ObjectRef::String(_))) => {
            let left = lhs.as_object().unwrap();
            let right = rhs.as_object().unwrap();
            Value::Object(state.heap.alloc_rope(left, right))
        }
        _ => {
            let (l, r) = as_int_pair(&lhs, &rhs, "+")?;
            Value::Int(l.wrapping_add(r))
        }
    };
    state.set_reg(inst.dst, result);
    Ok(Step::Next)
}

fn sub(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let lhs = state.get_reg(inst.a);
    let rhs = state.get_reg(inst.b);
    let (l, r) = as_int_pair(&lhs, &rhs, "-")?;
    state.set_reg(inst.dst, Value::Int(l.wrapping_sub(r)));
    Ok(Step::Next)
}

fn mul(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let lhs = state.get_reg(inst.a);
    let rhs = state.get_reg(inst.b);
    let (l, r) = as_int_pair(&lhs, &rhs, "*")?;
    state.set_reg(inst.dst, Value::Int(l.wrapping_mul(r)));
    Ok(Step::Next)
}

/// Truncating integer division (spec.md §9 resolves the original's
/// ambiguous division behavior as true truncating division, i.e. Rust's
/// native `/` on `i64`).
fn div(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let lhs = state.get_reg(inst.a);
    let rhs = state.get_reg(inst.b);
    let (l, r) = as_int_pair(&lhs, &rhs, "/")?;
    if r == 0 {
        return Err(VmError::DivisionByZero);
    }
    state.set_reg(inst.dst, Value::Int(l.wrapping_div(r)));
    Ok(Step::Next)
}

fn rem(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let lhs = state.get_reg(inst.a);
    let rhs = state.get_reg(inst.b);
    let (l, r) = as_int_pair(&lhs, &rhs, "%")?;
    if r == 0 {
        return Err(VmError::DivisionByZero);
    }
    state.set_reg(inst.dst, Value::Int(l.wrapping_rem(r)));
    Ok(Step::Next)
}

fn unary_minus(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let operand = state.get_reg(inst.a);
    let i = operand
        .as_int()
        .ok_or_else(|| VmError::type_error(format!("bad operand type for unary -: '{}'", operand.type_name())))?;
    state.set_reg(inst.dst, Value::Int(i.wrapping_neg()));
    Ok(Step::Next)
}

fn unary_not(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let operand = state.get_reg(inst.a);
    let truthy = truthy(state, operand);
    state.set_reg(inst.dst, Value::Bool(!truthy));
    Ok(Step::Next)
}

pub(super) fn truthy(state: &InterpreterState, value: Value) -> bool {
    match value.primitive_truthy() {
        Some(b) => b,
        None => match value.as_object() {
            Some(obj) => !state.heap.is_falsy_object(obj),
            None => true,
        },
    }
}

fn as_int_pair(lhs: &Value, rhs: &Value, op: &str) -> VmResult<(i64, i64)> {
    match (lhs.as_int(), rhs.as_int()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(VmError::type_mismatch(op, lhs.type_name(), rhs.type_name())),
    }
}
