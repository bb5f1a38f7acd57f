//! Comparison opcodes (spec.md §4.3 "Operators").

use std::cmp::Ordering;

use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::istate::InterpreterState;
use crate::object::ObjectRef;
use crate::op_code::OpCode;
use crate::value::Value;

use super::{JumpTable, Step};

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::TestLt, test_lt);
    table.set(OpCode::TestLe, test_le);
    table.set(OpCode::TestGt, test_gt);
    table.set(OpCode::TestGe, test_ge);
    table.set(OpCode::TestEq, test_eq);
    table.set(OpCode::TestNe, test_ne);
}

fn ordering(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Ordering> {
    let lhs = state.get_reg(inst.a);
    let rhs = state.get_reg(inst.b);
    match (lhs, rhs) {
        (Value::Object(ObjectRef::String(_)), Value::Object(ObjectRef::String(_))) => {
            let l = state.heap.flatten_string(lhs.as_object().unwrap()).unwrap_or_default();
            let r = state.heap.flatten_string(rhs.as_object().unwrap()).unwrap_or_default();
            Ok(l.cmp(&r))
        }
        _ => match (lhs.as_int(), rhs.as_int()) {
            (Some(l), Some(r)) => Ok(l.cmp(&r)),
            _ => Err(VmError::type_mismatch("comparison", lhs.type_name(), rhs.type_name())),
        },
    }
}

fn test_lt(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let ord = ordering(state, inst)?;
    state.set_reg(inst.dst, Value::Bool(ord == Ordering::Less));
    Ok(Step::Next)
}

fn test_le(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let ord = ordering(state, inst)?;
    state.set_reg(inst.dst, Value::Bool(ord != Ordering::Greater));
    Ok(Step::Next)
}

fn test_gt(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let ord = ordering(state, inst)?;
    state.set_reg(inst.dst, Value::Bool(ord == Ordering::Greater));
    Ok(Step::Next)
}

fn test_ge(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let ord = ordering(state, inst)?;
    state.set_reg(inst.dst, Value::Bool(ord != Ordering::Less));
    Ok(Step::Next)
}

/// Structural equality for primitives and strings, identity for every
/// other object kind (spec.md §3: two distinct arrays or plain objects are
/// never `==` even with identical contents).
pub(super) fn values_equal(state: &mut InterpreterState, lhs: Value, rhs: Value) -> bool {
    match (lhs, rhs) {
        (Value::None, Value::None) => true,
        (Value::Undefined, Value::Undefined) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Bool(a), Value::Int(b)) | (Value::Int(b), Value::Bool(a)) => (a as i64) == b,
        (Value::Object(ObjectRef::String(_)), Value::Object(ObjectRef::String(_))) => {
            let l = state.heap.flatten_string(lhs.as_object().unwrap()).unwrap_or_default();
            let r = state.heap.flatten_string(rhs.as_object().unwrap()).unwrap_or_default();
            l == r
        }
        (Value::Object(a), Value::Object(b)) => a == b,
        _ => false,
    }
}

fn test_eq(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let lhs = state.get_reg(inst.a);
    let rhs = state.get_reg(inst.b);
    let eq = values_equal(state, lhs, rhs);
    state.set_reg(inst.dst, Value::Bool(eq));
    Ok(Step::Next)
}

fn test_ne(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let lhs = state.get_reg(inst.a);
    let rhs = state.get_reg(inst.b);
    let eq = values_equal(state, lhs, rhs);
    state.set_reg(inst.dst, Value::Bool(!eq));
    Ok(Step::Next)
}
