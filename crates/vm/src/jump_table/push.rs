//! Constant-loading and register-move opcodes.

use crate::error::VmResult;
use crate::instruction::Instruction;
use crate::istate::InterpreterState;
use crate::op_code::OpCode;
use crate::value::Value;

use super::{JumpTable, Step};

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::LoadConst, load_const);
    table.set(OpCode::LoadNone, load_none);
    table.set(OpCode::LoadTrue, load_true);
    table.set(OpCode::LoadFalse, load_false);
    table.set(OpCode::LoadUndefined, load_undefined);
    table.set(OpCode::Mov, mov);
}

fn load_const(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let value = state.constant(inst.imm as u32)?;
    state.set_reg(inst.dst, value);
    Ok(Step::Next)
}

fn load_none(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    state.set_reg(inst.dst, Value::None);
    Ok(Step::Next)
}

fn load_true(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    state.set_reg(inst.dst, Value::Bool(true));
    Ok(Step::Next)
}

fn load_false(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    state.set_reg(inst.dst, Value::Bool(false));
    Ok(Step::Next)
}

fn load_undefined(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    state.set_reg(inst.dst, Value::Undefined);
    Ok(Step::Next)
}

fn mov(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let value = state.get_reg(inst.a);
    state.set_reg(inst.dst, value);
    Ok(Step::Next)
}
