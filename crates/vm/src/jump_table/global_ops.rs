//! Module-global access opcodes (spec.md §4.6 "module-scoped globals").

use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::istate::InterpreterState;
use crate::object::ObjectRef;
use crate::op_code::OpCode;
use crate::value::Value;

use super::{JumpTable, Step};

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::LoadGlobalByIndex, load_by_index);
    table.set(OpCode::StoreGlobalByIndex, store_by_index);
    table.set(OpCode::LoadGlobalByName, load_by_name);
    table.set(OpCode::StoreGlobalByName, store_by_name);
}

fn module_idx(module_ref: ObjectRef) -> VmResult<crate::object::ArenaIndex> {
    match module_ref {
        ObjectRef::Module(i) => Ok(i),
        _ => Err(VmError::internal("activation record's module is not a Module")),
    }
}

fn load_by_index(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let module_ref = state.cur_module_ref();
    let idx = module_idx(module_ref)?;
    let slot = inst.imm as usize;
    let value = state
        .heap
        .module(idx)
        .and_then(|m| m.global_slots.get(slot))
        .copied()
        .unwrap_or(Value::Undefined);
    state.set_reg(inst.dst, value);
    Ok(Step::Next)
}

fn store_by_index(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let module_ref = state.cur_module_ref();
    let idx = module_idx(module_ref)?;
    let slot = inst.imm as usize;
    let value = state.get_reg(inst.a);
    let module = state
        .heap
        .module_mut(idx)
        .ok_or_else(|| VmError::internal("module was collected while in use"))?;
    module.ensure_slot_capacity(slot + 1);
    module.global_slots[slot] = value;
    Ok(Step::Next)
}

fn load_by_name(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let module_ref = state.cur_module_ref();
    let idx = module_idx(module_ref)?;
    let key = state.identifier(inst.imm as u32)?;
    let hash = state.heap.hash_string_content(key);
    if let Some(value) = state.heap.module(idx).and_then(|m| m.globals.get(key, hash)).copied() {
        state.set_reg(inst.dst, value);
        return Ok(Step::Next);
    }
    let name = state.identifier_name(inst.imm as u32)?;
    if let Some(value) = state.lookup_builtin(&name) {
        state.set_reg(inst.dst, value);
        return Ok(Step::Next);
    }
    Err(VmError::name(name))
}

fn store_by_name(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let module_ref = state.cur_module_ref();
    let idx = module_idx(module_ref)?;
    let key = state.identifier(inst.imm as u32)?;
    let hash = state.heap.hash_string_content(key);
    let value = state.get_reg(inst.a);
    let module = state
        .heap
        .module_mut(idx)
        .ok_or_else(|| VmError::internal("module was collected while in use"))?;
    module.globals.insert(key, hash, value);
    Ok(Step::Next)
}
