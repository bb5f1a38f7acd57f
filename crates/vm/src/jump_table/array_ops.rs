//! Array construction and subscript opcodes (spec.md §3 "Array object",
//! §4.3 "Operators" for `a[i]`).

use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::istate::InterpreterState;
use crate::object::ObjectRef;
use crate::op_code::OpCode;
use crate::value::Value;

use super::{JumpTable, Step};

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::NewArray, new_array);
    table.set(OpCode::ArrayAppend, array_append);
    table.set(OpCode::LoadSubscr, load_subscr);
    table.set(OpCode::StoreSubscr, store_subscr);
}

fn new_array(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let arr = state.heap.alloc_array();
    state.set_reg(inst.dst, Value::Object(arr));
    Ok(Step::Next)
}

fn array_append(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let container = state.get_reg(inst.dst);
    let value = state.get_reg(inst.a);
    match container.as_object() {
        Some(ObjectRef::Array(idx)) => {
            let arr = state
                .heap
                .array_mut(idx)
                .ok_or_else(|| VmError::internal("array was collected while in use"))?;
            arr.push(value);
            Ok(Step::Next)
        }
        _ => Err(VmError::type_error(format!(
            "cannot append to '{}'",
            container.type_name()
        ))),
    }
}

/// `container[index]`: integer indexing into an array, or string-keyed
/// dynamic property access on a plain object (the bracket-access twin of
/// `OBJECT_GET_PROP`, used when the key isn't known at compile time).
fn load_subscr(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let container = state.get_reg(inst.a);
    let index = state.get_reg(inst.b);
    let result = match container.as_object() {
        Some(ObjectRef::Array(idx)) => {
            let i = index
                .as_int()
                .ok_or_else(|| VmError::type_error("array index must be an int"))?;
            let arr = state
                .heap
                .array(idx)
                .ok_or_else(|| VmError::internal("array was collected while in use"))?;
            arr.get(i)?
        }
        Some(obj @ ObjectRef::Plain(_)) => {
            let key_str = match index.as_object() {
                Some(ObjectRef::String(_)) => state.heap.flatten_string(index.as_object().unwrap()).unwrap_or_default(),
                _ => return Err(VmError::type_error("object key must be a string")),
            };
            let key = state.heap.intern_string(&key_str);
            let hash = state.heap.hash_string_content(key);
            state
                .heap
                .properties_of(obj)
                .and_then(|map| map.get(key, hash))
                .copied()
                .unwrap_or(Value::Undefined)
        }
        _ => {
            return Err(VmError::type_error(format!(
                "'{}' is not subscriptable",
                container.type_name()
            )))
        }
    };
    state.set_reg(inst.dst, result);
    Ok(Step::Next)
}

fn store_subscr(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let container = state.get_reg(inst.dst);
    let index = state.get_reg(inst.a);
    let value = state.get_reg(inst.b);
    match container.as_object() {
        Some(ObjectRef::Array(idx)) => {
            let i = index
                .as_int()
                .ok_or_else(|| VmError::type_error("array index must be an int"))?;
            let arr = state
                .heap
                .array_mut(idx)
                .ok_or_else(|| VmError::internal("array was collected while in use"))?;
            arr.set(i, value)?;
        }
        Some(obj @ ObjectRef::Plain(_)) => {
            let key_str = match index.as_object() {
                Some(ObjectRef::String(_)) => state.heap.flatten_string(index.as_object().unwrap()).unwrap_or_default(),
                _ => return Err(VmError::type_error("object key must be a string")),
            };
            let key = state.heap.intern_string(&key_str);
            let hash = state.heap.hash_string_content(key);
            if let Some(map) = state.heap.properties_of_mut(obj) {
                map.insert(key, hash, value);
            }
        }
        _ => {
            return Err(VmError::type_error(format!(
                "'{}' does not support item assignment",
                container.type_name()
            )))
        }
    }
    Ok(Step::Next)
}
