//! Plain-object construction and property access (spec.md §4.6 "method
//! dispatch").

use crate::error::VmResult;
use crate::function_obj::FunctionObj;
use crate::instruction::Instruction;
use crate::istate::InterpreterState;
use crate::object::ObjectRef;
use crate::op_code::OpCode;
use crate::value::Value;

use super::{JumpTable, Step};

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::NewObject, new_object);
    table.set(OpCode::ObjectSetProp, set_prop);
    table.set(OpCode::ObjectGetProp, get_prop);
}

fn new_object(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let obj = state.heap.alloc_plain();
    state.set_reg(inst.dst, Value::Object(obj));
    Ok(Step::Next)
}

fn set_prop(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let receiver = state.get_reg(inst.dst);
    let key = state.identifier(inst.imm as u32)?;
    let hash = state.heap.hash_string_content(key);
    let value = state.get_reg(inst.a);
    if let Some(obj) = receiver.as_object() {
        if let Some(map) = state.heap.properties_of_mut(obj) {
            map.insert(key, hash, value);
        }
    }
    Ok(Step::Next)
}

/// Reads `receiver.<identifier>`. A found function value is wrapped with
/// `receiver` as a bound method (spec.md §4.6); a missing property reads
/// as `Undefined`, same as an unset register, rather than erroring — the
/// runtime has no attribute-error kind (spec.md §7).
fn get_prop(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let receiver = state.get_reg(inst.a);
    let key = state.identifier(inst.imm as u32)?;
    let result = resolve_property(state, receiver, key);
    state.set_reg(inst.dst, result);
    Ok(Step::Next)
}

/// Looks up `receiver.<key>`, wrapping a found function value as a bound
/// method. Shared by `OBJECT_GET_PROP` and the iterator protocol's
/// `iterator()`/`next()` dispatch (spec.md §4.6, §4.7) — both read a named
/// property off an object and need the same bound-method treatment.
pub(super) fn resolve_property(state: &mut InterpreterState, receiver: Value, key: ObjectRef) -> Value {
    let hash = state.heap.hash_string_content(key);
    let found = receiver
        .as_object()
        .and_then(|obj| state.heap.properties_of(obj))
        .and_then(|map| map.get(key, hash))
        .copied();
    match found {
        Some(Value::Object(ObjectRef::Function(fidx))) => {
            let already_bound = matches!(state.heap.function(fidx), Some(FunctionObj::Bound { .. }));
            if already_bound {
                Value::Object(ObjectRef::Function(fidx))
            } else {
                let bound = state.heap.alloc_function(FunctionObj::Bound {
                    header: crate::object::ObjectHeader::new(state.heap.well_known.function),
                    function: ObjectRef::Function(fidx),
                    receiver,
                });
                Value::Object(bound)
            }
        }
        Some(value) => value,
        None => Value::Undefined,
    }
}
