//! Iterator protocol opcodes (spec.md §4.4 "iterator protocol lowering",
//! §4.7 "iteration protocol").
//!
//! `GET_ITER` fetches the iterable's `iterator` property and calls it to
//! obtain an iterator object; `ITER_NEXT` calls that iterator's `next()`
//! and yields the `{value, done}` record it returns, which the generator's
//! `for` lowering destructures. Both calls may resolve to ordinary Luna
//! functions, so neither opcode can finish synchronously inside a handler
//! that only holds `&mut InterpreterState` — they go through the same
//! `Step::InvokeStateful` detour `CALL` uses for `import`, landing in
//! [`crate::vm::Vm::call_sync`] once the dispatch loop hands back `&mut Vm`.
//!
//! Arrays have no property map of their own, so they don't carry a stored
//! `iterator` entry; `resolve_iterator` gives them one on demand instead of
//! the opcode special-casing `ObjectRef::Array` directly.

use crate::error::{VmError, VmResult};
use crate::function_obj::{FunctionObj, NativeFn};
use crate::heap::Heap;
use crate::instruction::Instruction;
use crate::istate::InterpreterState;
use crate::object::{ObjectHeader, ObjectRef};
use crate::op_code::OpCode;
use crate::value::Value;
use crate::vm::Vm;

use super::object_ops::resolve_property;
use super::{JumpTable, Step};

const CONTAINER_KEY: &str = "__iter_container";
const INDEX_KEY: &str = "__iter_index";
const NEXT_KEY: &str = "next";
const VALUE_KEY: &str = "value";
const DONE_KEY: &str = "done";

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::GetIter, get_iter);
    table.set(OpCode::IterNext, iter_next);
}

fn return_absolute(state: &InterpreterState, reg: u32) -> usize {
    let window = state.current_frame().expect("no active frame").registers;
    state.register_pool.absolute(window, reg)
}

fn is_callable(value: &Value) -> bool {
    matches!(value.as_object(), Some(ObjectRef::Function(_)))
}

fn get_iter(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let iterable = state.get_reg(inst.a);
    let return_absolute = return_absolute(state, inst.dst);
    state.advance_ip();
    Ok(Step::InvokeStateful {
        callback: get_iter_invoke,
        args: vec![iterable],
        return_absolute,
    })
}

fn get_iter_invoke(vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    let iterable = args.first().copied().unwrap_or(Value::Undefined);
    let method = resolve_iterator(&mut vm.state, iterable)
        .filter(is_callable)
        .ok_or_else(|| VmError::type_error(format!("'{}' is not iterable", iterable.type_name())))?;
    vm.call_sync(method, Vec::new())
}

fn iter_next(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let cursor = state.get_reg(inst.a);
    let return_absolute = return_absolute(state, inst.dst);
    state.advance_ip();
    Ok(Step::InvokeStateful {
        callback: iter_next_invoke,
        args: vec![cursor],
        return_absolute,
    })
}

fn iter_next_invoke(vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    let cursor = args.first().copied().unwrap_or(Value::Undefined);
    let method = resolve_next(&mut vm.state, cursor)
        .filter(is_callable)
        .ok_or_else(|| VmError::type_error("iterator has no callable 'next'"))?;
    let result = vm.call_sync(method, Vec::new())?;
    if result.as_object().is_none() {
        return Err(VmError::type_error("next() must return an object with 'value' and 'done'"));
    }
    Ok(result)
}

/// Resolves `receiver.iterator`. Arrays synthesize a bound native method on
/// the fly rather than storing one, since `ArrayObj` carries no property map.
fn resolve_iterator(state: &mut InterpreterState, receiver: Value) -> Option<Value> {
    if matches!(receiver.as_object(), Some(ObjectRef::Array(_))) {
        return Some(Value::Object(bind(state, array_iterator_native, "iterator", receiver)));
    }
    let key = state.heap.intern_string("iterator");
    match resolve_property(state, receiver, key) {
        Value::Undefined => None,
        other => Some(other),
    }
}

fn resolve_next(state: &mut InterpreterState, cursor: Value) -> Option<Value> {
    let key = state.heap.intern_string(NEXT_KEY);
    match resolve_property(state, cursor, key) {
        Value::Undefined => None,
        other => Some(other),
    }
}

fn bind(state: &mut InterpreterState, callback: NativeFn, name: &str, receiver: Value) -> ObjectRef {
    let header = ObjectHeader::new(state.heap.well_known.function);
    let native = state.heap.alloc_function(FunctionObj::Native {
        header,
        name: name.to_string(),
        param_count: 0,
        is_variadic: false,
        callback,
    });
    let bound_header = ObjectHeader::new(state.heap.well_known.function);
    state.heap.alloc_function(FunctionObj::Bound {
        header: bound_header,
        function: native,
        receiver,
    })
}

/// `array.iterator()`: allocates a small cursor object (container + index)
/// and gives it a `next` method pointing at [`array_cursor_next_native`].
fn array_iterator_native(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let receiver = args.first().copied().unwrap_or(Value::Undefined);
    if !matches!(receiver.as_object(), Some(ObjectRef::Array(_))) {
        return Err(VmError::internal("array iterator method called without an array receiver"));
    }
    let cursor = heap.alloc_plain();
    set_prop(heap, cursor, CONTAINER_KEY, receiver);
    set_prop(heap, cursor, INDEX_KEY, Value::Int(0));
    let header = ObjectHeader::new(heap.well_known.function);
    let next_fn = heap.alloc_function(FunctionObj::Native {
        header,
        name: NEXT_KEY.to_string(),
        param_count: 0,
        is_variadic: false,
        callback: array_cursor_next_native,
    });
    set_prop(heap, cursor, NEXT_KEY, Value::Object(next_fn));
    Ok(Value::Object(cursor))
}

fn array_cursor_next_native(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let cursor = args.first().copied().unwrap_or(Value::Undefined);
    let cursor_ref = cursor
        .as_object()
        .ok_or_else(|| VmError::internal("next() called without a cursor receiver"))?;
    let container = get_prop(heap, cursor_ref, CONTAINER_KEY).and_then(|v| v.as_object());
    let index = get_prop(heap, cursor_ref, INDEX_KEY).and_then(|v| v.as_int()).unwrap_or(0);

    let array_idx = match container {
        Some(ObjectRef::Array(idx)) => idx,
        _ => return Err(VmError::internal("iterator cursor lost its container")),
    };
    let len = heap
        .array(array_idx)
        .ok_or_else(|| VmError::internal("iterated array was collected while in use"))?
        .len() as i64;

    let result = heap.alloc_plain();
    if index < len {
        let value = heap.array(array_idx).unwrap().get(index)?;
        set_prop(heap, result, VALUE_KEY, value);
        set_prop(heap, result, DONE_KEY, Value::Bool(false));
        set_prop(heap, cursor_ref, INDEX_KEY, Value::Int(index + 1));
    } else {
        set_prop(heap, result, VALUE_KEY, Value::None);
        set_prop(heap, result, DONE_KEY, Value::Bool(true));
    }
    Ok(Value::Object(result))
}

fn set_prop(heap: &mut Heap, obj: ObjectRef, name: &str, value: Value) {
    let key = heap.intern_string(name);
    let hash = heap.hash_string_content(key);
    if let Some(map) = heap.properties_of_mut(obj) {
        map.insert(key, hash, value);
    }
}

fn get_prop(heap: &mut Heap, obj: ObjectRef, name: &str) -> Option<Value> {
    let key = heap.intern_string(name);
    let hash = heap.hash_string_content(key);
    heap.properties_of(obj).and_then(|map| map.get(key, hash)).copied()
}
