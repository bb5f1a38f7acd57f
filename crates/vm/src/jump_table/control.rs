//! Control-flow, function creation and call/return opcodes (spec.md §4.5
//! "Call protocol").

use crate::activation::ActivationRecord;
use crate::error::{VmError, VmResult};
use crate::function_obj::FunctionObj;
use crate::instruction::Instruction;
use crate::istate::InterpreterState;
use crate::object::{ObjectHeader, ObjectRef};
use crate::op_code::OpCode;
use crate::value::Value;

use super::arithmetic::truthy;
use super::{JumpTable, Step};

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::Jump, jump);
    table.set(OpCode::JumpIfFalse, jump_if_false);
    table.set(OpCode::JumpIfTrue, jump_if_true);
    table.set(OpCode::MakeFunction, make_function);
    table.set(OpCode::Call, call);
    table.set(OpCode::Ret, ret);
    table.set(OpCode::Hlt, hlt);
}

fn jump_to(state: &mut InterpreterState, inst: &Instruction) {
    let target = (state.cur_ip() as i64 + inst.imm) as usize;
    state.set_ip(target);
}

fn jump(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    jump_to(state, inst);
    Ok(Step::Jumped)
}

fn jump_if_false(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let cond = state.get_reg(inst.a);
    if truthy(state, cond) {
        state.advance_ip();
    } else {
        jump_to(state, inst);
    }
    Ok(Step::Jumped)
}

fn jump_if_true(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let cond = state.get_reg(inst.a);
    if truthy(state, cond) {
        jump_to(state, inst);
    } else {
        state.advance_ip();
    }
    Ok(Step::Jumped)
}

/// `MAKE_FUNCTION dst, _, _, imm`: instantiates a user function closing
/// over the current module from the `imm`-th executable nested inside the
/// current one.
fn make_function(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let outer = state.cur_executable();
    let nested = *outer
        .nested_executables
        .get(inst.imm as usize)
        .ok_or_else(|| VmError::internal("nested executable index out of range"))?;
    let module = state.cur_module_ref();
    let exec_idx = match nested {
        ObjectRef::Executable(i) => i,
        _ => return Err(VmError::internal("nested_executables entry is not an Executable")),
    };
    let (name, param_count, is_variadic) = {
        let exec = state
            .heap
            .executable(exec_idx)
            .ok_or_else(|| VmError::internal("nested executable missing from heap"))?;
        (exec.name.clone(), exec.param_count, exec.is_variadic)
    };
    let header = ObjectHeader::new(state.heap.well_known.function);
    let function = state.heap.alloc_function(FunctionObj::User {
        header,
        executable: nested,
        module,
        name,
        param_count,
        is_variadic,
    });
    state.set_reg(inst.dst, Value::Object(function));
    Ok(Step::Next)
}

/// `CALL base, _, _, argc`: `base` holds the callee; arguments occupy
/// `base+1 ..= base+argc`; the result overwrites `base` once the callee
/// returns (spec.md §4.5's contiguous-argument-window convention).
fn call(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let base = inst.a;
    let argc = inst.imm as usize;
    let callee = state.get_reg(base);
    let mut args: Vec<Value> = (1..=argc as u32).map(|i| state.get_reg(base + i)).collect();

    let (function_ref, receiver) = unwrap_bound(state, callee)?;
    if let Some(receiver) = receiver {
        args.insert(0, receiver);
    }

    let function_idx = match function_ref {
        ObjectRef::Function(i) => i,
        _ => {
            return Err(VmError::type_error(format!(
                "'{}' is not callable",
                callee.type_name()
            )))
        }
    };

    let caller_window = state
        .current_frame()
        .expect("CALL executed with no active frame")
        .registers;
    let return_absolute = state.register_pool.absolute(caller_window, base);

    let func = state
        .heap
        .function(function_idx)
        .ok_or_else(|| VmError::internal("function was collected while in use"))?;

    match func {
        FunctionObj::Native { callback, name, param_count, is_variadic, .. } => {
            check_arity(name, *param_count as usize, *is_variadic, args.len())?;
            let callback = *callback;
            let result = callback(&mut state.heap, &args)?;
            state.register_pool.set_absolute(return_absolute, result);
            state.advance_ip();
            Ok(Step::Jumped)
        }
        FunctionObj::NativeStateful { callback, name, param_count, is_variadic, .. } => {
            check_arity(name, *param_count as usize, *is_variadic, args.len())?;
            let callback = *callback;
            state.advance_ip();
            Ok(Step::InvokeStateful { callback, args, return_absolute })
        }
        FunctionObj::User {
            executable,
            module,
            name,
            param_count,
            is_variadic,
            ..
        } => {
            let (name, param_count, is_variadic, executable, module) =
                (name.clone(), *param_count, *is_variadic, *executable, *module);
            check_arity(&name, param_count as usize, is_variadic, args.len())?;

            let exec_idx = match executable {
                ObjectRef::Executable(i) => i,
                _ => return Err(VmError::internal("function's executable field is not an Executable")),
            };
            let max_registers = state
                .heap
                .executable(exec_idx)
                .ok_or_else(|| VmError::internal("executable was collected while in use"))?
                .max_register_count as usize;

            state.advance_ip();
            let window = state.register_pool.reserve(max_registers.max(args.len()))?;
            if is_variadic {
                let fixed = param_count as usize;
                for (i, value) in args.iter().take(fixed).enumerate() {
                    state.register_pool.set(window, i as u32, *value);
                }
                let rest = state.heap.alloc_array();
                if let ObjectRef::Array(idx) = rest {
                    if let Some(arr) = state.heap.array_mut(idx) {
                        for value in args.iter().skip(fixed) {
                            arr.push(*value);
                        }
                    }
                }
                state.register_pool.set(window, fixed as u32, Value::Object(rest));
            } else {
                for (i, value) in args.iter().enumerate() {
                    state.register_pool.set(window, i as u32, *value);
                }
            }

            state.push_frame(ActivationRecord::new(
                executable,
                module,
                window,
                Some(return_absolute),
            ))?;
            state.maybe_collect();
            Ok(Step::Jumped)
        }
        FunctionObj::Bound { .. } => unreachable!("unwrap_bound already peeled bound functions"),
    }
}

/// Follows `Bound` wrappers to the underlying callable, returning the
/// receiver to prepend to the argument list if one was found. Also used by
/// [`crate::vm::Vm::call_sync`] to drive the iterator protocol's
/// `iterator()`/`next()` calls.
pub(crate) fn unwrap_bound(state: &InterpreterState, value: Value) -> VmResult<(ObjectRef, Option<Value>)> {
    let mut current = match value.as_object() {
        Some(obj @ ObjectRef::Function(_)) => obj,
        _ => {
            return Err(VmError::type_error(format!(
                "'{}' is not callable",
                value.type_name()
            )))
        }
    };
    let mut receiver = None;
    loop {
        let idx = match current {
            ObjectRef::Function(i) => i,
            _ => unreachable!(),
        };
        match state.heap.function(idx) {
            Some(FunctionObj::Bound { function, receiver: r, .. }) => {
                receiver = Some(*r);
                current = *function;
            }
            Some(_) => return Ok((current, receiver)),
            None => return Err(VmError::internal("function was collected while in use")),
        }
    }
}

pub(crate) fn check_arity(name: &str, param_count: usize, is_variadic: bool, actual: usize) -> VmResult<()> {
    if is_variadic {
        if actual < param_count {
            return Err(VmError::arity(name, param_count, actual));
        }
    } else if actual != param_count {
        return Err(VmError::arity(name, param_count, actual));
    }
    Ok(())
}

/// `RET src`: returns the value in register `src` of the current frame to
/// the caller. With no caller left, the VM halts with that value as the
/// program result.
fn ret(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let value = state.get_reg(inst.a);
    let frame = state.pop_frame().expect("RET executed with no active frame");
    match frame.return_register {
        Some(absolute) => {
            state.register_pool.set_absolute(absolute, value);
            Ok(Step::Jumped)
        }
        None => {
            state.top_level_result = Some(value);
            Ok(Step::Halted)
        }
    }
}

fn hlt(state: &mut InterpreterState, inst: &Instruction) -> VmResult<Step> {
    let value = state.get_reg(inst.a);
    state.top_level_result = Some(value);
    Ok(Step::Halted)
}
