//! The dispatch loop itself (spec.md §4.5 "Execution loop"), grounded on
//! the source codebase's `ExecutionEngine::execute`/`execute_next`: fetch
//! the instruction at the current frame's `ip`, look it up in the
//! [`JumpTable`], run it, and either advance, jump, or halt depending on
//! what the handler reports.
//!
//! The generator is expected to always terminate a function body with an
//! explicit `RET` (or `HLT` for the entry script), so there is no
//! "ran off the end of the instruction stream" case to special-case here.

use crate::activation::ActivationRecord;
use crate::config::ExecutionLimits;
use crate::error::{VmError, VmResult};
use crate::function_obj::FunctionObj;
use crate::instruction::Instruction;
use crate::istate::InterpreterState;
use crate::jump_table::control;
use crate::jump_table::{JumpTable, Step};
use crate::object::ObjectRef;
use crate::value::Value;

pub struct Vm {
    pub state: InterpreterState,
    jump_table: JumpTable,
}

impl Vm {
    pub fn new(limits: ExecutionLimits) -> Self {
        Vm {
            state: InterpreterState::new(limits),
            jump_table: JumpTable::new(),
        }
    }

    /// Sets up the outermost activation record for `executable` (a
    /// top-level script or an already-resolved module body) and runs it
    /// to completion.
    ///
    /// Reentrant: `import` drives this recursively to run an imported
    /// module's top-level code before returning to the call that triggered
    /// the load, so the loop tracks the call-stack depth it started at
    /// rather than waiting for the stack to go fully empty — the outer
    /// invocation's frames are still sitting underneath.
    pub fn run(&mut self, executable: ObjectRef, module: ObjectRef) -> VmResult<Value> {
        let depth_at_entry = self.state.call_stack.len();
        self.load_entry(executable, module)?;
        self.drive(depth_at_entry)?;
        Ok(self.state.top_level_result.take().unwrap_or(Value::None))
    }

    /// Runs the dispatch loop until the call stack is back down to
    /// `depth_at_entry` frames, or `HLT`/an outermost `RET` halts it outright.
    fn drive(&mut self, depth_at_entry: usize) -> VmResult<()> {
        loop {
            if self.state.call_stack.len() <= depth_at_entry {
                break;
            }
            let inst = self.fetch()?;
            let handler = self
                .jump_table
                .get_handler(inst.opcode)
                .ok_or_else(|| VmError::internal(format!("unimplemented opcode {:?}", inst.opcode)))?;
            match handler(&mut self.state, &inst)? {
                Step::Next => self.state.advance_ip(),
                Step::Jumped => {}
                Step::Halted => break,
                Step::InvokeStateful { callback, args, return_absolute } => {
                    let result = callback(self, &args)?;
                    self.state.register_pool.set_absolute(return_absolute, result);
                }
            }
        }
        Ok(())
    }

    /// Calls `callee` with `args` and drives execution until it returns,
    /// synchronously yielding the result, instead of writing it back to a
    /// register once the main loop happens to see a `RET`. Used by opcode
    /// handlers that need a callable's result immediately — the iterator
    /// protocol's `iterator()`/`next()` dispatch (spec.md §4.7) — which run
    /// as [`Step::InvokeStateful`] callbacks and so already hold `&mut Vm`.
    pub(crate) fn call_sync(&mut self, callee: Value, mut args: Vec<Value>) -> VmResult<Value> {
        let (function_ref, receiver) = control::unwrap_bound(&self.state, callee)?;
        if let Some(receiver) = receiver {
            args.insert(0, receiver);
        }
        let function_idx = match function_ref {
            ObjectRef::Function(i) => i,
            _ => return Err(VmError::type_error(format!("'{}' is not callable", callee.type_name()))),
        };
        let func = self
            .state
            .heap
            .function(function_idx)
            .ok_or_else(|| VmError::internal("function was collected while in use"))?;

        match func {
            FunctionObj::Native { callback, name, param_count, is_variadic, .. } => {
                let (callback, name, param_count, is_variadic) =
                    (*callback, name.clone(), *param_count, *is_variadic);
                control::check_arity(&name, param_count as usize, is_variadic, args.len())?;
                callback(&mut self.state.heap, &args)
            }
            FunctionObj::NativeStateful { callback, name, param_count, is_variadic, .. } => {
                let (callback, name, param_count, is_variadic) =
                    (*callback, name.clone(), *param_count, *is_variadic);
                control::check_arity(&name, param_count as usize, is_variadic, args.len())?;
                callback(self, &args)
            }
            FunctionObj::User { executable, module, name, param_count, is_variadic, .. } => {
                let (name, param_count, is_variadic, executable, module) =
                    (name.clone(), *param_count, *is_variadic, *executable, *module);
                control::check_arity(&name, param_count as usize, is_variadic, args.len())?;

                let exec_idx = match executable {
                    ObjectRef::Executable(i) => i,
                    _ => return Err(VmError::internal("function's executable field is not an Executable")),
                };
                let max_registers = self
                    .state
                    .heap
                    .executable(exec_idx)
                    .ok_or_else(|| VmError::internal("executable was collected while in use"))?
                    .max_register_count as usize;

                // A one-register scratch window holds the return value; it
                // outlives the callee's own window (released on its `RET`)
                // so it's reserved first and released last, preserving the
                // pool's LIFO nesting.
                let scratch = self.state.register_pool.reserve(1)?;
                let return_absolute = self.state.register_pool.absolute(scratch, 0);

                let window = self.state.register_pool.reserve(max_registers.max(args.len()))?;
                if is_variadic {
                    let fixed = param_count as usize;
                    for (i, value) in args.iter().take(fixed).enumerate() {
                        self.state.register_pool.set(window, i as u32, *value);
                    }
                    let rest = self.state.heap.alloc_array();
                    if let ObjectRef::Array(idx) = rest {
                        if let Some(arr) = self.state.heap.array_mut(idx) {
                            for value in args.iter().skip(fixed) {
                                arr.push(*value);
                            }
                        }
                    }
                    self.state.register_pool.set(window, fixed as u32, Value::Object(rest));
                } else {
                    for (i, value) in args.iter().enumerate() {
                        self.state.register_pool.set(window, i as u32, *value);
                    }
                }

                let depth_at_entry = self.state.call_stack.len();
                self.state
                    .push_frame(ActivationRecord::new(executable, module, window, Some(return_absolute)))?;
                self.state.maybe_collect();
                self.drive(depth_at_entry)?;

                let result = self.state.register_pool.get_absolute(return_absolute);
                self.state.register_pool.release(scratch);
                Ok(result)
            }
            FunctionObj::Bound { .. } => unreachable!("unwrap_bound already peeled bound functions"),
        }
    }

    fn load_entry(&mut self, executable: ObjectRef, module: ObjectRef) -> VmResult<()> {
        let exec_idx = match executable {
            ObjectRef::Executable(i) => i,
            _ => return Err(VmError::internal("entry point is not an Executable")),
        };
        let max_registers = self
            .state
            .heap
            .executable(exec_idx)
            .ok_or_else(|| VmError::internal("entry executable missing from heap"))?
            .max_register_count as usize;
        let window = self.state.register_pool.reserve(max_registers)?;
        self.state
            .push_frame(ActivationRecord::new(executable, module, window, None))
    }

    fn fetch(&self) -> VmResult<Instruction> {
        let ip = self.state.cur_ip();
        self.state
            .cur_executable()
            .instructions
            .get(ip)
            .copied()
            .ok_or_else(|| VmError::internal("instruction pointer ran past the end of its executable"))
    }
}
