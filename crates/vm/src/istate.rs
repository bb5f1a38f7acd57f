//! Interpreter-wide state tying the heap, register pool, call stack and
//! module cache together (spec.md §4.1 root enumeration, §4.6 modules).

use crate::activation::ActivationRecord;
use crate::config::ExecutionLimits;
use crate::error::{VmError, VmResult};
use crate::executable::Executable;
use crate::heap::Heap;
use crate::module::ModuleCache;
use crate::object::ObjectRef;
use crate::property_map::PropertyMap;
use crate::register_pool::RegisterPool;
use crate::value::Value;

pub struct InterpreterState {
    pub heap: Heap,
    pub register_pool: RegisterPool,
    pub call_stack: Vec<ActivationRecord>,
    pub module_cache: ModuleCache,
    pub builtins: PropertyMap,
    pub limits: ExecutionLimits,
    /// Set by `raise` (or an internal fault turned user-visible) while
    /// unwinding; cleared once a handler consumes it. The VM's dispatch
    /// loop itself has no `try`/`catch` opcode (spec.md Non-goals), so this
    /// is only observed at the native/CLI boundary.
    pub current_error: Option<ObjectRef>,
    /// Value the outermost frame returned, read by `luna-cli` once
    /// `execute` halts.
    pub top_level_result: Option<Value>,
}

impl InterpreterState {
    pub fn new(limits: ExecutionLimits) -> Self {
        InterpreterState {
            heap: Heap::new(limits.gc_threshold_bytes),
            register_pool: RegisterPool::new(limits.register_pool_capacity),
            call_stack: Vec::new(),
            module_cache: ModuleCache::new(),
            builtins: PropertyMap::new(),
            limits,
            current_error: None,
            top_level_result: None,
        }
    }

    pub fn get_reg(&self, r: u32) -> Value {
        let frame = self.call_stack.last().expect("no active frame");
        self.register_pool.get(frame.registers, r)
    }

    pub fn set_reg(&mut self, r: u32, value: Value) {
        let window = self.call_stack.last().expect("no active frame").registers;
        self.register_pool.set(window, r, value);
    }

    pub fn cur_executable_ref(&self) -> ObjectRef {
        self.call_stack.last().expect("no active frame").executable
    }

    pub fn cur_module_ref(&self) -> ObjectRef {
        self.call_stack.last().expect("no active frame").module
    }

    pub fn cur_executable(&self) -> &Executable {
        let idx = match self.cur_executable_ref() {
            ObjectRef::Executable(i) => i,
            _ => unreachable!("activation record always points at an Executable"),
        };
        self.heap
            .executable(idx)
            .expect("current executable was collected while its frame was live")
    }

    pub fn cur_ip(&self) -> usize {
        self.call_stack.last().expect("no active frame").ip
    }

    pub fn set_ip(&mut self, ip: usize) {
        self.call_stack.last_mut().expect("no active frame").ip = ip;
    }

    pub fn advance_ip(&mut self) {
        let ip = self.cur_ip();
        self.set_ip(ip + 1);
    }

    pub fn constant(&self, idx: u32) -> VmResult<Value> {
        self.cur_executable()
            .constants
            .get(idx as usize)
            .copied()
            .ok_or_else(|| VmError::internal("constant index out of range"))
    }

    pub fn identifier(&self, idx: u32) -> VmResult<ObjectRef> {
        self.cur_executable()
            .identifiers
            .get(idx as usize)
            .copied()
            .ok_or_else(|| VmError::internal("identifier index out of range"))
    }

    pub fn identifier_name(&mut self, idx: u32) -> VmResult<String> {
        let id = self.identifier(idx)?;
        Ok(self.heap.flatten_string(id).unwrap_or_default())
    }

    /// Registers in `builtins` under an interned name so it can be reached
    /// from `LOAD_GLOBAL_BY_NAME` when the current module doesn't shadow it
    /// (spec.md §6 "expected globals").
    pub fn register_builtin(&mut self, name: &str, value: Value) {
        let key = self.heap.intern_string(name);
        let hash = self.heap.hash_string_content(key);
        self.builtins.insert(key, hash, value);
    }

    pub fn lookup_builtin(&mut self, name: &str) -> Option<Value> {
        let key = self.heap.interner.lookup(name)?;
        let hash = self.heap.hash_string_content(key);
        self.builtins.get(key, hash).copied()
    }

    pub fn push_frame(&mut self, frame: ActivationRecord) -> VmResult<()> {
        if self.call_stack.len() >= self.limits.max_call_depth {
            return Err(VmError::StackOverflow);
        }
        self.call_stack.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) -> Option<ActivationRecord> {
        let frame = self.call_stack.pop()?;
        self.register_pool.release(frame.registers);
        Some(frame)
    }

    pub fn current_frame(&self) -> Option<&ActivationRecord> {
        self.call_stack.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut ActivationRecord> {
        self.call_stack.last_mut()
    }

    /// Collects roots and runs a collection if the heap is over threshold.
    /// Safe to call at any instruction boundary: every live register below
    /// the pool's high-water mark belongs to some still-active frame, so a
    /// flat scan suffices without per-frame bookkeeping.
    pub fn maybe_collect(&mut self) {
        if !self.heap.should_collect() {
            return;
        }
        let roots = self.gather_roots();
        self.heap.collect(&roots);
    }

    pub fn force_collect(&mut self) {
        let roots = self.gather_roots();
        self.heap.collect(&roots);
    }

    fn gather_roots(&self) -> Vec<ObjectRef> {
        let mut roots = Vec::new();
        for value in self.register_pool.live_slice() {
            if let Value::Object(r) = value {
                roots.push(*r);
            }
        }
        for frame in &self.call_stack {
            roots.push(frame.executable);
            roots.push(frame.module);
        }
        for (key, value) in self.builtins.iter_in_insertion_order() {
            roots.push(key);
            if let Value::Object(r) = value {
                roots.push(r);
            }
        }
        let wk = self.heap.well_known;
        roots.push(wk.plain);
        roots.push(wk.string);
        roots.push(wk.array);
        roots.push(wk.function);
        roots.push(wk.executable);
        roots.push(wk.module);
        roots.push(wk.error);
        roots.push(wk.type_desc);
        if let Some(err) = self.current_error {
            roots.push(err);
        }
        roots
    }
}
