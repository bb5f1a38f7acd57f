//! Function object variants (spec.md §3 "Function object").

use crate::error::VmResult;
use crate::heap::Heap;
use crate::object::{ObjectHeader, ObjectRef};
use crate::value::Value;
use crate::vm::Vm;

/// Signature for a native (Rust-implemented) Luna function that only
/// needs heap access (`print`, `len`, `process.cwd`).
pub type NativeFn = fn(&mut Heap, &[Value]) -> VmResult<Value>;

/// Signature for a native function that needs the whole VM rather than
/// just the heap — currently only `import`, which has to consult/populate
/// `module_cache` and run another module's top-level code to completion
/// before returning. The embedding (not this crate) supplies the
/// callback, since compiling the imported source is `luna-compiler`'s job
/// and this crate has no dependency on it; the callback gets `&mut Vm` so
/// it can call [`Vm::run`] recursively.
pub type StatefulNativeFn = fn(&mut Vm, &[Value]) -> VmResult<Value>;

pub enum FunctionObj {
    /// A function compiled from Luna source: points at its `Executable`
    /// and the module it closes over (spec.md §4.6 module-scoped globals).
    User {
        header: ObjectHeader,
        executable: ObjectRef,
        module: ObjectRef,
        name: String,
        param_count: u32,
        is_variadic: bool,
    },
    /// A Rust function exposed to Luna code (`print`, `len`, builtins).
    Native {
        header: ObjectHeader,
        name: String,
        param_count: u32,
        is_variadic: bool,
        callback: NativeFn,
    },
    /// A Rust function that needs more than heap access to do its job.
    NativeStateful {
        header: ObjectHeader,
        name: String,
        param_count: u32,
        is_variadic: bool,
        callback: StatefulNativeFn,
    },
    /// A function value with its receiver already substituted, produced by
    /// property access returning a method (spec.md §4.6 "bound functions").
    Bound {
        header: ObjectHeader,
        function: ObjectRef,
        receiver: Value,
    },
}

impl FunctionObj {
    pub fn header(&self) -> &ObjectHeader {
        match self {
            FunctionObj::User { header, .. } => header,
            FunctionObj::Native { header, .. } => header,
            FunctionObj::NativeStateful { header, .. } => header,
            FunctionObj::Bound { header, .. } => header,
        }
    }

    pub fn header_mut(&mut self) -> &mut ObjectHeader {
        match self {
            FunctionObj::User { header, .. } => header,
            FunctionObj::Native { header, .. } => header,
            FunctionObj::NativeStateful { header, .. } => header,
            FunctionObj::Bound { header, .. } => header,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            FunctionObj::User { name, .. } => name,
            FunctionObj::Native { name, .. } => name,
            FunctionObj::NativeStateful { name, .. } => name,
            FunctionObj::Bound { .. } => "<bound method>",
        }
    }
}
