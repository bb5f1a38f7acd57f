//! Native functions and objects registered into the global namespace before
//! a script runs: `print`, `len`, `raise`, `import`, and `process`.

use std::path::PathBuf;

use luna_vm::{FunctionObj, Heap, ObjectHeader, ObjectRef, VmError, VmResult, Value, Vm};

/// Registers every built-in name `luna-vm` expects the embedding to
/// preregister, plus `process.argv`, into `vm.state.builtins`.
pub fn install(vm: &mut Vm, argv: &[String]) {
    register_native(vm, "print", 0, true, native_print);
    register_native(vm, "len", 1, false, native_len);
    register_native(vm, "raise", 1, false, native_raise);
    register_stateful(vm, "import", 1, false, native_import);

    let process = build_process_object(vm, argv);
    vm.state.register_builtin("process", Value::Object(process));
}

fn register_native(vm: &mut Vm, name: &str, param_count: u32, is_variadic: bool, callback: luna_vm::NativeFn) {
    let header = ObjectHeader::new(vm.state.heap.well_known.function);
    let function = vm.state.heap.alloc_function(FunctionObj::Native {
        header,
        name: name.to_string(),
        param_count,
        is_variadic,
        callback,
    });
    vm.state.register_builtin(name, Value::Object(function));
}

fn register_stateful(
    vm: &mut Vm,
    name: &str,
    param_count: u32,
    is_variadic: bool,
    callback: luna_vm::StatefulNativeFn,
) {
    let header = ObjectHeader::new(vm.state.heap.well_known.function);
    let function = vm.state.heap.alloc_function(FunctionObj::NativeStateful {
        header,
        name: name.to_string(),
        param_count,
        is_variadic,
        callback,
    });
    vm.state.register_builtin(name, Value::Object(function));
}

fn build_process_object(vm: &mut Vm, argv: &[String]) -> ObjectRef {
    let process = vm.state.heap.alloc_plain();

    let array = vm.state.heap.alloc_array();
    if let ObjectRef::Array(idx) = array {
        let interned: Vec<ObjectRef> = argv.iter().map(|arg| vm.state.heap.intern_string(arg)).collect();
        if let Some(arr) = vm.state.heap.array_mut(idx) {
            for s in interned {
                arr.push(Value::Object(s));
            }
        }
    }
    set_property(&mut vm.state.heap, process, "argv", Value::Object(array));

    let cwd_header = ObjectHeader::new(vm.state.heap.well_known.function);
    let cwd_fn = vm.state.heap.alloc_function(FunctionObj::Native {
        header: cwd_header,
        name: "cwd".to_string(),
        param_count: 0,
        is_variadic: false,
        callback: native_cwd,
    });
    set_property(&mut vm.state.heap, process, "cwd", Value::Object(cwd_fn));

    process
}

fn set_property(heap: &mut Heap, object: ObjectRef, name: &str, value: Value) {
    let key = heap.intern_string(name);
    let hash = heap.hash_string_content(key);
    if let Some(props) = heap.properties_of_mut(object) {
        props.insert(key, hash, value);
    }
}

fn native_print(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let parts: Vec<String> = args.iter().map(|v| heap.to_display_string(*v)).collect();
    println!("{}", parts.join(" "));
    Ok(Value::None)
}

fn native_len(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let value = args.first().copied().unwrap_or(Value::Undefined);
    let count = match value {
        Value::Object(obj @ ObjectRef::String(_)) => heap.string_len(obj).unwrap_or(0),
        Value::Object(ObjectRef::Array(idx)) => heap.array(idx).map(|a| a.len()).unwrap_or(0),
        _ => {
            return Err(VmError::type_error(format!(
                "object of type '{}' has no len()",
                value.type_name()
            )))
        }
    };
    Ok(Value::Int(count as i64))
}

fn native_raise(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let value = args.first().copied().unwrap_or(Value::Undefined);
    let message = match value.as_object() {
        Some(obj) => heap.flatten_string(obj).unwrap_or_else(|| heap.to_display_string(value)),
        None => heap.to_display_string(value),
    };
    Err(VmError::runtime(message))
}

fn native_cwd(heap: &mut Heap, _args: &[Value]) -> VmResult<Value> {
    let cwd = std::env::current_dir().map_err(|e| VmError::runtime(format!("cannot read working directory: {e}")))?;
    let s = heap.intern_string(&cwd.to_string_lossy());
    Ok(Value::Object(s))
}

/// Resolves `<name>.luna` against the current working directory, compiles
/// and runs it the first time it's imported, and caches the value its
/// top-level code returned under the resolved absolute path so later
/// imports of the same module are a cache hit rather than a re-run.
fn native_import(vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    let name_value = args.first().copied().unwrap_or(Value::Undefined);
    let name = name_value
        .as_object()
        .and_then(|obj| vm.state.heap.flatten_string(obj))
        .ok_or_else(|| VmError::type_error("import() expects a string module name"))?;

    let candidate = PathBuf::from(format!("{name}.luna"));
    let resolved = std::fs::canonicalize(&candidate)
        .map_err(|_| VmError::runtime(format!("cannot find module '{name}'")))?;
    let resolved_key = resolved.to_string_lossy().into_owned();

    if let Some((_, exported)) = vm.state.module_cache.get(&resolved_key) {
        return Ok(exported);
    }

    let source = std::fs::read_to_string(&resolved)
        .map_err(|e| VmError::runtime(format!("cannot read module '{name}': {e}")))?;
    let executable = luna_compiler::compile(&source, &mut vm.state.heap)
        .map_err(|e| VmError::runtime(e.to_string()))?;
    let module = vm.state.heap.alloc_module(resolved_key.clone());

    let exported = vm.run(executable, module)?;
    vm.state.module_cache.insert(resolved_key, module, exported);
    Ok(exported)
}
