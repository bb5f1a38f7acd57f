//! Source-to-bytecode-to-result scenarios (spec.md §8 "end-to-end
//! scenarios"), driving the real compiler output through a real VM.

use std::cell::RefCell;

use luna_vm::{ExecutionLimits, FunctionObj, Heap, ObjectHeader, Value, Vm, VmError};

thread_local! {
    static CAPTURED: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

fn capturing_print(heap: &mut Heap, args: &[Value]) -> luna_vm::VmResult<Value> {
    let parts: Vec<String> = args.iter().map(|v| heap.to_display_string(*v)).collect();
    CAPTURED.with(|c| c.borrow_mut().push(parts.join(" ")));
    Ok(Value::None)
}

fn run_with_print_capture(source: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    CAPTURED.with(|c| c.borrow_mut().clear());
    let mut vm = Vm::new(ExecutionLimits::default());

    let header = ObjectHeader::new(vm.state.heap.well_known.function);
    let print_fn = vm.state.heap.alloc_function(FunctionObj::Native {
        header,
        name: "print".to_string(),
        param_count: 0,
        is_variadic: true,
        callback: capturing_print,
    });
    vm.state.register_builtin("print", Value::Object(print_fn));

    let executable = luna_compiler::compile(source, &mut vm.state.heap)?;
    let module = vm.state.heap.alloc_module("<test>".to_string());
    vm.run(executable, module)?;
    Ok(CAPTURED.with(|c| c.borrow().clone()))
}

#[test]
fn arithmetic_precedence() {
    let out = run_with_print_capture("print(1 + 2 * 3);").unwrap();
    assert_eq!(out, vec!["7"]);
}

#[test]
fn array_iteration_visits_elements_in_order() {
    let out = run_with_print_capture("let a = [1, 2, 3]; for x in a { print(x); }").unwrap();
    assert_eq!(out, vec!["1", "2", "3"]);
}

#[test]
fn recursive_function_call() {
    let out = run_with_print_capture("fn f(x) { return x * x; } print(f(11));").unwrap();
    assert_eq!(out, vec!["121"]);
}

#[test]
fn string_concatenation_flattens_and_interns() {
    let mut vm = Vm::new(ExecutionLimits::default());
    let header = ObjectHeader::new(vm.state.heap.well_known.function);
    let print_fn = vm.state.heap.alloc_function(FunctionObj::Native {
        header,
        name: "print".to_string(),
        param_count: 0,
        is_variadic: true,
        callback: capturing_print,
    });
    vm.state.register_builtin("print", Value::Object(print_fn));
    CAPTURED.with(|c| c.borrow_mut().clear());

    let executable = luna_compiler::compile(r#"print("foo" + "bar");"#, &mut vm.state.heap).unwrap();
    let module = vm.state.heap.alloc_module("<test>".to_string());
    vm.run(executable, module).unwrap();

    let out = CAPTURED.with(|c| c.borrow().clone());
    assert_eq!(out, vec!["foobar"]);
    assert_eq!(vm.state.heap.interner.lookup("foobar"), Some(vm.state.heap.intern_string("foobar")));
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let err = run_with_print_capture("print(1 / 0);").unwrap_err();
    let vm_err = err.downcast_ref::<VmError>().expect("expected a VmError");
    assert_eq!(*vm_err, VmError::DivisionByZero);
}

#[test]
fn unbounded_recursion_overflows_the_stack() {
    let err = run_with_print_capture("fn rec(n) { return rec(n); } rec(0);").unwrap_err();
    let vm_err = err.downcast_ref::<VmError>().expect("expected a VmError");
    assert_eq!(*vm_err, VmError::StackOverflow);
}
