//! Hand-assembled programs exercising the dispatch loop end to end,
//! without going through a generator (spec.md §8 "end-to-end scenarios",
//! exercised here at the bytecode level since this crate doesn't depend on
//! the compiler).

use luna_vm::{
    Executable, ExecutionLimits, FunctionObj, Heap, Instruction, ObjectHeader, ObjectRef, OpCode,
    Value, Vm, VmError,
};

fn build_executable(
    heap: &mut Heap,
    name: &str,
    param_count: u32,
    instructions: Vec<Instruction>,
    max_registers: u32,
    constants: Vec<Value>,
) -> ObjectRef {
    let header = ObjectHeader::new(heap.well_known.executable);
    let mut exec = Executable::new(header, name.to_string(), param_count, false);
    exec.spans = vec![Default::default(); instructions.len()];
    exec.instructions = instructions;
    exec.max_register_count = max_registers;
    exec.constants = constants;
    heap.alloc_executable(exec)
}

#[test]
fn arithmetic_follows_operand_order_written_into_the_stream() {
    // 1 + 2 * 3 == 7, assembled directly rather than via operator precedence
    // (this crate has no parser of its own).
    let mut vm = Vm::new(ExecutionLimits::default());
    let executable = build_executable(
        &mut vm.state.heap,
        "<script>",
        0,
        vec![
            Instruction::new(OpCode::LoadConst, 0, 0, 0, 0), // r0 = 2
            Instruction::new(OpCode::LoadConst, 1, 0, 0, 1), // r1 = 3
            Instruction::new(OpCode::Mul, 2, 0, 1, 0),       // r2 = r0 * r1
            Instruction::new(OpCode::LoadConst, 3, 0, 0, 2), // r3 = 1
            Instruction::new(OpCode::Add, 4, 3, 2, 0),       // r4 = r3 + r2
            Instruction::new(OpCode::Hlt, 0, 4, 0, 0),
        ],
        5,
        vec![Value::Int(2), Value::Int(3), Value::Int(1)],
    );
    let module = vm.state.heap.alloc_module("<script>".to_string());
    let result = vm.run(executable, module).expect("script should run to completion");
    assert!(matches!(result, Value::Int(7)));
}

#[test]
fn division_by_zero_raises() {
    let mut vm = Vm::new(ExecutionLimits::default());
    let executable = build_executable(
        &mut vm.state.heap,
        "<script>",
        0,
        vec![
            Instruction::new(OpCode::LoadConst, 0, 0, 0, 0),
            Instruction::new(OpCode::LoadConst, 1, 0, 0, 1),
            Instruction::new(OpCode::Div, 2, 0, 1, 0),
            Instruction::new(OpCode::Hlt, 0, 2, 0, 0),
        ],
        3,
        vec![Value::Int(1), Value::Int(0)],
    );
    let module = vm.state.heap.alloc_module("<script>".to_string());
    let err = vm.run(executable, module).unwrap_err();
    assert_eq!(err, VmError::DivisionByZero);
}

#[test]
fn recursive_call_overflows_the_configured_stack_depth() {
    let mut vm = Vm::new(ExecutionLimits::default());
    let module = vm.state.heap.alloc_module("<script>".to_string());

    // `rec(n) { return rec(n); }`: register 0 is the reserved parameter,
    // the callee is fetched back out of the global slot it's stored in
    // rather than closing over itself directly.
    let rec_exec = build_executable(
        &mut vm.state.heap,
        "rec",
        1,
        vec![
            Instruction::new(OpCode::LoadGlobalByIndex, 1, 0, 0, 0), // r1 = rec (callee)
            Instruction::new(OpCode::Mov, 2, 0, 0, 0),               // r2 = n
            Instruction::new(OpCode::Call, 0, 1, 0, 1),
            Instruction::new(OpCode::Ret, 0, 1, 0, 0),
        ],
        3,
        vec![],
    );
    let rec_fn_header = ObjectHeader::new(vm.state.heap.well_known.function);
    let rec_fn = vm.state.heap.alloc_function(FunctionObj::User {
        header: rec_fn_header,
        executable: rec_exec,
        module,
        name: "rec".to_string(),
        param_count: 1,
        is_variadic: false,
    });

    if let ObjectRef::Module(idx) = module {
        let m = vm.state.heap.module_mut(idx).unwrap();
        m.ensure_slot_capacity(1);
        m.global_slots[0] = Value::Object(rec_fn);
    }

    let entry = build_executable(
        &mut vm.state.heap,
        "<script>",
        0,
        vec![
            Instruction::new(OpCode::LoadGlobalByIndex, 0, 0, 0, 0), // r0 = rec
            Instruction::new(OpCode::LoadConst, 1, 0, 0, 0),         // r1 = 0
            Instruction::new(OpCode::Mov, 2, 0, 0, 0),               // r2 = callee
            Instruction::new(OpCode::Mov, 3, 1, 0, 0),               // r3 = arg
            Instruction::new(OpCode::Call, 0, 2, 0, 1),
            Instruction::new(OpCode::Hlt, 0, 2, 0, 0),
        ],
        4,
        vec![Value::Int(0)],
    );

    let err = vm.run(entry, module).unwrap_err();
    assert_eq!(err, VmError::StackOverflow);
}
