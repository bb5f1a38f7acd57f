//! Lowers a parsed [`crate::ast::Program`] into one or more linked
//! [`Executable`]s (spec.md §4.4 "Bytecode generation").
//!
//! Top-level `let`/`fn` names become module-global slots, addressed by
//! index from every function in the module (`LOAD_GLOBAL_BY_INDEX` /
//! `STORE_GLOBAL_BY_INDEX`); everything else — function parameters,
//! nested `let`s, loop variables — is a plain register local to whichever
//! function it's declared in. A function body is emitted as a sequence of
//! basic blocks; blocks are linearized in creation order and every branch
//! that can't rely on falling into the next block carries an explicit
//! jump, so nothing here depends on control-flow constructs nesting in
//! any particular shape.

mod function_ctx;
mod lower;

use std::collections::{HashMap, HashSet};

use luna_vm::{Executable, Heap, Instruction, ObjectHeader, ObjectRef, OpCode, Span, Value};

use crate::ast::{FnDecl, Program, Stmt};
use crate::error::CompileResult;
use function_ctx::FunctionCtx;

/// Compiles a whole program into its entry [`Executable`], allocated on
/// `heap` along with every nested function it defines. The caller is
/// responsible for wrapping the result in a [`luna_vm::ModuleObj`] and
/// driving it with [`luna_vm::Vm::run`].
pub fn compile(source: &str, heap: &mut Heap) -> CompileResult<ObjectRef> {
    let tokens = crate::lexer::Lexer::new(source).tokenize()?;
    let program = crate::parser::Parser::new(tokens).parse_program()?;
    compile_program(&program, heap)
}

pub(crate) fn compile_program(program: &Program, heap: &mut Heap) -> CompileResult<ObjectRef> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    collect_global_names(&program.statements, &mut order, &mut seen);
    let global_slots: HashMap<String, u32> = order
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name, i as u32))
        .collect();

    generate_function(heap, "<script>".to_string(), &[], false, &program.statements, true, &global_slots)
}

/// Walks top-level statements (including into `if`/`while`/`loop`/`for`
/// bodies, but not into nested function bodies) collecting every `let`
/// and `fn` name in first-appearance order, fixing each one's module
/// global slot index before any code is generated.
fn collect_global_names(stmts: &[Stmt], order: &mut Vec<String>, seen: &mut HashSet<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Let { name, .. } => {
                if seen.insert(name.clone()) {
                    order.push(name.clone());
                }
            }
            Stmt::FnDecl(f) => {
                if seen.insert(f.name.clone()) {
                    order.push(f.name.clone());
                }
            }
            Stmt::If {
                then_block, else_block, ..
            } => {
                collect_global_names(then_block, order, seen);
                if let Some(else_block) = else_block {
                    collect_global_names(else_block, order, seen);
                }
            }
            Stmt::While { body, .. } | Stmt::Loop { body, .. } | Stmt::For { body, .. } => {
                collect_global_names(body, order, seen);
            }
            Stmt::Expr(_) | Stmt::Break(_) | Stmt::Continue(_) | Stmt::Return(..) => {}
        }
    }
}

/// Emits one function body (the top-level script, or a `fn` declared
/// anywhere inside it) as a standalone [`Executable`] and allocates it on
/// the heap. `global_slots` is shared by every function generated from the
/// same program, since module globals are visible everywhere.
pub(crate) fn generate_function(
    heap: &mut Heap,
    name: String,
    params: &[String],
    is_variadic: bool,
    body: &[Stmt],
    is_top_level: bool,
    global_slots: &HashMap<String, u32>,
) -> CompileResult<ObjectRef> {
    let fixed_count = if is_variadic { params.len() - 1 } else { params.len() };

    let mut ctx = FunctionCtx::new(name.clone(), is_top_level);
    ctx.reserve_param_registers((fixed_count + if is_variadic { 1 } else { 0 }) as u32);
    ctx.push_scope();
    for (i, p) in params[..fixed_count].iter().enumerate() {
        ctx.bind_local(p, i as u32);
    }
    if is_variadic {
        ctx.bind_local(&params[fixed_count], fixed_count as u32);
    }

    let entry = ctx.new_block();
    ctx.switch_to(entry);
    lower::lower_block(heap, &mut ctx, body, global_slots)?;

    let final_span = body.last().map(|s| lower::stmt_span(s)).unwrap_or_default();
    let result_reg = ctx.new_register();
    ctx.emit(Instruction::new(OpCode::LoadNone, result_reg, 0, 0, 0), final_span);
    if is_top_level {
        ctx.emit(Instruction::new(OpCode::Hlt, 0, result_reg, 0, 0), final_span);
    } else {
        ctx.emit(Instruction::new(OpCode::Ret, 0, result_reg, 0, 0), final_span);
    }
    ctx.pop_scope();

    let max_register_count = ctx.max_register_count();
    let nested_executables = ctx.nested_executables.clone();
    let global_slot_count = if is_top_level { global_slots.len() as u32 } else { 0 };
    let (blocks, constants, identifiers) = ctx.into_blocks();
    let (instructions, spans) = linearize(blocks);

    let header = ObjectHeader::new(heap.well_known.executable);
    let mut executable = Executable::new(header, name, fixed_count as u32, is_variadic);
    executable.constants = constants;
    executable.identifiers = identifiers;
    executable.instructions = instructions;
    executable.spans = spans;
    executable.max_register_count = max_register_count;
    executable.global_slot_count = global_slot_count;
    executable.nested_executables = nested_executables;

    Ok(heap.alloc_executable(executable))
}

/// Flattens a function's basic blocks into one instruction stream in
/// block-creation order, rewriting every jump-family instruction's `imm`
/// from the block id it was built against into a relative offset in
/// instruction units (the encoding the dispatch loop expects).
fn linearize(blocks: Vec<Vec<(Instruction, Span)>>) -> (Vec<Instruction>, Vec<Span>) {
    let mut block_offsets = Vec::with_capacity(blocks.len());
    let mut offset = 0usize;
    for block in &blocks {
        block_offsets.push(offset);
        offset += block.len();
    }

    let mut instructions = Vec::with_capacity(offset);
    let mut spans = Vec::with_capacity(offset);
    for block in blocks {
        for (inst, span) in block {
            instructions.push(inst);
            spans.push(span);
        }
    }

    for (ip, inst) in instructions.iter_mut().enumerate() {
        if matches!(inst.opcode, OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfTrue) {
            let target_block = inst.imm as usize;
            let target_absolute = block_offsets[target_block] as i64;
            inst.imm = target_absolute - ip as i64;
        }
    }

    (instructions, spans)
}

pub(crate) fn nested_fn_executable(
    heap: &mut Heap,
    decl: &FnDecl,
    global_slots: &HashMap<String, u32>,
) -> CompileResult<ObjectRef> {
    generate_function(heap, decl.name.clone(), &decl.params, decl.is_variadic, &decl.body, false, global_slots)
}
