//! Statement and expression lowering: the part of the generator that
//! actually walks the AST and emits instructions into a [`FunctionCtx`].

use std::collections::HashMap;

use luna_vm::{Heap, Instruction, OpCode, Span, Value};

use crate::ast::{AssignTarget, BinaryOp, Expr, FnDecl, LogicalOp, Stmt, UnaryOp};
use crate::error::{CompileError, CompileResult};

use super::function_ctx::{FunctionCtx, LoopCtx};

type Globals = HashMap<String, u32>;

pub(super) fn stmt_span(stmt: &Stmt) -> Span {
    match stmt {
        Stmt::Let { span, .. }
        | Stmt::If { span, .. }
        | Stmt::While { span, .. }
        | Stmt::Loop { span, .. }
        | Stmt::For { span, .. } => *span,
        Stmt::FnDecl(f) => f.span,
        Stmt::Expr(e) => e.span(),
        Stmt::Break(s) | Stmt::Continue(s) => *s,
        Stmt::Return(_, s) => *s,
    }
}

pub(super) fn lower_block(heap: &mut Heap, ctx: &mut FunctionCtx, stmts: &[Stmt], globals: &Globals) -> CompileResult<()> {
    for stmt in stmts {
        lower_stmt(heap, ctx, stmt, globals)?;
    }
    Ok(())
}

fn lower_stmt(heap: &mut Heap, ctx: &mut FunctionCtx, stmt: &Stmt, globals: &Globals) -> CompileResult<()> {
    match stmt {
        Stmt::Let { name, value, span } => {
            let value_reg = lower_expr(heap, ctx, value, globals)?;
            if ctx.is_top_level {
                let slot = *globals
                    .get(name)
                    .expect("every top-level let is pre-registered as a global slot");
                ctx.emit(Instruction::new(OpCode::StoreGlobalByIndex, 0, value_reg, 0, slot as i64), *span);
            } else {
                // Copy into a dedicated register so `let y = x;` doesn't alias
                // `x`'s register — a later `x = ...;` must not also change `y`.
                let home = ctx.new_register();
                ctx.emit(Instruction::new(OpCode::Mov, home, value_reg, 0, 0), *span);
                ctx.bind_local(name, home);
            }
            Ok(())
        }
        Stmt::FnDecl(decl) => lower_fn_decl(heap, ctx, decl, globals),
        Stmt::Expr(expr) => {
            lower_expr(heap, ctx, expr, globals)?;
            Ok(())
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
            span,
        } => lower_if(heap, ctx, cond, then_block, else_block.as_deref(), *span, globals),
        Stmt::While { cond, body, span } => lower_while(heap, ctx, cond, body, *span, globals),
        Stmt::Loop { body, span } => lower_loop(heap, ctx, body, *span, globals),
        Stmt::For { var, iterable, body, span } => lower_for(heap, ctx, var, iterable, body, *span, globals),
        Stmt::Break(span) => {
            let target = ctx
                .loop_stack
                .last()
                .map(|l| l.break_block)
                .ok_or_else(|| CompileError::generate("'break' outside of a loop", *span))?;
            ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, target as i64), *span);
            Ok(())
        }
        Stmt::Continue(span) => {
            let target = ctx
                .loop_stack
                .last()
                .map(|l| l.continue_block)
                .ok_or_else(|| CompileError::generate("'continue' outside of a loop", *span))?;
            ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, target as i64), *span);
            Ok(())
        }
        Stmt::Return(value, span) => {
            let value_reg = match value {
                Some(expr) => lower_expr(heap, ctx, expr, globals)?,
                None => {
                    let r = ctx.new_register();
                    ctx.emit(Instruction::new(OpCode::LoadNone, r, 0, 0, 0), *span);
                    r
                }
            };
            ctx.emit(Instruction::new(OpCode::Ret, 0, value_reg, 0, 0), *span);
            Ok(())
        }
    }
}

fn lower_fn_decl(heap: &mut Heap, ctx: &mut FunctionCtx, decl: &FnDecl, globals: &Globals) -> CompileResult<()> {
    let nested = super::nested_fn_executable(heap, decl, globals)?;
    let idx = ctx.nested_executables.len() as u32;
    ctx.nested_executables.push(nested);
    let dst = ctx.new_register();
    ctx.emit(Instruction::new(OpCode::MakeFunction, dst, 0, 0, idx as i64), decl.span);
    if ctx.is_top_level {
        let slot = *globals
            .get(&decl.name)
            .expect("every top-level fn is pre-registered as a global slot");
        ctx.emit(Instruction::new(OpCode::StoreGlobalByIndex, 0, dst, 0, slot as i64), decl.span);
    } else {
        ctx.bind_local(&decl.name, dst);
    }
    Ok(())
}

fn lower_if(
    heap: &mut Heap,
    ctx: &mut FunctionCtx,
    cond: &Expr,
    then_stmts: &[Stmt],
    else_stmts: Option<&[Stmt]>,
    span: Span,
    globals: &Globals,
) -> CompileResult<()> {
    let cond_reg = lower_expr(heap, ctx, cond, globals)?;
    let then_blk = ctx.new_block();
    let else_blk = ctx.new_block();
    let join_blk = ctx.new_block();

    ctx.emit(Instruction::new(OpCode::JumpIfFalse, 0, cond_reg, 0, else_blk as i64), span);

    ctx.switch_to(then_blk);
    ctx.push_scope();
    lower_block(heap, ctx, then_stmts, globals)?;
    ctx.pop_scope();
    ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, join_blk as i64), span);

    ctx.switch_to(else_blk);
    if let Some(else_stmts) = else_stmts {
        ctx.push_scope();
        lower_block(heap, ctx, else_stmts, globals)?;
        ctx.pop_scope();
    }
    ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, join_blk as i64), span);

    ctx.switch_to(join_blk);
    Ok(())
}

fn lower_while(heap: &mut Heap, ctx: &mut FunctionCtx, cond: &Expr, body: &[Stmt], span: Span, globals: &Globals) -> CompileResult<()> {
    let loop_entry = ctx.new_block();
    ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, loop_entry as i64), span);
    ctx.switch_to(loop_entry);

    let cond_reg = lower_expr(heap, ctx, cond, globals)?;
    let body_blk = ctx.new_block();
    let end_blk = ctx.new_block();
    ctx.emit(Instruction::new(OpCode::JumpIfFalse, 0, cond_reg, 0, end_blk as i64), span);

    ctx.switch_to(body_blk);
    ctx.loop_stack.push(LoopCtx {
        break_block: end_blk,
        continue_block: loop_entry,
    });
    ctx.push_scope();
    lower_block(heap, ctx, body, globals)?;
    ctx.pop_scope();
    ctx.loop_stack.pop();
    ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, loop_entry as i64), span);

    ctx.switch_to(end_blk);
    Ok(())
}

fn lower_loop(heap: &mut Heap, ctx: &mut FunctionCtx, body: &[Stmt], span: Span, globals: &Globals) -> CompileResult<()> {
    let loop_entry = ctx.new_block();
    ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, loop_entry as i64), span);
    ctx.switch_to(loop_entry);

    let end_blk = ctx.new_block();
    ctx.loop_stack.push(LoopCtx {
        break_block: end_blk,
        continue_block: loop_entry,
    });
    ctx.push_scope();
    lower_block(heap, ctx, body, globals)?;
    ctx.pop_scope();
    ctx.loop_stack.pop();
    ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, loop_entry as i64), span);

    ctx.switch_to(end_blk);
    Ok(())
}

fn lower_for(
    heap: &mut Heap,
    ctx: &mut FunctionCtx,
    var: &str,
    iterable: &Expr,
    body: &[Stmt],
    span: Span,
    globals: &Globals,
) -> CompileResult<()> {
    let iter_reg = lower_expr(heap, ctx, iterable, globals)?;
    let cursor_reg = ctx.new_register();
    ctx.emit(Instruction::new(OpCode::GetIter, cursor_reg, iter_reg, 0, 0), span);

    let loop_entry = ctx.new_block();
    ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, loop_entry as i64), span);
    ctx.switch_to(loop_entry);

    let result_reg = ctx.new_register();
    ctx.emit(Instruction::new(OpCode::IterNext, result_reg, cursor_reg, 0, 0), span);
    let done_id = ctx.add_identifier(heap, "done");
    let done_reg = ctx.new_register();
    ctx.emit(Instruction::new(OpCode::ObjectGetProp, done_reg, result_reg, 0, done_id as i64), span);

    let body_blk = ctx.new_block();
    let end_blk = ctx.new_block();
    ctx.emit(Instruction::new(OpCode::JumpIfTrue, 0, done_reg, 0, end_blk as i64), span);

    ctx.switch_to(body_blk);
    ctx.push_scope();
    let value_id = ctx.add_identifier(heap, "value");
    let value_reg = ctx.new_register();
    ctx.emit(Instruction::new(OpCode::ObjectGetProp, value_reg, result_reg, 0, value_id as i64), span);
    ctx.bind_local(var, value_reg);
    ctx.loop_stack.push(LoopCtx {
        break_block: end_blk,
        continue_block: loop_entry,
    });
    lower_block(heap, ctx, body, globals)?;
    ctx.loop_stack.pop();
    ctx.pop_scope();
    ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, loop_entry as i64), span);

    ctx.switch_to(end_blk);
    Ok(())
}

fn lower_expr(heap: &mut Heap, ctx: &mut FunctionCtx, expr: &Expr, globals: &Globals) -> CompileResult<u32> {
    match expr {
        Expr::Int(v, span) => {
            let idx = ctx.add_constant(Value::Int(*v));
            let dst = ctx.new_register();
            ctx.emit(Instruction::new(OpCode::LoadConst, dst, 0, 0, idx as i64), *span);
            Ok(dst)
        }
        Expr::Bool(b, span) => {
            let dst = ctx.new_register();
            let opcode = if *b { OpCode::LoadTrue } else { OpCode::LoadFalse };
            ctx.emit(Instruction::new(opcode, dst, 0, 0, 0), *span);
            Ok(dst)
        }
        Expr::Str(s, span) => {
            let interned = heap.intern_string(s);
            let idx = ctx.add_constant(Value::Object(interned));
            let dst = ctx.new_register();
            ctx.emit(Instruction::new(OpCode::LoadConst, dst, 0, 0, idx as i64), *span);
            Ok(dst)
        }
        Expr::None(span) => {
            let dst = ctx.new_register();
            ctx.emit(Instruction::new(OpCode::LoadNone, dst, 0, 0, 0), *span);
            Ok(dst)
        }
        Expr::Ident(name, span) => lower_ident_read(heap, ctx, name, *span, globals),
        Expr::Unary { op, expr, span } => {
            let operand = lower_expr(heap, ctx, expr, globals)?;
            let dst = ctx.new_register();
            let opcode = match op {
                UnaryOp::Neg => OpCode::UnaryMinus,
                UnaryOp::Not => OpCode::UnaryNot,
            };
            ctx.emit(Instruction::new(opcode, dst, operand, 0, 0), *span);
            Ok(dst)
        }
        Expr::Binary { op, lhs, rhs, span } => {
            let l = lower_expr(heap, ctx, lhs, globals)?;
            let r = lower_expr(heap, ctx, rhs, globals)?;
            let dst = ctx.new_register();
            let opcode = binary_opcode(*op);
            ctx.emit(Instruction::new(opcode, dst, l, r, 0), *span);
            Ok(dst)
        }
        Expr::Logical { op, lhs, rhs, span } => lower_logical(heap, ctx, *op, lhs, rhs, *span, globals),
        Expr::Call { callee, args, span } => lower_call(heap, ctx, callee, args, *span, globals),
        Expr::Index { container, index, span } => {
            let c = lower_expr(heap, ctx, container, globals)?;
            let i = lower_expr(heap, ctx, index, globals)?;
            let dst = ctx.new_register();
            ctx.emit(Instruction::new(OpCode::LoadSubscr, dst, c, i, 0), *span);
            Ok(dst)
        }
        Expr::Property { object, name, span } => {
            let o = lower_expr(heap, ctx, object, globals)?;
            let id = ctx.add_identifier(heap, name);
            let dst = ctx.new_register();
            ctx.emit(Instruction::new(OpCode::ObjectGetProp, dst, o, 0, id as i64), *span);
            Ok(dst)
        }
        Expr::Assign { target, value, span } => {
            let value_reg = lower_expr(heap, ctx, value, globals)?;
            lower_assign(heap, ctx, target, value_reg, *span, globals)?;
            Ok(value_reg)
        }
        Expr::ArrayLit { elements, span } => {
            let dst = ctx.new_register();
            ctx.emit(Instruction::new(OpCode::NewArray, dst, 0, 0, 0), *span);
            for element in elements {
                let value_reg = lower_expr(heap, ctx, element, globals)?;
                ctx.emit(Instruction::new(OpCode::ArrayAppend, dst, value_reg, 0, 0), element.span());
            }
            Ok(dst)
        }
        Expr::ObjectLit { entries, span } => {
            let dst = ctx.new_register();
            ctx.emit(Instruction::new(OpCode::NewObject, dst, 0, 0, 0), *span);
            for (key, value) in entries {
                let value_reg = lower_expr(heap, ctx, value, globals)?;
                let id = ctx.add_identifier(heap, key);
                ctx.emit(Instruction::new(OpCode::ObjectSetProp, dst, value_reg, 0, id as i64), value.span());
            }
            Ok(dst)
        }
    }
}

fn lower_ident_read(heap: &mut Heap, ctx: &mut FunctionCtx, name: &str, span: Span, globals: &Globals) -> CompileResult<u32> {
    if let Some(reg) = ctx.lookup_local(name) {
        return Ok(reg);
    }
    let dst = ctx.new_register();
    if let Some(&slot) = globals.get(name) {
        ctx.emit(Instruction::new(OpCode::LoadGlobalByIndex, dst, 0, 0, slot as i64), span);
    } else {
        let id = ctx.add_identifier(heap, name);
        ctx.emit(Instruction::new(OpCode::LoadGlobalByName, dst, 0, 0, id as i64), span);
    }
    Ok(dst)
}

fn lower_assign(
    heap: &mut Heap,
    ctx: &mut FunctionCtx,
    target: &AssignTarget,
    value_reg: u32,
    span: Span,
    globals: &Globals,
) -> CompileResult<()> {
    match target {
        AssignTarget::Ident(name, _) => {
            if let Some(reg) = ctx.lookup_local(name) {
                ctx.emit(Instruction::new(OpCode::Mov, reg, value_reg, 0, 0), span);
            } else if let Some(&slot) = globals.get(name) {
                ctx.emit(Instruction::new(OpCode::StoreGlobalByIndex, 0, value_reg, 0, slot as i64), span);
            } else {
                let id = ctx.add_identifier(heap, name);
                ctx.emit(Instruction::new(OpCode::StoreGlobalByName, 0, value_reg, 0, id as i64), span);
            }
        }
        AssignTarget::Index { container, index, .. } => {
            let c = lower_expr(heap, ctx, container, globals)?;
            let i = lower_expr(heap, ctx, index, globals)?;
            ctx.emit(Instruction::new(OpCode::StoreSubscr, c, i, value_reg, 0), span);
        }
        AssignTarget::Property { object, name, .. } => {
            let o = lower_expr(heap, ctx, object, globals)?;
            let id = ctx.add_identifier(heap, name);
            ctx.emit(Instruction::new(OpCode::ObjectSetProp, o, value_reg, 0, id as i64), span);
        }
    }
    Ok(())
}

/// Short-circuit evaluation of `&&`/`||`: the result is the left operand
/// if it already decides the outcome, otherwise the right operand's value
/// (JS-style value-returning logical operators, not a plain bool).
fn lower_logical(heap: &mut Heap, ctx: &mut FunctionCtx, op: LogicalOp, lhs: &Expr, rhs: &Expr, span: Span, globals: &Globals) -> CompileResult<u32> {
    let l_reg = lower_expr(heap, ctx, lhs, globals)?;
    let result_reg = ctx.new_register();
    ctx.emit(Instruction::new(OpCode::Mov, result_reg, l_reg, 0, 0), span);

    let rhs_blk = ctx.new_block();
    let merge_blk = ctx.new_block();
    let skip_opcode = match op {
        LogicalOp::And => OpCode::JumpIfFalse,
        LogicalOp::Or => OpCode::JumpIfTrue,
    };
    ctx.emit(Instruction::new(skip_opcode, 0, l_reg, 0, merge_blk as i64), span);

    ctx.switch_to(rhs_blk);
    let r_reg = lower_expr(heap, ctx, rhs, globals)?;
    ctx.emit(Instruction::new(OpCode::Mov, result_reg, r_reg, 0, 0), span);
    ctx.emit(Instruction::new(OpCode::Jump, 0, 0, 0, merge_blk as i64), span);

    ctx.switch_to(merge_blk);
    Ok(result_reg)
}

/// Evaluates the callee and every argument into whatever registers they
/// naturally land on, then copies them into a freshly allocated
/// contiguous window immediately before `CALL` — the register counter is
/// monotonic, so nothing else can land between these copies and break
/// contiguity (spec.md §4.5's `base, base+1..=base+argc` convention).
fn lower_call(heap: &mut Heap, ctx: &mut FunctionCtx, callee: &Expr, args: &[Expr], span: Span, globals: &Globals) -> CompileResult<u32> {
    let callee_reg = lower_expr(heap, ctx, callee, globals)?;
    let mut arg_regs = Vec::with_capacity(args.len());
    for arg in args {
        arg_regs.push(lower_expr(heap, ctx, arg, globals)?);
    }

    let base = ctx.new_register();
    ctx.emit(Instruction::new(OpCode::Mov, base, callee_reg, 0, 0), span);
    for reg in arg_regs {
        let slot = ctx.new_register();
        ctx.emit(Instruction::new(OpCode::Mov, slot, reg, 0, 0), span);
    }
    ctx.emit(Instruction::new(OpCode::Call, 0, base, 0, args.len() as i64), span);
    Ok(base)
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::Lt => OpCode::TestLt,
        BinaryOp::Le => OpCode::TestLe,
        BinaryOp::Gt => OpCode::TestGt,
        BinaryOp::Ge => OpCode::TestGe,
        BinaryOp::Eq => OpCode::TestEq,
        BinaryOp::Ne => OpCode::TestNe,
    }
}
