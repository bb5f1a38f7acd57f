//! Errors produced while lexing, parsing or generating bytecode.

use luna_vm::Span;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// A lex/parse/generation failure. Unlike [`luna_vm::VmError`] these never
/// reach a running program — they're reported by `luna-cli` before
/// execution even starts (spec.md §7 lumps unterminated strings/comments
/// under "internal... exits via the parser, out of core").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at line {}, column {}: {message}", span.line, span.col)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    Lex,
    Parse,
    Generate,
}

impl std::fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompileErrorKind::Lex => "LexError",
            CompileErrorKind::Parse => "ParseError",
            CompileErrorKind::Generate => "GenerateError",
        };
        write!(f, "{s}")
    }
}

impl CompileError {
    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        CompileError {
            kind: CompileErrorKind::Lex,
            message: message.into(),
            span,
        }
    }

    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        CompileError {
            kind: CompileErrorKind::Parse,
            message: message.into(),
            span,
        }
    }

    pub fn generate(message: impl Into<String>, span: Span) -> Self {
        CompileError {
            kind: CompileErrorKind::Generate,
            message: message.into(),
            span,
        }
    }
}
