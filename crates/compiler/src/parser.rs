//! Recursive-descent parser: `Token` stream → [`ast::Program`]. Precedence
//! is handled by one function per binding level rather than a Pratt table
//! (spec.md "no operator-precedence table beyond what's needed").

use luna_vm::Span;

use crate::ast::*;
use crate::error::{CompileError, CompileResult};
use crate::lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse_program(mut self) -> CompileResult<Program> {
        let mut statements = Vec::new();
        while !self.at_eof() {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    // --- token stream helpers -------------------------------------------

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> CompileResult<Token> {
        if self.check(&kind) {
            Ok(self.bump())
        } else {
            Err(CompileError::parse(
                format!("expected {what}, found {:?}", self.peek()),
                self.peek_span(),
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> CompileResult<(String, Span)> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok((name, span))
            }
            other => Err(CompileError::parse(
                format!("expected {what}, found {other:?}"),
                span,
            )),
        }
    }

    // --- statements -------------------------------------------------------

    fn parse_block(&mut self) -> CompileResult<Block> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(statements)
    }

    fn parse_statement(&mut self) -> CompileResult<Stmt> {
        match self.peek().clone() {
            TokenKind::Let => self.parse_let(),
            TokenKind::Fn => Ok(Stmt::FnDecl(self.parse_fn_decl()?)),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Loop => self.parse_loop(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => {
                let span = self.bump().span;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Break(span))
            }
            TokenKind::Continue => {
                let span = self.bump().span;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Continue(span))
            }
            TokenKind::Return => {
                let span = self.bump().span;
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Return(value, span))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_let(&mut self) -> CompileResult<Stmt> {
        let span = self.bump().span; // `let`
        let (name, _) = self.expect_ident("a variable name")?;
        self.expect(TokenKind::Eq, "'='")?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::Let { name, value, span })
    }

    fn parse_fn_decl(&mut self) -> CompileResult<FnDecl> {
        let span = self.bump().span; // `fn`
        let (name, _) = self.expect_ident("a function name")?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        let mut is_variadic = false;
        while !self.check(&TokenKind::RParen) {
            if self.eat(&TokenKind::DotDotDot) {
                let (rest_name, _) = self.expect_ident("a rest parameter name")?;
                params.push(rest_name);
                is_variadic = true;
                break;
            }
            let (param, _) = self.expect_ident("a parameter name")?;
            params.push(param);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        Ok(FnDecl {
            name,
            params,
            is_variadic,
            body,
            span,
        })
    }

    fn parse_if(&mut self) -> CompileResult<Stmt> {
        let span = self.bump().span; // `if`
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
            span,
        })
    }

    fn parse_while(&mut self) -> CompileResult<Stmt> {
        let span = self.bump().span; // `while`
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body, span })
    }

    fn parse_loop(&mut self) -> CompileResult<Stmt> {
        let span = self.bump().span; // `loop`
        let body = self.parse_block()?;
        Ok(Stmt::Loop { body, span })
    }

    fn parse_for(&mut self) -> CompileResult<Stmt> {
        let span = self.bump().span; // `for`
        let (var, _) = self.expect_ident("a loop variable name")?;
        self.expect(TokenKind::In, "'in'")?;
        let iterable = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            var,
            iterable,
            body,
            span,
        })
    }

    // --- expressions --------------------------------------------------------

    fn parse_expr(&mut self) -> CompileResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> CompileResult<Expr> {
        let expr = self.parse_or()?;
        if self.check(&TokenKind::Eq) {
            let span = self.bump().span;
            let value = self.parse_assignment()?;
            let target = Self::expr_to_assign_target(expr)?;
            return Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
                span,
            });
        }
        Ok(expr)
    }

    fn expr_to_assign_target(expr: Expr) -> CompileResult<AssignTarget> {
        match expr {
            Expr::Ident(name, span) => Ok(AssignTarget::Ident(name, span)),
            Expr::Index { container, index, span } => Ok(AssignTarget::Index {
                container: *container,
                index: *index,
                span,
            }),
            Expr::Property { object, name, span } => Ok(AssignTarget::Property {
                object: *object,
                name,
                span,
            }),
            other => Err(CompileError::parse("invalid assignment target", other.span())),
        }
    }

    fn parse_or(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            let span = self.bump().span;
            let rhs = self.parse_and()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.check(&TokenKind::AndAnd) {
            let span = self.bump().span;
            let rhs = self.parse_equality()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            let span = self.bump().span;
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            let span = self.bump().span;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let span = self.bump().span;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let span = self.bump().span;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> CompileResult<Expr> {
        match self.peek() {
            TokenKind::Minus => {
                let span = self.bump().span;
                let expr = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                    span,
                })
            }
            TokenKind::Bang => {
                let span = self.bump().span;
                let expr = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                    span,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> CompileResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    let span = self.bump().span;
                    let mut args = Vec::new();
                    while !self.check(&TokenKind::RParen) {
                        args.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span,
                    };
                }
                TokenKind::LBracket => {
                    let span = self.bump().span;
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index {
                        container: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                TokenKind::Dot => {
                    let span = self.bump().span;
                    let (name, _) = self.expect_ident("a property name")?;
                    expr = Expr::Property {
                        object: Box::new(expr),
                        name,
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> CompileResult<Expr> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Int(v) => {
                self.bump();
                Ok(Expr::Int(v, span))
            }
            TokenKind::Str(s) => {
                self.bump();
                Ok(Expr::Str(s, span))
            }
            TokenKind::True => {
                self.bump();
                Ok(Expr::Bool(true, span))
            }
            TokenKind::False => {
                self.bump();
                Ok(Expr::Bool(false, span))
            }
            TokenKind::NoneLit => {
                self.bump();
                Ok(Expr::None(span))
            }
            TokenKind::Ident(name) => {
                self.bump();
                Ok(Expr::Ident(name, span))
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.bump();
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    elements.push(self.parse_expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(Expr::ArrayLit { elements, span })
            }
            TokenKind::LBrace => {
                self.bump();
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let (key, _) = match self.peek().clone() {
                        TokenKind::Ident(name) => {
                            self.bump();
                            (name, span)
                        }
                        TokenKind::Str(s) => {
                            self.bump();
                            (s, span)
                        }
                        other => {
                            return Err(CompileError::parse(
                                format!("expected an object key, found {other:?}"),
                                self.peek_span(),
                            ))
                        }
                    };
                    self.expect(TokenKind::Colon, "':'")?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "'}'")?;
                Ok(Expr::ObjectLit { entries, span })
            }
            other => Err(CompileError::parse(format!("unexpected token {other:?}"), span)),
        }
    }
}
