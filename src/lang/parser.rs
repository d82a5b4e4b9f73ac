//! Recursive-descent parser for Rill.
//!
//! Two entry points mirror the host compile modes the REPL relies on:
//! [`parse_expression`] accepts a single expression and nothing else,
//! [`parse_program`] accepts a statement sequence. The REPL tries the
//! expression form first and falls back to the program form on a
//! syntax error; that tie-break decides whether a result is displayed.

use super::ast::{BinOp, Block, Expr, ExprKind, Program, Stmt, Target, UnaryOp};
use super::lexer::{tokenize, LexError};
use super::token::{Token, TokenKind};

/// Syntax error with a 1-based source position.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} (line {line}, column {col})")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub col: u32,
}

impl ParseError {
    fn new(message: impl Into<String>, line: u32, col: u32) -> Self {
        Self {
            message: message.into(),
            line,
            col,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::new(err.to_string(), err.line(), err.col().unwrap_or(1))
    }
}

/// Parse a single expression; trailing newlines are allowed, anything
/// else is a syntax error.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    parser.skip_newlines();
    let expr = parser.expression()?;
    parser.skip_newlines();
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse a statement sequence.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let mut body = Vec::new();
    loop {
        parser.skip_newlines();
        if parser.at_eof() {
            break;
        }
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek();
            Err(ParseError::new(
                format!("expected {}, found {}", kind.describe(), tok.kind.describe()),
                tok.line,
                tok.col,
            ))
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.at_eof() {
            Ok(())
        } else {
            let tok = self.peek();
            Err(ParseError::new(
                format!("unexpected {}", tok.kind.describe()),
                tok.line,
                tok.col,
            ))
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.advance();
        }
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().kind {
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Fn => self.fn_definition(),
            _ => {
                let stmt = self.simple_statement()?;
                self.end_of_statement()?;
                Ok(stmt)
            }
        }
    }

    /// Statements without a suite; used on their own line and in
    /// one-line suites (`while ready: pass`).
    fn simple_statement(&mut self) -> Result<Stmt, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Return => {
                self.advance();
                let value = if self.statement_ends_here() {
                    None
                } else {
                    Some(self.expression()?)
                };
                Ok(Stmt::Return {
                    value,
                    line: tok.line,
                })
            }
            TokenKind::Pass => {
                self.advance();
                Ok(Stmt::Pass { line: tok.line })
            }
            _ => {
                let expr = self.expression()?;
                if self.eat(&TokenKind::Eq) {
                    let target = match expr.kind {
                        ExprKind::Var(name) => Target::Var(name),
                        ExprKind::Index { object, index } => Target::Index {
                            object: *object,
                            index: *index,
                        },
                        _ => {
                            return Err(ParseError::new(
                                "cannot assign to this expression",
                                expr.line,
                                1,
                            ))
                        }
                    };
                    let value = self.expression()?;
                    Ok(Stmt::Assign {
                        target,
                        value,
                        line: tok.line,
                    })
                } else {
                    Ok(Stmt::Expr(expr))
                }
            }
        }
    }

    fn statement_ends_here(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent
        )
    }

    fn end_of_statement(&mut self) -> Result<(), ParseError> {
        if self.eat(&TokenKind::Newline) || self.at_eof() || self.check(&TokenKind::Dedent) {
            Ok(())
        } else {
            let tok = self.peek();
            Err(ParseError::new(
                format!("unexpected {} after statement", tok.kind.describe()),
                tok.line,
                tok.col,
            ))
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.peek().line;
        self.expect(&TokenKind::If)?;
        let cond = self.expression()?;
        let body = self.suite()?;
        let mut arms = vec![(cond, body)];
        let mut else_body = None;
        loop {
            if self.check(&TokenKind::Elif) {
                self.advance();
                let cond = self.expression()?;
                let body = self.suite()?;
                arms.push((cond, body));
            } else if self.check(&TokenKind::Else) {
                self.advance();
                else_body = Some(self.suite()?);
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If {
            arms,
            else_body,
            line,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.peek().line;
        self.expect(&TokenKind::While)?;
        let cond = self.expression()?;
        let body = self.suite()?;
        Ok(Stmt::While { cond, body, line })
    }

    fn fn_definition(&mut self) -> Result<Stmt, ParseError> {
        let line = self.peek().line;
        self.expect(&TokenKind::Fn)?;
        let name = self.identifier()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.identifier()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.suite()?;
        Ok(Stmt::FnDef {
            name,
            params,
            body,
            line,
        })
    }

    /// `':' NEWLINE INDENT stmt+ DEDENT`, or a one-line suite with a
    /// single simple statement after the colon.
    fn suite(&mut self) -> Result<Block, ParseError> {
        self.expect(&TokenKind::Colon)?;
        if self.eat(&TokenKind::Newline) {
            self.expect(&TokenKind::Indent)?;
            let mut body = Vec::new();
            loop {
                self.skip_newlines();
                if self.eat(&TokenKind::Dedent) || self.at_eof() {
                    break;
                }
                body.push(self.statement()?);
            }
            if body.is_empty() {
                let tok = self.peek();
                return Err(ParseError::new("expected an indented block", tok.line, tok.col));
            }
            Ok(body)
        } else {
            let stmt = self.simple_statement()?;
            self.end_of_statement()?;
            Ok(vec![stmt])
        }
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        let tok = self.peek().clone();
        if let TokenKind::Ident(name) = tok.kind {
            self.advance();
            Ok(name)
        } else {
            Err(ParseError::new(
                format!("expected identifier, found {}", tok.kind.describe()),
                tok.line,
                tok.col,
            ))
        }
    }

    // ---- expressions, loosest binding first ----

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.check(&TokenKind::Or) {
            let line = self.advance().line;
            let rhs = self.and_expr()?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op: BinOp::Or,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                line,
            );
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.not_expr()?;
        while self.check(&TokenKind::And) {
            let line = self.advance().line;
            let rhs = self.not_expr()?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op: BinOp::And,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                line,
            );
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Not) {
            let line = self.advance().line;
            let operand = self.not_expr()?;
            Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                line,
            ))
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.arith()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::NotEq,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::LtEq => BinOp::LtEq,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::GtEq => BinOp::GtEq,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.arith()?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                line,
            );
        }
        Ok(lhs)
    }

    fn arith(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.term()?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                line,
            );
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.unary()?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                line,
            );
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().kind {
            TokenKind::Minus => {
                let line = self.advance().line;
                let operand = self.unary()?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                    line,
                ))
            }
            TokenKind::Await => {
                let line = self.advance().line;
                let operand = self.unary()?;
                Ok(Expr::new(ExprKind::Await(Box::new(operand)), line))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.check(&TokenKind::LParen) {
                let line = self.advance().line;
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen)?;
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    line,
                );
            } else if self.check(&TokenKind::LBracket) {
                let line = self.advance().line;
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket)?;
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        let expr = match tok.kind {
            TokenKind::Nil => {
                self.advance();
                Expr::new(ExprKind::Nil, tok.line)
            }
            TokenKind::True => {
                self.advance();
                Expr::new(ExprKind::Bool(true), tok.line)
            }
            TokenKind::False => {
                self.advance();
                Expr::new(ExprKind::Bool(false), tok.line)
            }
            TokenKind::Int(v) => {
                self.advance();
                Expr::new(ExprKind::Int(v), tok.line)
            }
            TokenKind::Float(v) => {
                self.advance();
                Expr::new(ExprKind::Float(v), tok.line)
            }
            TokenKind::Str(ref s) => {
                let s = s.clone();
                self.advance();
                Expr::new(ExprKind::Str(s), tok.line)
            }
            TokenKind::Ident(ref name) => {
                let name = name.clone();
                self.advance();
                Expr::new(ExprKind::Var(name), tok.line)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                inner
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        items.push(self.expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                        // trailing comma
                        if self.check(&TokenKind::RBracket) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                Expr::new(ExprKind::List(items), tok.line)
            }
            _ => {
                return Err(ParseError::new(
                    format!("unexpected {}", tok.kind.describe()),
                    tok.line,
                    tok.col,
                ))
            }
        };
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ast::has_top_level_await;

    #[test]
    fn parses_expression() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert!(matches!(
            expr.kind,
            ExprKind::Binary { op: BinOp::Add, .. }
        ));
    }

    #[test]
    fn assignment_is_not_an_expression() {
        assert!(parse_expression("x = 5").is_err());
        assert!(parse_program("x = 5").is_ok());
    }

    #[test]
    fn parses_if_elif_else() {
        let program = parse_program("if x:\n    y = 1\nelif z:\n    y = 2\nelse:\n    y = 3").unwrap();
        match &program.body[0] {
            Stmt::If {
                arms, else_body, ..
            } => {
                assert_eq!(arms.len(), 2);
                assert!(else_body.is_some());
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parses_one_line_suite() {
        let program = parse_program("while true: pass").unwrap();
        assert!(matches!(program.body[0], Stmt::While { .. }));
    }

    #[test]
    fn parses_fn_definition() {
        let program = parse_program("fn add(a, b):\n    return a + b").unwrap();
        match &program.body[0] {
            Stmt::FnDef { name, params, .. } => {
                assert_eq!(name, "add");
                assert_eq!(params, &["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected fn def, got {other:?}"),
        }
    }

    #[test]
    fn top_level_await_detection() {
        let program = parse_program("await sleep(1)").unwrap();
        assert!(has_top_level_await(&program.body));

        let program = parse_program("fn f():\n    return await sleep(1)").unwrap();
        assert!(!has_top_level_await(&program.body));

        let program = parse_program("while true:\n    await sleep(1)").unwrap();
        assert!(has_top_level_await(&program.body));
    }

    #[test]
    fn syntax_error_carries_position() {
        let err = parse_program("x = ").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.col >= 1);
    }

    #[test]
    fn trailing_newlines_accepted_in_expression_mode() {
        assert!(parse_expression("x\n").is_ok());
    }

    #[test]
    fn two_statements_rejected_in_expression_mode() {
        assert!(parse_expression("x\ny").is_err());
    }
}
