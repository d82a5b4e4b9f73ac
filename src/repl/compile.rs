//! Compiler adapter over the host parser.
//!
//! The engine compiles each submitted block in one of two modes:
//! expression (produces a displayable value) or program (statement
//! sequence, side effects only). The adapter passes its flags
//! explicitly on every call; interactively typed code never inherits
//! compile-time state from the embedding program.

use std::sync::Arc;

use crate::lang::ast::{self, Expr, Program, Stmt};
use crate::lang::eval::{EvalError, InterruptFlag};
use crate::lang::parser::{self, ParseError};
use crate::lang::{Evaluator, Value};
use crate::repl::namespace::Namespace;

/// Compile mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A single expression.
    Expression,
    /// A statement sequence.
    Program,
}

/// Structured syntax failure with a 1-based position; column defaults
/// to 1 when the parser reports none.
#[derive(Debug, Clone, thiserror::Error)]
#[error("syntax error: {message} (line {line}, column {column})")]
pub struct SyntaxError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl From<ParseError> for SyntaxError {
    fn from(err: ParseError) -> Self {
        Self {
            message: err.message,
            line: err.line.max(1),
            column: err.col.max(1),
        }
    }
}

/// Compile failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    /// Malformed source; the engine may fall back from expression to
    /// program mode on this variant only.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// Hard failure, surfaced immediately without fallback.
    #[error("source contains a NUL byte")]
    NulByte,
}

/// Compiled form of one unit.
#[derive(Debug, Clone)]
enum UnitBody {
    Expr(Arc<Expr>),
    Program(Arc<Program>),
}

/// An inert compiled unit: the parsed block, its mode, the source
/// label its frames will carry, and whether it contains a top-level
/// suspension point and therefore must run under the scheduler.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    body: UnitBody,
    pub label: String,
    pub has_top_level_await: bool,
}

impl CompiledUnit {
    pub fn mode(&self) -> Mode {
        match self.body {
            UnitBody::Expr(_) => Mode::Expression,
            UnitBody::Program(_) => Mode::Program,
        }
    }

    /// Run the unit against the namespace. Program-mode units yield
    /// `Value::Nil`.
    pub fn run(&self, namespace: &Namespace, interrupt: InterruptFlag) -> Result<Value, EvalError> {
        let mut evaluator = Evaluator::new(
            namespace.globals(),
            namespace.locals(),
            interrupt,
            self.label.as_str(),
        );
        match &self.body {
            UnitBody::Expr(expr) => evaluator.run_expression(expr),
            UnitBody::Program(program) => {
                evaluator.run_program(program)?;
                Ok(Value::Nil)
            }
        }
    }
}

/// Compile `source` under `mode`.
///
/// When `allow_top_level_await` is false, a unit containing a
/// top-level `await` is itself a syntax failure; when true, the unit
/// comes back flagged for the scheduler.
pub fn compile(
    source: &str,
    mode: Mode,
    allow_top_level_await: bool,
    label: &str,
) -> Result<CompiledUnit, CompileError> {
    if source.contains('\0') {
        return Err(CompileError::NulByte);
    }

    let (body, has_await, line) = match mode {
        Mode::Expression => {
            let expr = parser::parse_expression(source).map_err(SyntaxError::from)?;
            let line = expr.line;
            // Reuse the statement-level walk for the await scan.
            let probe = [Stmt::Expr(expr.clone())];
            let has_await = ast::has_top_level_await(&probe);
            (UnitBody::Expr(Arc::new(expr)), has_await, line)
        }
        Mode::Program => {
            let program = parser::parse_program(source).map_err(SyntaxError::from)?;
            let has_await = ast::has_top_level_await(&program.body);
            let line = program.body.first().map_or(1, Stmt::line);
            (UnitBody::Program(Arc::new(program)), has_await, line)
        }
    };

    if has_await && !allow_top_level_await {
        return Err(CompileError::Syntax(SyntaxError {
            message: "top-level await is not enabled".to_string(),
            line,
            column: 1,
        }));
    }

    Ok(CompiledUnit {
        body,
        label: label.to_string(),
        has_top_level_await: has_await,
    })
}
