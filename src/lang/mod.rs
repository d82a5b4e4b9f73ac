//! The Rill host language.
//!
//! A minimal dynamic scripting language: hand-written lexer with
//! indentation-based blocks, recursive-descent parser, and a
//! tree-walking evaluator over a shared namespace. The REPL engine in
//! [`crate::repl`] drives it one submitted block at a time; nothing in
//! this module knows about prompts, outcomes, or rendering.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod value;

pub use ast::{Expr, ExprKind, Program, Stmt};
pub use eval::{EvalError, Evaluator, Frame, InterruptFlag, RuntimeError};
pub use lexer::LexError;
pub use parser::ParseError;
pub use value::{TaskHandle, TaskState, Value};
