//! Abstract syntax tree for Rill.
//!
//! Every node carries the 1-based source line it started on; the
//! evaluator threads those lines into traceback frames.

/// A parsed statement sequence (the body of a module, suite, or
/// function).
pub type Block = Vec<Stmt>;

/// A complete parsed program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Block,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: u32,
}

impl Expr {
    pub fn new(kind: ExprKind, line: u32) -> Self {
        Self { kind, line }
    }
}

/// Expression kind
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Expr>),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Await(Box<Expr>),
}

/// Assignment target
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// `name = ...`
    Var(String),
    /// `obj[index] = ...`
    Index { object: Expr, index: Expr },
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        target: Target,
        value: Expr,
        line: u32,
    },
    If {
        /// `(condition, suite)` pairs: the `if` arm then any `elif` arms.
        arms: Vec<(Expr, Block)>,
        else_body: Option<Block>,
        line: u32,
    },
    While {
        cond: Expr,
        body: Block,
        line: u32,
    },
    FnDef {
        name: String,
        params: Vec<String>,
        body: Block,
        line: u32,
    },
    Return {
        value: Option<Expr>,
        line: u32,
    },
    Pass {
        line: u32,
    },
}

impl Stmt {
    /// Line the statement starts on.
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Expr(e) => e.line,
            Stmt::Assign { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::FnDef { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::Pass { line } => *line,
        }
    }
}

/// True when the program contains an `await` outside any `fn` body.
///
/// This is the suspension-point test the REPL uses to decide between
/// direct evaluation and handing the unit to the scheduler. `await`
/// inside a function definition does not count; the function only
/// suspends when called, and by then it runs inside whatever context
/// invoked it.
pub fn has_top_level_await(body: &[Stmt]) -> bool {
    body.iter().any(stmt_awaits)
}

fn stmt_awaits(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(e) => expr_awaits(e),
        Stmt::Assign { target, value, .. } => {
            let target_awaits = match target {
                Target::Var(_) => false,
                Target::Index { object, index } => expr_awaits(object) || expr_awaits(index),
            };
            target_awaits || expr_awaits(value)
        }
        Stmt::If {
            arms, else_body, ..
        } => {
            arms.iter()
                .any(|(cond, suite)| expr_awaits(cond) || has_top_level_await(suite))
                || else_body.as_deref().is_some_and(has_top_level_await)
        }
        Stmt::While { cond, body, .. } => expr_awaits(cond) || has_top_level_await(body),
        Stmt::FnDef { .. } => false,
        Stmt::Return { value, .. } => value.as_ref().is_some_and(expr_awaits),
        Stmt::Pass { .. } => false,
    }
}

fn expr_awaits(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Await(_) => true,
        ExprKind::Nil
        | ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::Var(_) => false,
        ExprKind::List(items) => items.iter().any(expr_awaits),
        ExprKind::Unary { operand, .. } => expr_awaits(operand),
        ExprKind::Binary { lhs, rhs, .. } => expr_awaits(lhs) || expr_awaits(rhs),
        ExprKind::Call { callee, args } => expr_awaits(callee) || args.iter().any(expr_awaits),
        ExprKind::Index { object, index } => expr_awaits(object) || expr_awaits(index),
    }
}
