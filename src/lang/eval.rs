//! Tree-walking evaluator for Rill.
//!
//! The evaluator runs one compiled unit against a pair of shared
//! namespace maps (globals and locals, which may be the same map). It
//! maintains a frame stack for tracebacks, polls an interrupt flag at
//! loop back-edges and call sites, and implements `await` by polling a
//! task's completion slot so interrupts stay responsive while waiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::ast::{BinOp, Block, Expr, ExprKind, Program, Stmt, Target, UnaryOp};
use super::value::{FuncDef, TaskState, Value};

/// Shared namespace map. Locked per access, never across a call.
pub type SharedMap = Arc<Mutex<IndexMap<String, Value>>>;

/// Interrupt delivery flag, set by the REPL's interrupt channel and
/// polled by the evaluator.
pub type InterruptFlag = Arc<AtomicBool>;

/// Maximum user-function call depth.
const MAX_CALL_DEPTH: usize = 100;

/// How long `await` and `sleep` block between interrupt checks.
const POLL_SLICE: Duration = Duration::from_millis(10);

/// One traceback frame, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Function name, `<module>` for top-level code.
    pub name: String,
    /// Source label the frame's code was compiled under.
    pub source: String,
    /// Line currently executing in this frame.
    pub line: u32,
}

/// A raised Rill exception: classification, message, and the call
/// stack at the point of raising.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: String,
    pub message: String,
    pub frames: Vec<Frame>,
}

impl RuntimeError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            frames: Vec::new(),
        }
    }

    /// One-line summary, as shown under a traceback.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.kind, self.message)
    }
}

/// Evaluation failure: either a Rill exception or a delivered
/// interrupt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Raised(RuntimeError),
    #[error("interrupted")]
    Interrupted,
}

/// Statement-level control flow inside a unit.
enum Exec {
    Normal,
    Return(Value),
}

/// Names callable without a namespace binding.
const BUILTINS: &[&str] = &[
    "print", "len", "repr", "str", "int", "abs", "type", "range", "sleep",
];

/// The evaluator. One instance runs one unit; state is the frame
/// stack plus per-call local scopes.
pub struct Evaluator {
    globals: SharedMap,
    locals: SharedMap,
    interrupt: InterruptFlag,
    source: String,
    frames: Vec<Frame>,
    call_scopes: Vec<IndexMap<String, Value>>,
}

impl Evaluator {
    pub fn new(
        globals: SharedMap,
        locals: SharedMap,
        interrupt: InterruptFlag,
        source: impl Into<String>,
    ) -> Self {
        Self {
            globals,
            locals,
            interrupt,
            source: source.into(),
            frames: Vec::new(),
            call_scopes: Vec::new(),
        }
    }

    /// Run a program for its side effects.
    pub fn run_program(&mut self, program: &Program) -> Result<(), EvalError> {
        self.push_module_frame(program.body.first().map_or(1, Stmt::line));
        let result = self.exec_block(&program.body);
        self.frames.pop();
        match result? {
            Exec::Normal => Ok(()),
            Exec::Return(_) => Err(self.raise_no_line("SyntaxError", "'return' outside function")),
        }
    }

    /// Evaluate a single expression to a value.
    pub fn run_expression(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        self.push_module_frame(expr.line);
        let result = self.eval(expr);
        self.frames.pop();
        result
    }

    fn push_module_frame(&mut self, line: u32) {
        self.frames.push(Frame {
            name: "<module>".to_string(),
            source: self.source.clone(),
            line,
        });
    }

    // ---- statements ----

    fn exec_block(&mut self, block: &Block) -> Result<Exec, EvalError> {
        for stmt in block {
            self.check_interrupt()?;
            match self.exec_stmt(stmt)? {
                Exec::Normal => {}
                ret => return Ok(ret),
            }
        }
        Ok(Exec::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Exec, EvalError> {
        self.set_line(stmt.line());
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(Exec::Normal)
            }
            Stmt::Assign { target, value, .. } => {
                let value = self.eval(value)?;
                match target {
                    Target::Var(name) => self.assign(name, value),
                    Target::Index { object, index } => {
                        let object_val = self.eval(object)?;
                        let index_val = self.eval(index)?;
                        self.assign_index(object, &object_val, &index_val, value)?;
                    }
                }
                Ok(Exec::Normal)
            }
            Stmt::If {
                arms, else_body, ..
            } => {
                for (cond, suite) in arms {
                    if self.eval(cond)?.is_truthy() {
                        return self.exec_block(suite);
                    }
                }
                if let Some(suite) = else_body {
                    return self.exec_block(suite);
                }
                Ok(Exec::Normal)
            }
            Stmt::While { cond, body, .. } => {
                while self.eval(cond)?.is_truthy() {
                    self.check_interrupt()?;
                    match self.exec_block(body)? {
                        Exec::Normal => {}
                        ret => return Ok(ret),
                    }
                }
                Ok(Exec::Normal)
            }
            Stmt::FnDef {
                name,
                params,
                body,
                line,
            } => {
                let def = FuncDef {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    source: self.source.clone(),
                    line: *line,
                };
                self.assign(name, Value::Func(Arc::new(def)));
                Ok(Exec::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Nil,
                };
                Ok(Exec::Return(value))
            }
            Stmt::Pass { .. } => Ok(Exec::Normal),
        }
    }

    // ---- expressions ----

    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(i) => Ok(Value::Int(*i)),
            ExprKind::Float(f) => Ok(Value::Float(*f)),
            ExprKind::Str(s) => Ok(Value::str(s.as_str())),
            ExprKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::list(values))
            }
            ExprKind::Var(name) => self.resolve(name, expr.line),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                self.eval_unary(*op, value, expr.line)
            }
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, expr.line),
            ExprKind::Call { callee, args } => self.eval_call(callee, args, expr.line),
            ExprKind::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                self.eval_index(&object, &index, expr.line)
            }
            ExprKind::Await(operand) => {
                let value = self.eval(operand)?;
                self.eval_await(value, expr.line)
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, value: Value, line: u32) -> Result<Value, EvalError> {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOp::Neg => match value {
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(self.raise(
                    line,
                    "TypeError",
                    format!("cannot negate {}", other.type_name()),
                )),
            },
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        line: u32,
    ) -> Result<Value, EvalError> {
        // `and`/`or` short-circuit and yield an operand, not a bool.
        if matches!(op, BinOp::And | BinOp::Or) {
            let left = self.eval(lhs)?;
            return match op {
                BinOp::And if !left.is_truthy() => Ok(left),
                BinOp::Or if left.is_truthy() => Ok(left),
                _ => self.eval(rhs),
            };
        }

        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;
        match op {
            BinOp::Eq => Ok(Value::Bool(left == right)),
            BinOp::NotEq => Ok(Value::Bool(left != right)),
            BinOp::Add => self.eval_add(left, right, line),
            BinOp::Sub => self.numeric_op(left, right, line, "-", |a, b| a - b, |a, b| a.checked_sub(b)),
            BinOp::Mul => self.numeric_op(left, right, line, "*", |a, b| a * b, |a, b| a.checked_mul(b)),
            BinOp::Div => self.eval_div(left, right, line, false),
            BinOp::Mod => self.eval_div(left, right, line, true),
            BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
                self.eval_ordering(op, left, right, line)
            }
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_add(&mut self, left: Value, right: Value, line: u32) -> Result<Value, EvalError> {
        match (&left, &right) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut items = a.lock().clone();
                items.extend(b.lock().iter().cloned());
                Ok(Value::list(items))
            }
            _ => self.numeric_op(left, right, line, "+", |a, b| a + b, |a, b| a.checked_add(b)),
        }
    }

    fn numeric_op(
        &mut self,
        left: Value,
        right: Value,
        line: u32,
        symbol: &str,
        float_op: impl Fn(f64, f64) -> f64,
        int_op: impl Fn(i64, i64) -> Option<i64>,
    ) -> Result<Value, EvalError> {
        match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => match int_op(*a, *b) {
                Some(v) => Ok(Value::Int(v)),
                None => Err(self.raise(line, "OverflowError", "integer overflow")),
            },
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(float_op(*a as f64, *b))),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(float_op(*a, *b as f64))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(*a, *b))),
            _ => Err(self.raise(
                line,
                "TypeError",
                format!(
                    "unsupported operand types for {}: {} and {}",
                    symbol,
                    left.type_name(),
                    right.type_name()
                ),
            )),
        }
    }

    fn eval_div(
        &mut self,
        left: Value,
        right: Value,
        line: u32,
        modulo: bool,
    ) -> Result<Value, EvalError> {
        let zero = match &right {
            Value::Int(0) => true,
            Value::Float(f) => *f == 0.0,
            _ => false,
        };
        if zero && matches!(right, Value::Int(_) | Value::Float(_)) {
            let what = if modulo { "modulo by zero" } else { "division by zero" };
            return Err(self.raise(line, "DivisionError", what));
        }
        if modulo {
            self.numeric_op(left, right, line, "%", |a, b| a % b, |a, b| a.checked_rem(b))
        } else {
            self.numeric_op(left, right, line, "/", |a, b| a / b, |a, b| a.checked_div(b))
        }
    }

    fn eval_ordering(
        &mut self,
        op: BinOp,
        left: Value,
        right: Value,
        line: u32,
    ) -> Result<Value, EvalError> {
        let ord = match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        };
        let Some(ord) = ord else {
            return Err(self.raise(
                line,
                "TypeError",
                format!(
                    "cannot compare {} and {}",
                    left.type_name(),
                    right.type_name()
                ),
            ));
        };
        let result = match op {
            BinOp::Lt => ord.is_lt(),
            BinOp::LtEq => ord.is_le(),
            BinOp::Gt => ord.is_gt(),
            BinOp::GtEq => ord.is_ge(),
            _ => unreachable!(),
        };
        Ok(Value::Bool(result))
    }

    fn eval_index(&mut self, object: &Value, index: &Value, line: u32) -> Result<Value, EvalError> {
        match (object, index) {
            (Value::List(items), Value::Int(i)) => {
                let items = items.lock();
                let idx = normalize_index(*i, items.len());
                match idx.and_then(|i| items.get(i)) {
                    Some(v) => Ok(v.clone()),
                    None => Err(self.raise(line, "IndexError", "list index out of range")),
                }
            }
            (Value::Str(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                let idx = normalize_index(*i, chars.len());
                match idx.and_then(|i| chars.get(i)) {
                    Some(c) => Ok(Value::str(c.to_string())),
                    None => Err(self.raise(line, "IndexError", "string index out of range")),
                }
            }
            _ => Err(self.raise(
                line,
                "TypeError",
                format!(
                    "cannot index {} with {}",
                    object.type_name(),
                    index.type_name()
                ),
            )),
        }
    }

    fn assign_index(
        &mut self,
        object_expr: &Expr,
        object: &Value,
        index: &Value,
        value: Value,
    ) -> Result<(), EvalError> {
        match (object, index) {
            (Value::List(items), Value::Int(i)) => {
                let mut items = items.lock();
                let len = items.len();
                match normalize_index(*i, len) {
                    Some(idx) if idx < len => {
                        items[idx] = value;
                        Ok(())
                    }
                    _ => Err(self.raise(
                        object_expr.line,
                        "IndexError",
                        "list assignment index out of range",
                    )),
                }
            }
            _ => Err(self.raise(
                object_expr.line,
                "TypeError",
                format!("cannot assign into {}", object.type_name()),
            )),
        }
    }

    fn eval_await(&mut self, value: Value, line: u32) -> Result<Value, EvalError> {
        match value {
            Value::Task(handle) => loop {
                match handle.slot.wait_timeout(POLL_SLICE) {
                    TaskState::Running => self.check_interrupt()?,
                    TaskState::Done(v) => return Ok(v),
                    TaskState::Failed(message) => {
                        return Err(self.raise(line, "TaskError", message))
                    }
                }
            },
            // Awaiting anything already resolved yields it unchanged,
            // so `await f()` works whether or not f hands back a task.
            other => Ok(other),
        }
    }

    // ---- calls ----

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        line: u32,
    ) -> Result<Value, EvalError> {
        self.check_interrupt()?;
        self.set_line(line);

        // Builtins are reachable by bare name unless shadowed.
        if let ExprKind::Var(name) = &callee.kind {
            if self.lookup(name).is_none() && BUILTINS.contains(&name.as_str()) {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                return self.call_builtin(name, values, line);
            }
        }

        let callee_val = self.eval(callee)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }

        let Value::Func(def) = callee_val else {
            return Err(self.raise(
                line,
                "TypeError",
                format!("{} is not callable", callee_val.type_name()),
            ));
        };
        if values.len() != def.params.len() {
            return Err(self.raise(
                line,
                "TypeError",
                format!(
                    "{}() takes {} argument(s), got {}",
                    def.name,
                    def.params.len(),
                    values.len()
                ),
            ));
        }
        if self.call_scopes.len() >= MAX_CALL_DEPTH {
            return Err(self.raise(line, "RecursionError", "maximum call depth exceeded"));
        }

        let mut scope = IndexMap::new();
        for (param, value) in def.params.iter().zip(values) {
            scope.insert(param.clone(), value);
        }
        self.call_scopes.push(scope);
        self.frames.push(Frame {
            name: def.name.clone(),
            source: def.source.clone(),
            line: def.line,
        });

        let result = self.exec_block(&def.body);

        self.frames.pop();
        self.call_scopes.pop();

        match result? {
            Exec::Return(value) => Ok(value),
            Exec::Normal => Ok(Value::Nil),
        }
    }

    fn call_builtin(
        &mut self,
        name: &str,
        args: Vec<Value>,
        line: u32,
    ) -> Result<Value, EvalError> {
        match (name, args.as_slice()) {
            ("print", _) => {
                let parts: Vec<String> = args.iter().map(Value::to_string).collect();
                println!("{}", parts.join(" "));
                Ok(Value::Nil)
            }
            ("len", [Value::Str(s)]) => Ok(Value::Int(s.chars().count() as i64)),
            ("len", [Value::List(items)]) => Ok(Value::Int(items.lock().len() as i64)),
            ("repr", [v]) => Ok(Value::str(v.repr())),
            ("str", [v]) => Ok(Value::str(v.to_string())),
            ("int", [Value::Int(i)]) => Ok(Value::Int(*i)),
            ("int", [Value::Float(f)]) => Ok(Value::Int(*f as i64)),
            ("int", [Value::Str(s)]) => match s.trim().parse::<i64>() {
                Ok(i) => Ok(Value::Int(i)),
                Err(_) => Err(self.raise(
                    line,
                    "ValueError",
                    format!("invalid integer literal: {s:?}"),
                )),
            },
            ("abs", [Value::Int(i)]) => Ok(Value::Int(i.abs())),
            ("abs", [Value::Float(f)]) => Ok(Value::Float(f.abs())),
            ("type", [v]) => Ok(Value::str(v.type_name())),
            ("range", [Value::Int(n)]) => {
                Ok(Value::list((0..*n).map(Value::Int).collect()))
            }
            ("range", [Value::Int(a), Value::Int(b)]) => {
                Ok(Value::list((*a..*b).map(Value::Int).collect()))
            }
            ("sleep", [v @ (Value::Int(_) | Value::Float(_))]) => {
                let secs = match v {
                    Value::Int(i) => *i as f64,
                    Value::Float(f) => *f,
                    _ => unreachable!(),
                };
                self.sleep(secs, line)
            }
            _ => Err(self.raise(
                line,
                "TypeError",
                format!("invalid arguments for {name}()"),
            )),
        }
    }

    /// Sleep in slices so a delivered interrupt lands promptly.
    fn sleep(&mut self, secs: f64, line: u32) -> Result<Value, EvalError> {
        if secs < 0.0 {
            return Err(self.raise(line, "ValueError", "sleep duration must be non-negative"));
        }
        let deadline = std::time::Instant::now() + Duration::from_secs_f64(secs);
        loop {
            self.check_interrupt()?;
            let now = std::time::Instant::now();
            if now >= deadline {
                return Ok(Value::Nil);
            }
            std::thread::sleep(POLL_SLICE.min(deadline - now));
        }
    }

    // ---- namespace access ----

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(scope) = self.call_scopes.last() {
            if let Some(v) = scope.get(name) {
                return Some(v.clone());
            }
        } else if let Some(v) = self.locals.lock().get(name) {
            return Some(v.clone());
        }
        if !Arc::ptr_eq(&self.globals, &self.locals) || self.call_scopes.last().is_some() {
            if let Some(v) = self.globals.lock().get(name) {
                return Some(v.clone());
            }
        }
        None
    }

    fn resolve(&mut self, name: &str, line: u32) -> Result<Value, EvalError> {
        match self.lookup(name) {
            Some(v) => Ok(v),
            None => Err(self.raise(
                line,
                "NameError",
                format!("name '{name}' is not defined"),
            )),
        }
    }

    fn assign(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.call_scopes.last_mut() {
            scope.insert(name.to_string(), value);
        } else {
            self.locals.lock().insert(name.to_string(), value);
        }
    }

    // ---- error and interrupt plumbing ----

    fn check_interrupt(&mut self) -> Result<(), EvalError> {
        if self.interrupt.load(Ordering::Relaxed) {
            Err(EvalError::Interrupted)
        } else {
            Ok(())
        }
    }

    fn set_line(&mut self, line: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.line = line;
        }
    }

    fn raise(&mut self, line: u32, kind: &str, message: impl Into<String>) -> EvalError {
        self.set_line(line);
        self.capture(kind, message)
    }

    fn raise_no_line(&mut self, kind: &str, message: impl Into<String>) -> EvalError {
        self.capture(kind, message)
    }

    fn capture(&self, kind: &str, message: impl Into<String>) -> EvalError {
        EvalError::Raised(RuntimeError {
            kind: kind.to_string(),
            message: message.into(),
            frames: self.frames.clone(),
        })
    }
}

/// Map a possibly negative index onto `0..len`.
fn normalize_index(i: i64, len: usize) -> Option<usize> {
    if i >= 0 {
        Some(i as usize)
    } else {
        let from_end = i.unsigned_abs() as usize;
        len.checked_sub(from_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parser::{parse_expression, parse_program};
    use crate::lang::value::TaskHandle;

    fn shared() -> SharedMap {
        Arc::new(Mutex::new(IndexMap::new()))
    }

    fn evaluator(globals: &SharedMap) -> Evaluator {
        Evaluator::new(
            globals.clone(),
            globals.clone(),
            InterruptFlag::default(),
            "<test>",
        )
    }

    fn eval_str(globals: &SharedMap, source: &str) -> Result<Value, EvalError> {
        let expr = parse_expression(source).unwrap();
        evaluator(globals).run_expression(&expr)
    }

    fn exec_str(globals: &SharedMap, source: &str) -> Result<(), EvalError> {
        let program = parse_program(source).unwrap();
        evaluator(globals).run_program(&program)
    }

    #[test]
    fn arithmetic_and_precedence() {
        let ns = shared();
        assert_eq!(eval_str(&ns, "1 + 2 * 3").unwrap(), Value::Int(7));
        assert_eq!(eval_str(&ns, "(1 + 2) * 3").unwrap(), Value::Int(9));
        assert_eq!(eval_str(&ns, "7 % 3").unwrap(), Value::Int(1));
        assert_eq!(eval_str(&ns, "1 + 0.5").unwrap(), Value::Float(1.5));
    }

    #[test]
    fn division_by_zero_raises() {
        let ns = shared();
        let err = eval_str(&ns, "1/0").unwrap_err();
        match err {
            EvalError::Raised(e) => {
                assert!(e.message.contains("division by zero"));
                assert_eq!(e.frames.len(), 1);
                assert_eq!(e.frames[0].source, "<test>");
                assert_eq!(e.frames[0].name, "<module>");
            }
            other => panic!("expected raised error, got {other:?}"),
        }
    }

    #[test]
    fn assignment_persists_in_namespace() {
        let ns = shared();
        exec_str(&ns, "x = 5").unwrap();
        assert_eq!(eval_str(&ns, "x").unwrap(), Value::Int(5));
        assert_eq!(ns.lock().get("x"), Some(&Value::Int(5)));
    }

    #[test]
    fn undefined_name_raises_name_error() {
        let ns = shared();
        match eval_str(&ns, "nope").unwrap_err() {
            EvalError::Raised(e) => assert_eq!(e.kind, "NameError"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn function_call_and_return() {
        let ns = shared();
        exec_str(&ns, "fn add(a, b):\n    return a + b").unwrap();
        assert_eq!(eval_str(&ns, "add(2, 3)").unwrap(), Value::Int(5));
    }

    #[test]
    fn function_error_has_two_frames() {
        let ns = shared();
        exec_str(&ns, "fn boom():\n    return 1/0").unwrap();
        match eval_str(&ns, "boom()").unwrap_err() {
            EvalError::Raised(e) => {
                assert_eq!(e.frames.len(), 2);
                assert_eq!(e.frames[0].name, "<module>");
                assert_eq!(e.frames[1].name, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn while_and_if_control_flow() {
        let ns = shared();
        exec_str(
            &ns,
            "total = 0\ni = 0\nwhile i < 5:\n    if i % 2 == 0:\n        total = total + i\n    i = i + 1",
        )
        .unwrap();
        assert_eq!(eval_str(&ns, "total").unwrap(), Value::Int(6));
    }

    #[test]
    fn list_indexing_and_assignment() {
        let ns = shared();
        exec_str(&ns, "xs = [1, 2, 3]\nxs[1] = 20").unwrap();
        assert_eq!(eval_str(&ns, "xs[1]").unwrap(), Value::Int(20));
        assert_eq!(eval_str(&ns, "xs[-1]").unwrap(), Value::Int(3));
        match eval_str(&ns, "xs[9]").unwrap_err() {
            EvalError::Raised(e) => assert_eq!(e.kind, "IndexError"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn builtins() {
        let ns = shared();
        assert_eq!(eval_str(&ns, "len(\"abc\")").unwrap(), Value::Int(3));
        assert_eq!(
            eval_str(&ns, "repr(\"a\")").unwrap(),
            Value::str("\"a\"")
        );
        assert_eq!(eval_str(&ns, "type(1)").unwrap(), Value::str("int"));
        assert_eq!(
            eval_str(&ns, "range(3)").unwrap(),
            Value::list(vec![Value::Int(0), Value::Int(1), Value::Int(2)])
        );
        assert_eq!(eval_str(&ns, "int(\"42\")").unwrap(), Value::Int(42));
    }

    #[test]
    fn interrupt_flag_stops_loop() {
        let ns = shared();
        let flag = InterruptFlag::default();
        flag.store(true, Ordering::Relaxed);
        let program = parse_program("while true:\n    pass").unwrap();
        let mut ev = Evaluator::new(ns.clone(), ns, flag, "<test>");
        assert!(matches!(
            ev.run_program(&program),
            Err(EvalError::Interrupted)
        ));
    }

    #[test]
    fn await_task_returns_result() {
        let ns = shared();
        let handle = TaskHandle::new(1);
        handle.slot.complete(TaskState::Done(Value::Int(9)));
        ns.lock().insert("t".to_string(), Value::Task(handle));
        assert_eq!(eval_str(&ns, "await t").unwrap(), Value::Int(9));
    }

    #[test]
    fn await_resolved_value_passes_through() {
        let ns = shared();
        assert_eq!(eval_str(&ns, "await 1").unwrap(), Value::Int(1));
    }

    #[test]
    fn recursion_depth_is_bounded() {
        let ns = shared();
        exec_str(&ns, "fn f():\n    return f()").unwrap();
        match eval_str(&ns, "f()").unwrap_err() {
            EvalError::Raised(e) => assert_eq!(e.kind, "RecursionError"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_circuit_returns_operand() {
        let ns = shared();
        assert_eq!(eval_str(&ns, "nil or 3").unwrap(), Value::Int(3));
        assert_eq!(eval_str(&ns, "0 and 1").unwrap(), Value::Int(0));
    }
}
