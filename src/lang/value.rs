//! Runtime values for Rill.
//!
//! `Value` is the unified representation of everything a Rill program
//! can produce. Values are cheap to clone: compound payloads live
//! behind `Arc`. Everything is `Send + Sync` because a detached
//! background task keeps holding values after its statement finished.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::ast::Block;

/// A user-defined function.
#[derive(Debug)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    /// Source label the function was compiled under, recorded into
    /// traceback frames for calls.
    pub source: String,
    pub line: u32,
}

/// Lifecycle of a detached task, as visible through its handle.
#[derive(Debug, Clone)]
pub enum TaskState {
    Running,
    Done(Value),
    Failed(String),
}

/// Shared completion slot for a scheduled unit of execution.
#[derive(Debug)]
pub struct TaskSlot {
    state: Mutex<TaskState>,
    cond: Condvar,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TaskState::Running),
            cond: Condvar::new(),
        }
    }

    /// Record completion and wake any waiters.
    pub fn complete(&self, state: TaskState) {
        let mut guard = self.state.lock();
        *guard = state;
        self.cond.notify_all();
    }

    pub fn state(&self) -> TaskState {
        self.state.lock().clone()
    }

    /// Block until the task finished, or until `timeout` elapses while
    /// it is still running. Returns the state either way; callers poll
    /// so an interrupt flag can be checked between waits.
    pub fn wait_timeout(&self, timeout: std::time::Duration) -> TaskState {
        let mut guard = self.state.lock();
        if matches!(*guard, TaskState::Running) {
            self.cond.wait_for(&mut guard, timeout);
        }
        guard.clone()
    }
}

impl Default for TaskSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a detached unit of execution, bound into the namespace
/// when an interrupt detaches a scheduled statement. Awaiting the
/// handle yields the task's eventual result.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub id: u64,
    pub slot: Arc<TaskSlot>,
}

impl TaskHandle {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            slot: Arc::new(TaskSlot::new()),
        }
    }
}

/// A Rill runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<Mutex<Vec<Value>>>),
    Func(Arc<FuncDef>),
    Task(TaskHandle),
}

impl Value {
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(Mutex::new(items)))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Type name for diagnostics and the `type` builtin.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Func(_) => "fn",
            Value::Task(_) => "task",
        }
    }

    /// Truthiness: nil, false, zero, and empty containers are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.lock().is_empty(),
            Value::Func(_) | Value::Task(_) => true,
        }
    }

    /// Developer-facing representation, as shown for REPL results.
    pub fn repr(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => format!("{s:?}"),
            Value::List(items) => {
                let items = items.lock();
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Func(def) => format!("<fn {}>", def.name),
            Value::Task(handle) => match handle.slot.state() {
                TaskState::Running => format!("<task #{} running>", handle.id),
                TaskState::Done(_) => format!("<task #{} done>", handle.id),
                TaskState::Failed(_) => format!("<task #{} failed>", handle.id),
            },
        }
    }
}

/// Keep a trailing `.0` on floats that happen to be integral, so int
/// and float results stay distinguishable.
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Value {
    /// User-facing text: strings print raw, everything else as repr.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            other => write!(f, "{}", other.repr()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.lock();
                let b = b.lock();
                *a == *b
            }
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(a, b),
            (Value::Task(a), Value::Task(b)) => a.id == b.id,
            _ => false,
        }
    }
}
