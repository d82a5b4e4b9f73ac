//! The execution engine.
//!
//! One call to [`Engine::execute`] takes a complete input block
//! through classification, compilation, evaluation and rendering, and
//! reports whether the session should continue. The engine owns the
//! statement counter and the namespace; the session loop owns line
//! editing and signal wiring.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::lang::eval::{EvalError, InterruptFlag};
use crate::lang::{RuntimeError, TaskHandle, TaskState, Value};
use crate::repl::classify;
use crate::repl::compile::{self, CompileError, Mode};
use crate::repl::config::ReplConfig;
use crate::repl::interrupt::InterruptChannel;
use crate::repl::namespace::Namespace;
use crate::repl::outcome::Outcome;
use crate::repl::render::{self, OutputSink, SegStyle, Segment};

/// What the session loop should do after a block.
#[derive(Debug)]
pub enum Flow {
    /// Keep reading input; carries the outcome for callers that want it.
    Continue(Outcome),
    /// The block asked the session to end.
    Exit,
}

/// Frontend notifications the engine emits at statement boundaries.
/// The terminal session ignores these; embedding UIs use them to drop
/// stale completion and signature popups.
pub trait UiHooks: Send {
    fn signatures_cleared(&mut self) {}
}

/// Hook sink that ignores every notification.
#[derive(Debug, Default)]
pub struct NoHooks;

impl UiHooks for NoHooks {}

/// Executes input blocks against a persistent namespace.
pub struct Engine {
    config: ReplConfig,
    namespace: Namespace,
    interrupts: Arc<InterruptChannel>,
    sink: Box<dyn OutputSink>,
    hooks: Box<dyn UiHooks>,
    index: u64,
    next_task_id: u64,
    /// Shared stop flag for every scheduled task. The interrupt
    /// channel never touches it; it is raised once, at teardown, so
    /// detached tasks wind down instead of pinning the runtime.
    task_flag: InterruptFlag,
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.task_flag.store(true, Ordering::Relaxed);
    }
}

impl Engine {
    pub fn new(config: ReplConfig, sink: Box<dyn OutputSink>) -> Self {
        Self::with_namespace(config, Namespace::new(), sink)
    }

    /// Engine over caller-owned maps, for embedding.
    pub fn with_namespace(
        config: ReplConfig,
        namespace: Namespace,
        sink: Box<dyn OutputSink>,
    ) -> Self {
        Self {
            config,
            namespace,
            interrupts: InterruptChannel::new(),
            sink,
            hooks: Box::new(NoHooks),
            index: 1,
            next_task_id: 1,
            task_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn UiHooks>) {
        self.hooks = hooks;
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Index the next non-blank block will execute under.
    pub fn statement_index(&self) -> u64 {
        self.index
    }

    /// The interrupt channel the session's signal handler feeds.
    pub fn interrupts(&self) -> Arc<InterruptChannel> {
        self.interrupts.clone()
    }

    /// Execute one complete input block.
    pub async fn execute(&mut self, block: &str) -> Flow {
        // Blank input is a complete no-op: nothing runs, nothing
        // renders, the statement index stays put.
        if block.trim().is_empty() {
            return Flow::Continue(Outcome::NoValue);
        }
        if classify::is_eof_sentinel(block) {
            return Flow::Exit;
        }

        // A single-line block is submitted as typed; strip the
        // accidental whitespace a paste tends to carry.
        let block = if block.contains('\n') {
            block
        } else {
            block.trim()
        };

        if self.config.insert_blank_line_after_input {
            self.sink.write(&[Segment::new(SegStyle::Plain, "\n")]);
        }

        // A still-set flag belongs to a previous statement.
        self.interrupts.clear();

        debug!(index = self.index, "executing block");
        let outcome = if let Some(command) = classify::shell_command(block) {
            self.run_shell(command)
        } else {
            self.run_unit(block).await
        };
        self.finish(outcome)
    }

    /// Run non-interactive source such as a startup file. Always
    /// program mode, never expression-first; failures render but do
    /// not consume a statement index or touch the result bindings.
    pub fn run_source(&mut self, source: &str, label: &str) -> bool {
        let unit = match compile::compile(
            source,
            Mode::Program,
            self.config.allow_top_level_await,
            label,
        ) {
            Ok(unit) => unit,
            Err(err) => {
                self.render_only(Outcome::Raised(compile_failure(err)));
                return false;
            }
        };
        match unit.run(&self.namespace, self.interrupts.flag()) {
            Ok(_) => true,
            Err(EvalError::Raised(error)) => {
                self.render_only(Outcome::Raised(error));
                false
            }
            Err(EvalError::Interrupted) => {
                self.render_only(Outcome::Interrupted);
                false
            }
        }
    }

    fn render_only(&mut self, outcome: Outcome) {
        let segments = render::render_outcome(&outcome, self.index, &self.config);
        if !segments.is_empty() {
            self.sink.write(&segments);
        }
    }

    fn finish(&mut self, outcome: Outcome) -> Flow {
        let segments = render::render_outcome(&outcome, self.index, &self.config);
        if !segments.is_empty() {
            self.sink.write(&segments);
        }
        self.hooks.signatures_cleared();
        self.index += 1;
        Flow::Continue(outcome)
    }

    /// `!command` runs under the system shell, bypassing compilation
    /// entirely. The exit status is not surfaced to the namespace; a
    /// visible command wrote its own output already.
    fn run_shell(&mut self, command: &str) -> Outcome {
        #[cfg(windows)]
        let status = Command::new("cmd").arg("/C").arg(command).status();
        #[cfg(not(windows))]
        let status = Command::new("sh").arg("-c").arg(command).status();
        match status {
            Ok(status) if !status.success() => {
                warn!(%status, "shell command failed");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "could not start shell");
            }
        }
        Outcome::NoValue
    }

    async fn run_unit(&mut self, block: &str) -> Outcome {
        // Expression first, so a bare expression displays its value;
        // statement mode is the fallback, and only a syntax failure
        // triggers it.
        let label = self.config.statement_label.clone();
        let attempt = compile::compile(
            block,
            Mode::Expression,
            self.config.allow_top_level_await,
            &label,
        );
        let unit = match attempt {
            Ok(unit) => unit,
            Err(CompileError::Syntax(_)) => {
                match compile::compile(
                    block,
                    Mode::Program,
                    self.config.allow_top_level_await,
                    &label,
                ) {
                    Ok(unit) => unit,
                    Err(err) => return Outcome::Raised(compile_failure(err)),
                }
            }
            Err(err) => return Outcome::Raised(compile_failure(err)),
        };

        if unit.has_top_level_await {
            self.run_scheduled(unit).await
        } else {
            self.run_direct(unit)
        }
    }

    fn run_direct(&mut self, unit: compile::CompiledUnit) -> Outcome {
        let mode = unit.mode();
        match unit.run(&self.namespace, self.interrupts.flag()) {
            Ok(value) => self.success(mode, value),
            Err(EvalError::Raised(error)) => Outcome::Raised(error),
            Err(EvalError::Interrupted) => Outcome::Interrupted,
        }
    }

    /// Run a unit with a top-level suspension point under the
    /// scheduler, racing completion against the interrupt channel. An
    /// interrupt does not cancel the task: it detaches it, binds its
    /// handle into the result bindings, and returns control.
    async fn run_scheduled(&mut self, unit: compile::CompiledUnit) -> Outcome {
        let mode = unit.mode();
        let task_id = self.next_task_id;
        self.next_task_id += 1;
        let handle = TaskHandle::new(task_id);

        // Not the channel's flag: a user interrupt detaches the task,
        // it does not stop it. Only engine teardown raises this one.
        let task_flag = self.task_flag.clone();
        let namespace = self.namespace.clone();
        let slot = handle.slot.clone();
        let mut join = tokio::task::spawn_blocking(move || {
            let result = unit.run(&namespace, task_flag);
            match &result {
                Ok(value) => slot.complete(TaskState::Done(value.clone())),
                Err(EvalError::Raised(error)) => {
                    slot.complete(TaskState::Failed(error.summary()));
                }
                Err(EvalError::Interrupted) => {
                    slot.complete(TaskState::Failed("interrupted".to_string()));
                }
            }
            result
        });

        let armed = self.interrupts.arm();
        tokio::select! {
            joined = &mut join => match joined {
                Ok(Ok(value)) => self.success(mode, value),
                Ok(Err(EvalError::Raised(error))) => Outcome::Raised(error),
                Ok(Err(EvalError::Interrupted)) => Outcome::Interrupted,
                Err(err) if err.is_cancelled() => Outcome::Cancelled,
                Err(err) => Outcome::Raised(RuntimeError::new(
                    "PanicError",
                    format!("task panicked: {err}"),
                )),
            },
            _ = armed.fired() => {
                debug!(task_id, "detaching scheduled task");
                self.namespace
                    .bind_result(self.index, Value::Task(handle));
                self.sink.write(&[Segment::new(
                    SegStyle::Notice,
                    format!(
                        "Task #{task_id} detached, still running; handle bound to _{}\n",
                        self.index
                    ),
                )]);
                Outcome::Interrupted
            }
        }
    }

    fn success(&mut self, mode: Mode, value: Value) -> Outcome {
        match mode {
            // Every expression result is bound, nil included; only the
            // display is suppressed for nil.
            Mode::Expression => {
                self.namespace.bind_result(self.index, value.clone());
                if value.is_nil() {
                    Outcome::NoValue
                } else {
                    Outcome::Value(value)
                }
            }
            Mode::Program => Outcome::NoValue,
        }
    }
}

fn compile_failure(err: CompileError) -> RuntimeError {
    match err {
        CompileError::Syntax(e) => RuntimeError::new(
            "SyntaxError",
            format!("{} (line {}, column {})", e.message, e.line, e.column),
        ),
        CompileError::NulByte => RuntimeError::new(
            "ValueError",
            "source code string cannot contain null bytes",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct CollectSink(Arc<Mutex<Vec<Segment>>>);

    impl OutputSink for CollectSink {
        fn write(&mut self, segments: &[Segment]) {
            self.0.lock().extend_from_slice(segments);
        }
    }

    fn engine() -> (Engine, CollectSink) {
        let sink = CollectSink::default();
        let config = ReplConfig {
            insert_blank_line_after_output: false,
            ..ReplConfig::default()
        };
        (Engine::new(config, Box::new(sink.clone())), sink)
    }

    #[tokio::test]
    async fn expression_value_is_bound_and_rendered() {
        let (mut engine, sink) = engine();
        match engine.execute("1 + 2").await {
            Flow::Continue(Outcome::Value(Value::Int(3))) => {}
            other => panic!("unexpected flow: {other:?}"),
        }
        assert_eq!(engine.namespace().get("_"), Some(Value::Int(3)));
        assert_eq!(engine.namespace().get("_1"), Some(Value::Int(3)));
        let rendered: String = sink.0.lock().iter().map(|s| s.text.clone()).collect();
        assert!(rendered.contains("Out[1]: 3"));
    }

    #[tokio::test]
    async fn blank_input_is_a_complete_no_op() {
        let (mut engine, sink) = engine();
        match engine.execute("   \n").await {
            Flow::Continue(Outcome::NoValue) => {}
            other => panic!("unexpected flow: {other:?}"),
        }
        assert_eq!(engine.statement_index(), 1);
        assert!(sink.0.lock().is_empty());
    }

    #[tokio::test]
    async fn eof_sentinel_exits() {
        let (mut engine, _) = engine();
        assert!(matches!(engine.execute("\u{1a}").await, Flow::Exit));
    }

    #[tokio::test]
    async fn statement_fallback_after_expression_rejection() {
        let (mut engine, _) = engine();
        engine.execute("x = 5").await;
        engine.execute("x").await;
        assert_eq!(engine.namespace().get("x"), Some(Value::Int(5)));
        assert_eq!(engine.namespace().get("_"), Some(Value::Int(5)));
        // The assignment was NoValue; only the lookup got a binding.
        assert_eq!(engine.namespace().get("_1"), None);
        assert_eq!(engine.namespace().get("_2"), Some(Value::Int(5)));
    }

    #[tokio::test]
    async fn raised_outcome_advances_index() {
        let (mut engine, sink) = engine();
        match engine.execute("1 / 0").await {
            Flow::Continue(Outcome::Raised(error)) => {
                assert_eq!(error.kind, "DivisionError");
                assert_eq!(error.frames.len(), 1);
                assert_eq!(error.frames[0].source, "<stdin>");
            }
            other => panic!("unexpected flow: {other:?}"),
        }
        assert_eq!(engine.statement_index(), 2);
        let rendered: String = sink.0.lock().iter().map(|s| s.text.clone()).collect();
        assert!(rendered.contains("division by zero"));
    }

    #[tokio::test]
    async fn nil_expression_is_silent_but_still_bound() {
        let (mut engine, sink) = engine();
        match engine.execute("nil").await {
            Flow::Continue(Outcome::NoValue) => {}
            other => panic!("unexpected flow: {other:?}"),
        }
        assert!(sink.0.lock().is_empty());
        // Display is suppressed; the result keys are written anyway.
        assert_eq!(engine.namespace().get("_"), Some(Value::Nil));
        assert_eq!(engine.namespace().get("_1"), Some(Value::Nil));
        // Silent, but still counted.
        assert_eq!(engine.statement_index(), 2);
    }

    #[tokio::test]
    async fn nul_byte_is_a_hard_failure() {
        let (mut engine, _) = engine();
        match engine.execute("1 + \0 2").await {
            Flow::Continue(Outcome::Raised(error)) => {
                assert_eq!(error.kind, "ValueError");
            }
            other => panic!("unexpected flow: {other:?}"),
        }
    }

    #[tokio::test]
    async fn shell_escape_is_never_compiled() {
        let (mut engine, _) = engine();
        // Deliberately not valid source; must still succeed.
        match engine.execute("!true").await {
            Flow::Continue(Outcome::NoValue) => {}
            other => panic!("unexpected flow: {other:?}"),
        }
        assert_eq!(engine.statement_index(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn top_level_await_runs_under_scheduler() {
        let (mut engine, _) = engine();
        engine.execute("fn quick():\n    return 7").await;
        match engine.execute("await quick()").await {
            Flow::Continue(Outcome::Value(Value::Int(7))) => {}
            other => panic!("unexpected flow: {other:?}"),
        }
        assert_eq!(engine.namespace().get("_"), Some(Value::Int(7)));
    }
}
