//! Interrupt delivery: direct statements stop, scheduled ones detach.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rill::lang::Value;
use rill::repl::{Engine, Flow, Outcome, OutputSink, ReplConfig, Segment};

#[derive(Clone, Default)]
struct CollectSink(Arc<Mutex<Vec<Segment>>>);

impl CollectSink {
    fn text(&self) -> String {
        self.0.lock().iter().map(|s| s.text.clone()).collect()
    }
}

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

fn outcome(flow: Flow) -> Outcome {
    match flow {
        Flow::Continue(outcome) => outcome,
        Flow::Exit => panic!("unexpected exit"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn direct_statement_stops_on_interrupt() {
    let (mut engine, _) = engine();
    let channel = engine.interrupts();
    let trigger = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        channel.trigger();
    });
    match outcome(engine.execute("while true:\n    pass").await) {
        Outcome::Interrupted => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    trigger.join().unwrap();
    // Nothing is bound on a plain interrupt.
    assert_eq!(engine.namespace().get("_"), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scheduled_statement_detaches_on_interrupt() {
    let (mut engine, sink) = engine();
    let channel = engine.interrupts();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        channel.trigger();
    });
    match outcome(engine.execute("while true:\n    await sleep(0.01)").await) {
        Outcome::Interrupted => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    // The task was not cancelled: its handle landed in the bindings.
    match engine.namespace().get("_") {
        Some(Value::Task(_)) => {}
        other => panic!("expected task handle, got {other:?}"),
    }
    assert!(sink.text().contains("detached"));
    assert!(sink.text().contains("Interrupted"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn detached_task_finishes_and_is_awaitable() {
    let (mut engine, _) = engine();
    engine
        .execute("fn slow():\n    sleep(0.3)\n    return 42")
        .await;

    let channel = engine.interrupts();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        channel.trigger();
    });
    match outcome(engine.execute("await slow()").await) {
        Outcome::Interrupted => {}
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The detached task keeps running on its own flag and completes.
    std::thread::sleep(Duration::from_millis(500));
    match outcome(engine.execute("await _").await) {
        Outcome::Value(Value::Int(42)) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn double_interrupt_detaches_once_and_session_continues() {
    let (mut engine, sink) = engine();
    let channel = engine.interrupts();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        channel.trigger();
        channel.trigger();
    });
    match outcome(engine.execute("while true:\n    await sleep(0.01)").await) {
        Outcome::Interrupted => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(sink.text().matches("detached").count(), 1);

    // The stray second interrupt must not bleed into the next block.
    match outcome(engine.execute("1 + 1").await) {
        Outcome::Value(Value::Int(2)) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interrupt_before_statement_is_discarded() {
    let (mut engine, _) = engine();
    engine.interrupts().trigger();
    // The flag from before the statement must not interrupt it.
    match outcome(engine.execute("1 + 1").await) {
        Outcome::Value(Value::Int(2)) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
}
