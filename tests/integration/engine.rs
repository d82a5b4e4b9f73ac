//! End-to-end engine behavior through the public API.

use std::sync::Arc;

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

#[tokio::test]
async fn index_counts_every_non_blank_block() {
    let (mut engine, _) = engine();
    assert_eq!(engine.statement_index(), 1);

    engine.execute("1 + 1").await; // value
    engine.execute("x = 0").await; // no value
    engine.execute("1 / 0").await; // raised
    engine.execute("!true").await; // shell escape
    assert_eq!(engine.statement_index(), 5);

    // Blank input is invisible to the counter.
    engine.execute("").await;
    engine.execute("   \n  ").await;
    assert_eq!(engine.statement_index(), 5);
}

#[tokio::test]
async fn blank_input_renders_nothing() {
    let (mut engine, sink) = engine();
    assert!(matches!(
        engine.execute("  \n").await,
        Flow::Continue(Outcome::NoValue)
    ));
    assert!(sink.0.lock().is_empty());
}

#[tokio::test]
async fn bindings_persist_across_statements() {
    let (mut engine, sink) = engine();
    engine.execute("x = 5").await;
    match outcome(engine.execute("x").await) {
        Outcome::Value(Value::Int(5)) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(engine.namespace().get("_"), Some(Value::Int(5)));
    assert_eq!(engine.namespace().get("_2"), Some(Value::Int(5)));
    assert!(sink.text().contains("Out[2]: 5"));
}

#[tokio::test]
async fn division_by_zero_renders_trimmed_traceback() {
    let (mut engine, sink) = engine();
    match outcome(engine.execute("1 / 0").await) {
        Outcome::Raised(error) => {
            assert_eq!(error.kind, "DivisionError");
            assert_eq!(error.frames.len(), 1);
            assert_eq!(error.frames[0].source, "<stdin>");
            assert_eq!(error.frames[0].name, "<module>");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let text = sink.text();
    assert!(text.contains("Traceback (most recent call last):"));
    assert!(text.contains("File \"<stdin>\", line 1, in <module>"));
    assert!(text.contains("division by zero"));
    assert_eq!(engine.statement_index(), 2);
}

#[tokio::test]
async fn raised_call_shows_both_frames() {
    let (mut engine, sink) = engine();
    engine.execute("fn boom():\n    return 1 / 0").await;
    match outcome(engine.execute("boom()").await) {
        Outcome::Raised(error) => {
            assert_eq!(error.frames.len(), 2);
            assert_eq!(error.frames[0].name, "<module>");
            assert_eq!(error.frames[1].name, "boom");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(sink.text().contains("in boom"));
}

#[tokio::test]
async fn exception_preserves_earlier_bindings() {
    let (mut engine, _) = engine();
    engine.execute("x = 1").await;
    engine.execute("y = x / 0").await;
    assert_eq!(engine.namespace().get("x"), Some(Value::Int(1)));
    assert_eq!(engine.namespace().get("y"), None);
    // The failed statement still consumed an index.
    assert_eq!(engine.statement_index(), 3);
}

#[tokio::test]
async fn shell_escape_skips_compilation() {
    let (mut engine, _) = engine();
    // Not valid source after the bang; must not be compiled.
    match outcome(engine.execute("!echo 'not ) valid ( source'").await) {
        Outcome::NoValue => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(engine.namespace().get("_"), None);
}

#[tokio::test]
async fn eof_sentinel_ends_the_session() {
    let (mut engine, _) = engine();
    assert!(matches!(engine.execute("\u{1a}").await, Flow::Exit));
    assert!(matches!(engine.execute("  \u{1a}").await, Flow::Exit));
}

#[tokio::test]
async fn multi_line_function_definition_runs() {
    let (mut engine, _) = engine();
    engine
        .execute("fn add(a, b):\n    return a + b\n")
        .await;
    match outcome(engine.execute("add(2, 3)").await) {
        Outcome::Value(Value::Int(5)) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn result_history_tracks_indices() {
    let (mut engine, _) = engine();
    engine.execute("10").await;
    engine.execute("20").await;
    engine.execute("z = 0").await;
    engine.execute("30").await;
    assert_eq!(engine.namespace().get("_1"), Some(Value::Int(10)));
    assert_eq!(engine.namespace().get("_2"), Some(Value::Int(20)));
    assert_eq!(engine.namespace().get("_3"), None);
    assert_eq!(engine.namespace().get("_4"), Some(Value::Int(30)));
    assert_eq!(engine.namespace().get("_"), Some(Value::Int(30)));
}

#[tokio::test]
async fn nil_result_still_binds_underscore() {
    let (mut engine, sink) = engine();
    match outcome(engine.execute("nil").await) {
        Outcome::NoValue => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    // Nothing renders, but the reserved keys are written.
    assert!(sink.0.lock().is_empty());
    assert_eq!(engine.namespace().get("_"), Some(Value::Nil));
    assert_eq!(engine.namespace().get("_1"), Some(Value::Nil));

    // A later value overwrites `_` as usual.
    match outcome(engine.execute("2").await) {
        Outcome::Value(Value::Int(2)) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(engine.namespace().get("_"), Some(Value::Int(2)));
    assert_eq!(engine.namespace().get("_1"), Some(Value::Nil));
}

#[tokio::test]
async fn output_separator_is_configurable() {
    let sink = CollectSink::default();
    let config = ReplConfig {
        insert_blank_line_after_output: true,
        ..ReplConfig::default()
    };
    let mut engine = Engine::new(config, Box::new(sink.clone()));
    engine.execute("1").await;
    assert!(sink.text().ends_with("\n\n"));
}

#[tokio::test]
async fn string_values_render_quoted() {
    let (mut engine, sink) = engine();
    engine.execute("\"hello\"").await;
    assert!(sink.text().contains("Out[1]: \"hello\""));
}
