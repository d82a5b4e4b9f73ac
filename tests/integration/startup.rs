//! Startup-file execution into the session namespace.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use rill::lang::Value;
use rill::repl::{Engine, OutputSink, ReplConfig, Segment};

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
    (
        Engine::new(ReplConfig::default(), Box::new(sink.clone())),
        sink,
    )
}

#[tokio::test]
async fn startup_file_populates_the_namespace() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "greeting = \"hi\"").unwrap();
    writeln!(file, "fn double(x):").unwrap();
    writeln!(file, "    return x * 2").unwrap();
    file.flush().unwrap();

    let (mut engine, _) = engine();
    let source = std::fs::read_to_string(file.path()).unwrap();
    assert!(engine.run_source(&source, &file.path().display().to_string()));

    assert_eq!(engine.namespace().get("greeting"), Some(Value::str("hi")));
    // Startup code consumes no statement indices.
    assert_eq!(engine.statement_index(), 1);

    // ...and its definitions are callable from the prompt.
    match engine.execute("double(21)").await {
        rill::repl::Flow::Continue(rill::repl::Outcome::Value(Value::Int(42))) => {}
        other => panic!("unexpected flow: {other:?}"),
    }
}

#[test]
fn failing_startup_source_renders_but_does_not_bind() {
    let (mut engine, sink) = engine();
    assert!(!engine.run_source("x = 1 / 0", "<startup>"));
    assert!(sink.text().contains("division by zero"));
    assert_eq!(engine.namespace().get("x"), None);
    assert_eq!(engine.statement_index(), 1);
}

#[test]
fn startup_syntax_error_is_reported() {
    let (mut engine, sink) = engine();
    assert!(!engine.run_source("fn broken(:\n", "<startup>"));
    assert!(sink.text().contains("SyntaxError"));
}
