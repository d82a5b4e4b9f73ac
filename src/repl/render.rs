//! Outcome rendering.
//!
//! `render_outcome` is a pure function from an outcome plus the
//! current statement index to styled segments; writing them to a
//! terminal (and choosing colors) is the sink's business.

use std::io::Write as _;

use owo_colors::OwoColorize;

use crate::lang::eval::Frame;
use crate::lang::RuntimeError;
use crate::repl::config::ReplConfig;
use crate::repl::outcome::Outcome;

/// Style class of one output segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegStyle {
    /// The `Out[N]: ` marker.
    OutPrompt,
    /// A rendered result value.
    Result,
    /// Traceback frame lines.
    Traceback,
    /// The one-line exception summary under a traceback.
    ExceptionSummary,
    /// Fixed notices: interrupts, cancellations, detach messages.
    Notice,
    /// Unstyled filler such as separator lines.
    Plain,
}

/// One styled piece of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub style: SegStyle,
    pub text: String,
}

impl Segment {
    pub fn new(style: SegStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// Append-only output destination for rendered segments.
pub trait OutputSink: Send {
    fn write(&mut self, segments: &[Segment]);
}

/// Colored stdout sink.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&mut self, segments: &[Segment]) {
        let mut stdout = std::io::stdout().lock();
        for seg in segments {
            let result = match seg.style {
                SegStyle::OutPrompt => write!(stdout, "{}", seg.text.red()),
                SegStyle::Result => write!(stdout, "{}", seg.text),
                SegStyle::Traceback => write!(stdout, "{}", seg.text.dimmed()),
                SegStyle::ExceptionSummary => write!(stdout, "{}", seg.text.bright_red()),
                SegStyle::Notice => write!(stdout, "{}", seg.text.yellow()),
                SegStyle::Plain => write!(stdout, "{}", seg.text),
            };
            if result.is_err() {
                return;
            }
        }
        let _ = stdout.flush();
    }
}

/// Render one outcome to styled segments.
pub fn render_outcome(outcome: &Outcome, index: u64, config: &ReplConfig) -> Vec<Segment> {
    let mut segments = Vec::new();
    match outcome {
        Outcome::NoValue => {}
        Outcome::Value(value) => {
            let out_mark = format!("Out[{index}]: ");
            let aligned = align_continuation(&value.repr(), out_mark.len());
            segments.push(Segment::new(SegStyle::OutPrompt, out_mark));
            segments.push(Segment::new(SegStyle::Result, format!("{aligned}\n")));
        }
        Outcome::Raised(error) => {
            segments.extend(render_raised(error, &config.statement_label));
        }
        Outcome::Interrupted => {
            segments.push(Segment::new(SegStyle::Notice, "Interrupted\n"));
        }
        Outcome::Cancelled => {
            segments.push(Segment::new(SegStyle::Notice, "Cancelled by scheduler\n"));
        }
    }
    if config.insert_blank_line_after_output && !outcome.is_no_value() {
        segments.push(Segment::new(SegStyle::Plain, "\n"));
    }
    segments
}

/// Pad every line after the first so a multi-line repr lines up under
/// the first result column.
fn align_continuation(repr: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    repr.split('\n').collect::<Vec<_>>().join(&format!("\n{pad}"))
}

fn render_raised(error: &RuntimeError, label: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let frames = trim_frames(&error.frames, label);
    if !frames.is_empty() {
        let mut text = String::from("Traceback (most recent call last):\n");
        for frame in frames {
            text.push_str(&format!(
                "  File \"{}\", line {}, in {}\n",
                frame.source, frame.line, frame.name
            ));
        }
        segments.push(Segment::new(SegStyle::Traceback, text));
    }
    segments.push(Segment::new(
        SegStyle::ExceptionSummary,
        format!("{}\n", error.summary()),
    ));
    segments
}

/// Strip the frames beneath the point where the user's compiled unit
/// began executing: drop everything before the first frame whose
/// source label matches the statement label, keeping that frame and
/// its descendants. Frames are ordered outermost first.
pub fn trim_frames<'a>(frames: &'a [Frame], label: &str) -> &'a [Frame] {
    match frames.iter().position(|f| f.source == label) {
        Some(first) => &frames[first..],
        None => frames,
    }
}
