//! Interactive execution engine for Rill.
//!
//! This module contains:
//! - [`classify`] - input classification (continuation, EOF, shell escape)
//! - [`compile`] - the compiler adapter over the host parser
//! - [`engine::Engine`] - the core execute/render state machine
//! - [`interrupt::InterruptChannel`] - interrupt delivery for running statements
//! - [`namespace::Namespace`] - the persistent session bindings
//! - [`render`] - outcome rendering to styled segments
//! - [`session::Session`] - the rustyline-driven read-eval-print loop

pub mod classify;
pub mod compile;
pub mod config;
pub mod engine;
pub mod interrupt;
pub mod namespace;
pub mod outcome;
pub mod render;
pub mod session;

pub use config::ReplConfig;
pub use engine::{Engine, Flow, UiHooks};
pub use interrupt::InterruptChannel;
pub use namespace::Namespace;
pub use outcome::Outcome;
pub use render::{OutputSink, SegStyle, Segment, StdoutSink};
pub use session::{Session, SessionConfig};
