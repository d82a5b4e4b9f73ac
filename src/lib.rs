//! Rill
//!
//! A small dynamic scripting language with an interactive shell built
//! around it. The shell compiles each input block expression-first,
//! keeps a persistent namespace with `_`-style result bindings, and
//! runs top-level `await` under a scheduler that detaches, rather than
//! cancels, on interrupt.
//!
//! # Example
//!
//! ```no_run
//! use rill::repl::Session;
//!
//! fn main() -> rill::Result<()> {
//!     Session::new()?.run()
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/rill")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod lang;
pub mod repl;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

use std::fs;
use std::path::Path;

use tracing::debug;

/// Language version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Language name
pub const NAME: &str = "Rill";

/// Run a source program non-interactively.
pub fn run(source: &str) -> Result<()> {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    debug!("compiling program");
    let program = lang::parser::parse_program(source)
        .map_err(|e| anyhow::anyhow!("syntax error: {e}"))?;
    let namespace = repl::Namespace::new();
    let mut evaluator = lang::Evaluator::new(
        namespace.globals(),
        namespace.locals(),
        Arc::new(AtomicBool::new(false)),
        "<main>",
    );
    debug!("running program");
    evaluator.run_program(&program).map_err(|e| match e {
        lang::EvalError::Raised(err) => anyhow::anyhow!("{}", err.summary()),
        lang::EvalError::Interrupted => anyhow::anyhow!("interrupted"),
    })
}

/// Run a source file non-interactively.
pub fn run_file(path: &Path) -> Result<()> {
    debug!(path = %path.display(), "running file");
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    run(&source)
}
