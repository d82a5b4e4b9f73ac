//! Engine configuration.
//!
//! A plain value owned by the session and passed by reference where
//! needed; there is no global settings object, so every mutation point
//! is explicit.

/// Configuration consumed by the execution engine and renderer.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Permit `await` at the top level of a submitted block; such
    /// blocks run under the scheduler instead of directly.
    pub allow_top_level_await: bool,
    /// Write a blank line after the input, before any output.
    pub insert_blank_line_after_input: bool,
    /// Write a blank separator line after the rendered outcome.
    pub insert_blank_line_after_output: bool,
    /// Source label compiled units carry into tracebacks.
    pub statement_label: String,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            allow_top_level_await: true,
            insert_blank_line_after_input: false,
            insert_blank_line_after_output: true,
            statement_label: "<stdin>".to_string(),
        }
    }
}
