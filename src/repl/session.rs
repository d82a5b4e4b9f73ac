//! Line-based interactive session with rustyline.
//!
//! The session owns the line editor, the signal wiring and the tokio
//! runtime; each complete block goes to the engine and the resulting
//! flow decides whether to keep reading.

use std::path::PathBuf;

use anyhow::Result;
use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{EditMode, Editor};
use tracing::debug;

use crate::lang::eval::SharedMap;
use crate::repl::classify;
use crate::repl::config::ReplConfig;
use crate::repl::engine::{Engine, Flow};
use crate::repl::namespace::Namespace;
use crate::repl::render::StdoutSink;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Prompt to display
    pub prompt: String,
    /// Multi-line prompt
    pub continuation_prompt: String,
    /// Enable VI mode
    pub vi_mode: bool,
    /// History file path
    pub history_file: Option<PathBuf>,
    /// Maximum history size
    pub history_size: usize,
    /// Source files executed into the namespace before the first prompt
    pub startup_paths: Vec<PathBuf>,
    /// Engine and renderer settings
    pub repl: ReplConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt: ">>> ".into(),
            continuation_prompt: "... ".into(),
            vi_mode: false,
            history_file: None,
            history_size: 1000,
            startup_paths: Vec::new(),
            repl: ReplConfig::default(),
        }
    }
}

/// An interactive session over stdin/stdout.
pub struct Session {
    config: SessionConfig,
    editor: Editor<(), FileHistory>,
    engine: Engine,
    runtime: tokio::runtime::Runtime,
}

impl Session {
    pub fn new() -> Result<Self> {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Result<Self> {
        let engine = Engine::new(config.repl.clone(), Box::new(StdoutSink));
        Self::build(config, engine)
    }

    /// Session over caller-owned maps; bindings made at the prompt
    /// stay visible to the embedding program and vice versa.
    pub fn embed(globals: SharedMap, locals: SharedMap, config: SessionConfig) -> Result<Self> {
        let engine = Engine::with_namespace(
            config.repl.clone(),
            Namespace::embed(globals, locals),
            Box::new(StdoutSink),
        );
        Self::build(config, engine)
    }

    fn build(config: SessionConfig, engine: Engine) -> Result<Self> {
        let rl_config = Config::builder()
            .history_ignore_space(true)
            .max_history_size(config.history_size)?
            .auto_add_history(false)
            .edit_mode(if config.vi_mode {
                EditMode::Vi
            } else {
                EditMode::Emacs
            })
            .build();

        let mut editor = Editor::with_config(rl_config)?;
        if let Some(ref history_file) = config.history_file {
            if history_file.exists() {
                let _ = editor.load_history(history_file);
            }
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            config,
            editor,
            engine,
            runtime,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Run the session until EOF or the EOF sentinel.
    pub fn run(&mut self) -> Result<()> {
        println!("Rill {} interactive shell", crate::VERSION);
        println!("Type !command for a shell escape, Ctrl-D to exit\n");

        // Ctrl-C during execution becomes an interrupt on the engine's
        // channel; while editing, rustyline reads the keypress itself
        // and reports Interrupted instead.
        let channel = self.engine.interrupts();
        self.runtime.spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    break;
                }
                channel.trigger();
            }
        });

        self.run_startup_files();
        let result = self.read_eval_loop();

        if let Some(ref history_file) = self.config.history_file {
            let _ = self.editor.save_history(history_file);
        }
        result
    }

    /// Execute the configured startup files into the namespace. A
    /// missing file is a warning, a failing one renders its error;
    /// neither stops the session.
    fn run_startup_files(&mut self) {
        for path in self.config.startup_paths.clone() {
            match std::fs::read_to_string(&path) {
                Ok(source) => {
                    debug!(path = %path.display(), "running startup file");
                    let label = path.display().to_string();
                    self.engine.run_source(&source, &label);
                }
                Err(_) => {
                    println!("WARNING | File not found: {}", path.display());
                }
            }
        }
    }

    fn read_eval_loop(&mut self) -> Result<()> {
        let mut block = String::new();
        loop {
            let prompt = if block.is_empty() {
                self.config.prompt.clone()
            } else {
                self.config.continuation_prompt.clone()
            };

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    if block.is_empty() {
                        block = line;
                    } else {
                        block.push('\n');
                        block.push_str(&line);
                    }
                    if classify::needs_more_input(&block) {
                        continue;
                    }
                    let submitted = std::mem::take(&mut block);
                    if !submitted.trim().is_empty() {
                        let _ = self.editor.add_history_entry(submitted.as_str());
                    }
                    match self.runtime.block_on(self.engine.execute(&submitted)) {
                        Flow::Continue(_) => {}
                        Flow::Exit => break,
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl-C while editing abandons the pending block.
                    block.clear();
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
