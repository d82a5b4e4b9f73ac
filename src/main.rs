//! Rill - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rill::repl::{Session, SessionConfig};
use rill::util::logger;
use rill::{run, run_file, NAME, VERSION};
use std::path::PathBuf;

/// A small dynamic scripting language with an interactive shell
#[derive(Parser, Debug)]
#[command(name = "rill")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Source files run into the shell's namespace before the prompt
    #[arg(long, value_name = "FILE")]
    startup: Vec<PathBuf>,

    /// Use vi editing keys at the prompt
    #[arg(long)]
    vi: bool,

    /// History file for the interactive shell
    #[arg(long, value_name = "FILE")]
    history: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a Rill source file
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Evaluate Rill code from command line
    Eval {
        /// Code to evaluate
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        logger::init_debug();
        eprintln!("Rill version: {}", VERSION);
        eprintln!("Host: {}", std::env::consts::OS);
    } else {
        logger::init_cli();
    }

    match args.command {
        Some(Commands::Run { file }) => {
            run_file(&file).with_context(|| format!("Failed to run: {}", file.display()))?;
        }
        Some(Commands::Eval { code }) => {
            run(&code).context("Failed to evaluate code")?;
        }
        Some(Commands::Version) => {
            println!("{} {}", NAME, VERSION);
        }
        None => {
            let config = SessionConfig {
                vi_mode: args.vi,
                history_file: args.history,
                startup_paths: args.startup,
                ..SessionConfig::default()
            };
            Session::with_config(config)?.run()?;
        }
    }

    Ok(())
}
