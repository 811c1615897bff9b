use std::{path::PathBuf, process::ExitCode};

use bfir::backend::{emit, EmitError, TranslatorConfig, DEFAULT_CELL_COUNT};
use clap::Parser;
use colored::Colorize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
enum UsageError {
    #[error("failed to open {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Translate a brainfuck program into Cranelift IR
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The brainfuck source file
    file: PathBuf,

    /// Number of cells on the tape
    #[arg(long, default_value_t = DEFAULT_CELL_COUNT)]
    cells: u32,

    /// Log more (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<String, CliError> {
    let source =
        std::fs::read(&args.file).map_err(|source| UsageError::Unreadable {
            path: args.file.display().to_string(),
            source,
        })?;
    info!(path = %args.file.display(), bytes = source.len(), "read source");

    let config = TranslatorConfig {
        cells: args.cells,
        module_name: args.file.display().to_string(),
    };

    Ok(emit(&source, &config)?.text)
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // usage errors exit 1, not clap's 2; help and version exit 0
            let printed = err.print();
            return if printed.is_ok() && !err.use_stderr() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    init_logging(args.verbose);

    match run(&args) {
        Ok(text) => {
            print!("{}", text);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {}", "error".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
