//! `luna`: compiles and runs a single Luna source file.

mod builtins;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use luna_vm::{ExecutionLimits, Vm};

#[derive(Parser, Debug)]
#[command(name = "luna", version, about = "Run a Luna script")]
struct Cli {
    /// Path to the source file to run.
    source: PathBuf,

    /// Increase log verbosity (stackable: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli.source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("Error: {report}");
            ExitCode::FAILURE
        }
    }
}

fn run(source_path: &PathBuf) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(source_path)
        .map_err(|e| anyhow::anyhow!("cannot read '{}': {e}", source_path.display()))?;

    let mut vm = Vm::new(ExecutionLimits::default());
    let argv: Vec<String> = std::iter::once(source_path.display().to_string())
        .chain(std::env::args().skip(2))
        .collect();
    builtins::install(&mut vm, &argv);

    let executable = luna_compiler::compile(&source, &mut vm.state.heap)?;
    let resolved = std::fs::canonicalize(source_path).unwrap_or_else(|_| source_path.clone());
    let module = vm.state.heap.alloc_module(resolved.to_string_lossy().into_owned());

    vm.run(executable, module)?;
    Ok(())
}
