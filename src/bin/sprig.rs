use std::{fs, io, path::PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sprig::{
    repl::{format_result, with_quiet_panics},
    ExecutionContext, Interpreter, Repl, SprigError,
};

#[derive(Parser)]
#[command(author, version, about = "sprig language interpreter")]
struct Args {
    /// Log evaluation details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Start without the standard constants, forms and functions
    #[arg(long, global = true)]
    no_prelude: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a sprig script file and print its result
    Run { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of sprig code and print its result
    Eval { source: String },
}

fn main() -> Result<(), SprigError> {
    let args = Args::parse();
    init_logging(args.verbose);

    let context = ExecutionContext {
        prelude: !args.no_prelude,
        ..ExecutionContext::default()
    };
    let command = args.command.unwrap_or(Command::Repl);
    with_quiet_panics(|| run(command, context))
}

fn run(command: Command, context: ExecutionContext) -> Result<(), SprigError> {
    match command {
        Command::Run { script } => {
            let source = fs::read_to_string(&script)?;
            let interpreter = Interpreter::with_context(ExecutionContext {
                source_name: script.display().to_string(),
                ..context
            });
            println!("{}", format_result(&interpreter.execute(&source)?));
            Ok(())
        }
        Command::Repl => Repl::new(Interpreter::with_context(context)).run(),
        Command::Eval { source } => {
            let interpreter = Interpreter::with_context(context);
            println!("{}", format_result(&interpreter.execute(&source)?));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SPRIG_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
