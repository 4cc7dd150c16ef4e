use std::path::PathBuf;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use toy::prelude::PANIC_FLAG;
use toy::Toy;

#[derive(Parser)]
#[command(name = "toy")]
#[command(version)]
#[command(about = "Tree-walking interpreter for the Toy scripting language", long_about = None)]
struct Cli {
    /// Scripts to run in order. Starts the REPL when none is given
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Stop at the first runtime error, as if every script began with `use panic;`
    #[arg(long)]
    panic: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let code = run(cli)?;
    std::process::exit(code);
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut toy = Toy::new();
    if cli.panic {
        toy.interpreter_mut().set_flag(PANIC_FLAG, true);
    }

    if cli.files.is_empty() {
        run_repl(&mut toy)?;
        return Ok(0);
    }

    for file in &cli.files {
        toy.run_file(file)?;

        // Indicate an error in the exit code
        let reporter = toy.error_reporter();
        let reporter = reporter.borrow();
        if reporter.had_error {
            return Ok(65);
        }
        if reporter.had_runtime_error {
            return Ok(70);
        }
    }

    Ok(0)
}

fn run_repl(toy: &mut Toy) -> anyhow::Result<()> {
    println!("Toy interpreter. Type :help for help, :quit to exit");

    let mut rl = DefaultEditor::new()?;

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":quit" | ":q" => break,
                    ":help" => {
                        print_repl_help();
                        continue;
                    }
                    _ => {}
                }

                toy.reset_errors();
                toy.run(line);
                echo_result(toy);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

fn echo_result(toy: &Toy) {
    let reporter = toy.error_reporter();
    if reporter.borrow().error_count() > 0 {
        return;
    }

    let interpreter = toy.interpreter();
    let result = interpreter.last_result();
    if interpreter.was_return_triggered() {
        println!("Final value: {result}");
    } else if !result.is_undefined() {
        println!("{result}");
    }
}

fn print_repl_help() {
    println!("Enter statements to run them, e.g. `var a = [1, 2]; print a[0];`");
    println!("  :help     - Show this help message");
    println!("  :quit, :q - Exit the REPL");
}
