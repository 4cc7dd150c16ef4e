#![allow(clippy::new_without_default)]

mod ast;
mod class;
mod environment;
mod error;
mod func;
mod interpreter;
mod parser;
mod printer;
mod scanner;
mod token;
mod value;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::class::*;
    pub use crate::environment::Environment;
    pub use crate::error::*;
    pub use crate::func::*;
    pub use crate::interpreter::*;
    pub use crate::parser::*;
    pub use crate::printer::AstPrinter;
    pub use crate::scanner::*;
    pub use crate::token::*;
    pub use crate::value::*;
    pub use crate::Shared;
}

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use prelude::{Interpreter, Parser, ParserError, RuntimeError, Scanner, ScannerError, TokenType};

pub type Shared<T> = Rc<RefCell<T>>;
pub type SharedErrorReporter = Shared<ErrorReporter>;

/// An interpreter together with the sink its diagnostics go to.
pub struct Toy {
    interpreter: Interpreter,
    error_reporter: SharedErrorReporter,
}

impl Toy {
    pub fn new() -> Self {
        let error_reporter = Rc::new(RefCell::new(ErrorReporter::default()));

        Self {
            interpreter: Interpreter::new().with_error_reporting(error_reporter.clone()),
            error_reporter,
        }
    }
}

impl Toy {
    pub fn run_file(&mut self, filename: &Path) -> Result<(), anyhow::Error> {
        let content = std::fs::read_to_string(filename)?;
        self.interpreter.set_script_path(filename);
        self.run(&content);
        Ok(())
    }

    /// Scan, parse and run `source`. Errors are reported to the sink, nothing
    /// is returned here.
    pub fn run(&mut self, source: &str) {
        run_source(&mut self.interpreter, source);
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    pub fn error_reporter(&self) -> SharedErrorReporter {
        self.error_reporter.clone()
    }

    /// Forget earlier errors, e.g. between two REPL lines.
    pub fn reset_errors(&mut self) {
        self.error_reporter.borrow_mut().reset();
        self.interpreter.resume();
    }
}

/// Run a whole program on `interpreter`. Nothing executes if the source has
/// a syntax error.
pub(crate) fn run_source(interpreter: &mut Interpreter, source: &str) {
    let error_reporter = interpreter.error_reporter();

    let tokens = match Scanner::new(source).scan_tokens() {
        Ok(tokens) => tokens,
        Err(errors) => {
            print_scanner_errors(&mut error_reporter.borrow_mut(), &errors);
            return;
        }
    };

    let statements = match Parser::new(tokens).parse() {
        Ok(stmts) => stmts,
        Err(errors) => {
            print_parser_errors(&mut error_reporter.borrow_mut(), &errors);
            return;
        }
    };

    tracing::trace!(statements = statements.len(), "parsed");
    interpreter.interpret(&statements);
}

fn print_scanner_errors(reporter: &mut ErrorReporter, errors: &[ScannerError]) {
    errors.iter().for_each(|e| reporter.error(e.line, &e.message));
}

fn print_parser_errors(reporter: &mut ErrorReporter, errors: &[ParserError]) {
    for e in errors {
        if e.token.token_type == TokenType::EOF {
            reporter.report(e.token.line, "at end", &e.message);
        } else {
            reporter.report(e.token.line, &format!("at '{}'", e.token.lexeme), &e.message);
        }
    }
}

#[derive(Debug, Default)]
pub struct ErrorReporter {
    pub had_error: bool,
    pub had_runtime_error: bool,
    error_count: usize,
}

impl ErrorReporter {
    pub fn error(&mut self, line: i32, message: &str) {
        self.report(line, "", message);
    }

    pub fn report(&mut self, line: i32, location: &str, message: &str) {
        if location.is_empty() {
            eprintln!("[line {line}] Error: {message}");
        } else {
            eprintln!("[line {line}] Error {location}: {message}");
        }

        self.had_error = true;
        self.error_count += 1;
    }

    pub fn runtime_error(&mut self, e: &RuntimeError) {
        eprintln!("{e}");
        self.had_runtime_error = true;
        self.error_count += 1;
    }

    /// Number of errors reported since the last `reset`.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
