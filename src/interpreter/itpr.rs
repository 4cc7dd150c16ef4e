use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::prelude::*;
use crate::{ErrorReporter, SharedErrorReporter};

pub type InterpreterResult = Result<Value, RuntimeError>;

/// Nested function calls allowed before the interpreter gives up.
pub const MAX_CALL_DEPTH: usize = 256;

/// Remaining native stack below which evaluation continues on a new segment.
const RED_ZONE: usize = 100 * 1024;

/// Size of each stack segment allocated past the red zone.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Flag that, once set with `use panic;`, stops execution after the first error.
pub const PANIC_FLAG: &str = "panic";

/// Pending non-local control flow. At most one of the requests is honored at
/// a time; enclosing loops and calls consume them.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct Signals {
    pub break_requested: bool,
    pub continue_requested: bool,
    pub return_requested: bool,
    pub loop_depth: usize,
}

impl Signals {
    /// True if the rest of the current block must be skipped.
    pub fn interrupted(&self) -> bool {
        self.break_requested || self.continue_requested || self.return_requested
    }
}

pub struct Interpreter {
    pub(super) globals: Shared<Environment>,
    pub(super) environment: Shared<Environment>,
    pub(super) signals: Signals,
    pub(super) result: Value,
    pub(super) flags: HashMap<String, bool>,
    pub(super) module_root: PathBuf,
    pub(super) module_stack: Vec<PathBuf>,
    halted: bool,
    call_depth: usize,
    error_reporter: SharedErrorReporter,
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Environment::new().as_shared();
        let environment = globals.clone();

        Self {
            globals,
            environment,
            signals: Signals::default(),
            result: Value::Undefined,
            flags: HashMap::new(),
            module_root: PathBuf::from("."),
            module_stack: vec![],
            halted: false,
            call_depth: 0,
            error_reporter: Rc::new(RefCell::new(ErrorReporter::default())),
        }
    }

    pub fn with_error_reporting(self, error_reporter: SharedErrorReporter) -> Self {
        Self { error_reporter, ..self }
    }

    /// Directory against which `use "path";` is resolved.
    pub fn with_module_root(self, root: impl Into<PathBuf>) -> Self {
        Self { module_root: root.into(), ..self }
    }

    /// Mark `path` as the running script. Modules resolve next to it and a
    /// module importing it back is reported as circular.
    pub fn set_script_path(&mut self, path: &Path) {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(parent) = path.parent() {
            self.module_root = parent.to_path_buf();
        }
        self.module_stack = vec![path];
    }

    pub fn error_reporter(&self) -> SharedErrorReporter {
        self.error_reporter.clone()
    }

    pub fn globals(&self) -> Shared<Environment> {
        self.globals.clone()
    }

    pub fn environment(&self) -> Shared<Environment> {
        self.environment.clone()
    }

    /// True if the last top-level statement was a `return`.
    pub fn was_return_triggered(&self) -> bool {
        self.signals.return_requested
    }

    /// Value of the last expression statement or top-level `return`.
    pub fn last_result(&self) -> Value {
        self.result.clone()
    }

    pub fn get_flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.flags.insert(name.to_owned(), value);
    }

    /// True once an error has stopped this interpreter for good.
    pub fn has_panicked(&self) -> bool {
        self.halted
    }

    /// Accept statements again after a panic.
    pub fn resume(&mut self) {
        self.halted = false;
    }
}

impl Interpreter {
    /// Run a program. A runtime error is reported and execution continues
    /// with the next statement, unless the `panic` flag is set. A top-level
    /// `return` stops the program.
    pub fn interpret(&mut self, statements: &[Stmt]) {
        let baseline = self.error_reporter.borrow().error_count();

        for stmt in statements {
            if self.halted {
                break;
            }

            if self.get_flag(PANIC_FLAG) && self.error_reporter.borrow().error_count() > baseline {
                self.halted = true;
                break;
            }

            self.execute(stmt);

            if self.was_return_triggered() {
                break;
            }
        }
    }

    /// Run a single top-level statement and report its error, if any.
    pub fn execute(&mut self, stmt: &Stmt) {
        if let Err(e) = self.try_execute(stmt) {
            tracing::debug!(error = %e, "statement failed");

            if matches!(e, RuntimeError::ModulePanic { .. }) {
                self.halted = true;
            }

            self.runtime_error(&e);
        }
    }

    /// Run a single top-level statement and hand back its error.
    pub fn try_execute(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        tracing::trace!(statement = %AstPrinter::stmt_to_string(stmt), "executing");

        self.signals = Signals::default();
        self.result = Value::Undefined;
        self.execute_stmt(stmt)
    }

    /// Run a function body in its own scope. Returns the value of a `return`
    /// if the body executed one.
    pub(crate) fn execute_call(
        &mut self,
        statements: &[Stmt],
        environment: Shared<Environment>,
        line: i32,
    ) -> Result<Option<Value>, RuntimeError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::StackOverflow { line });
        }

        self.call_depth += 1;
        let returned = ensure_sufficient_stack(|| self.execute_isolated(statements, environment));
        self.call_depth -= 1;

        returned
    }

    /// Run statements with fresh signals so nothing leaks in or out of the
    /// body: a `break` inside can't reach a loop outside.
    pub(crate) fn execute_isolated(
        &mut self,
        statements: &[Stmt],
        environment: Shared<Environment>,
    ) -> Result<Option<Value>, RuntimeError> {
        let signals = std::mem::take(&mut self.signals);
        let result = std::mem::take(&mut self.result);

        let outcome = self.execute_block(statements, environment);
        let returned =
            if self.signals.return_requested { Some(std::mem::take(&mut self.result)) } else { None };

        self.signals = signals;
        self.result = result;

        outcome.map(|()| returned)
    }

    pub(super) fn is_truthy(&self, value: Value, line: i32) -> Result<bool, RuntimeError> {
        Ok(dereference(value, line)?.is_truthy())
    }

    fn runtime_error(&self, e: &RuntimeError) {
        self.error_reporter.borrow_mut().runtime_error(e);
    }
}

/// Script recursion is native recursion here. Grow the stack on demand so
/// deep scripts hit `MAX_CALL_DEPTH` instead of the end of the thread's stack.
pub(super) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Stmt> {
        let tokens = Scanner::new(source).scan_tokens().expect("failed to scan the source");
        Parser::new(tokens).parse().expect("failed to parse the source")
    }

    fn make_expression(source: &str) -> Expr {
        let stmt = parse(source).pop().expect("no statement was created");

        match stmt {
            Stmt::Expression { expr } => expr,
            _ => panic!("statement is not an expression"),
        }
    }

    fn run(source: &str) -> Interpreter {
        let mut ipr = Interpreter::new();
        ipr.interpret(&parse(source));
        ipr
    }

    fn first_error(source: &str) -> RuntimeError {
        let mut ipr = Interpreter::new();
        for stmt in parse(source) {
            if let Err(e) = ipr.try_execute(&stmt) {
                return e;
            }
        }
        panic!("no error was raised");
    }

    macro_rules! assert_literal {
        ($source:literal, $expected:expr, $lit_type:path) => {
            let mut ipr = Interpreter::new();
            let expr = make_expression($source);
            let res = ipr.evaluate_expr(&expr);
            assert!(res.is_ok(), "{res:?}");
            assert_eq!(res.unwrap(), $lit_type($expected));
        };
    }

    macro_rules! assert_number {
        ($source:literal, $expected:expr) => {
            assert_literal!($source, $expected, Value::Number);
        };
    }

    macro_rules! assert_string {
        ($source:literal, $expected:expr) => {
            assert_literal!($source, $expected, Value::String);
        };
    }

    macro_rules! assert_boolean {
        ($source:literal, $expected:expr) => {
            assert_literal!($source, $expected, Value::Boolean);
        };
    }

    #[test]
    fn unary_minus() {
        assert_number!("-3.14;", -3.14);
    }

    #[test]
    fn unary_bang() {
        assert_boolean!("!true;", false);
        assert_boolean!("!undefined;", true);
        assert_boolean!("!0;", false);
    }

    #[test]
    fn binary_plus_numbers() {
        assert_number!("10 + 20;", 30.0);
    }

    #[test]
    fn binary_plus_strings() {
        assert_string!(r#" "Hello " + "World!"; "#, "Hello World!".to_string());
    }

    #[test]
    fn binary_arithmetic() {
        assert_number!("10 - 20;", -10.0);
        assert_number!("10 * 20;", 200.0);
        assert_number!("10 / 20;", 0.5);
        assert_number!("2 + 3 * 4;", 14.0);
    }

    #[test]
    fn binary_comparison() {
        assert_boolean!("10 > 20;", false);
        assert_boolean!("20 >= 20;", true);
        assert_boolean!("10 < 20;", true);
        assert_boolean!("20 <= 10;", false);
    }

    #[test]
    fn equality() {
        assert_boolean!("10 == 10;", true);
        assert_boolean!("10 != 20;", true);
        assert_boolean!(r#" "a" == "a"; "#, true);
        assert_boolean!("undefined == undefined;", true);
        assert_boolean!("undefined == false;", false);
        assert_boolean!("1 == true;", true);
        assert_boolean!(r#" 1 == "1"; "#, false);
        assert_boolean!("[1] == [1];", false);
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_number!("undefined or 7;", 7.0);
        assert_boolean!("false and 7;", false);
        assert_string!(r#" "x" or 7; "#, "x".to_string());
    }

    #[test]
    fn plus_mixing_types_is_a_type_error() {
        let err = first_error(r#"1 + "a";"#);
        assert_eq!(
            err,
            RuntimeError::type_error(1, "Operands of '+' must be both numbers or both strings")
        );
    }

    #[test]
    fn last_result_is_the_last_expression() {
        let ipr = run("var a = 2; a * 21;");
        assert_eq!(ipr.last_result(), Value::Number(42.0));
        assert!(!ipr.was_return_triggered());
    }

    #[test]
    fn top_level_return_stops_the_program() {
        let ipr = run("var a = 1; return a + 1; a = 5;");
        assert!(ipr.was_return_triggered());
        assert_eq!(ipr.last_result(), Value::Number(2.0));
        assert_eq!(ipr.globals().borrow().get(&Token::identifier("a", 1)).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn errors_do_not_stop_the_program_without_panic() {
        let ipr = run("var a = 1; b = 2; a = 3;");
        assert_eq!(ipr.error_reporter().borrow().error_count(), 1);
        assert_eq!(ipr.globals().borrow().get(&Token::identifier("a", 1)).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn panic_flag_stops_after_the_first_error() {
        let ipr = run("use panic; var a = 1; b = 2; a = 3;");
        assert!(ipr.get_flag(PANIC_FLAG));
        assert!(ipr.has_panicked());
        assert_eq!(ipr.globals().borrow().get(&Token::identifier("a", 1)).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn break_outside_a_loop() {
        let err = first_error("break;");
        assert_eq!(
            err,
            RuntimeError::ControlFlowError { line: 1, keyword: "Break".to_owned(), depth: 0 }
        );
    }

    #[test]
    fn break_does_not_cross_a_function_boundary() {
        let err = first_error("var f = function() { break; }; while (true) { f(); }");
        assert!(matches!(err, RuntimeError::ControlFlowError { depth: 0, .. }));
    }

    #[test]
    fn unbounded_recursion_overflows() {
        let err = first_error("var f = function() { return recurse(); }; f();");
        assert_eq!(err, RuntimeError::StackOverflow { line: 1 });
    }

    #[test]
    fn failed_block_restores_the_scope() {
        let mut ipr = Interpreter::new();
        let stmts = parse("var a = 1; { var a = 2; b; }");
        for stmt in &stmts {
            ipr.execute(stmt);
        }
        assert!(Rc::ptr_eq(&ipr.environment(), &ipr.globals()));
    }
}
