use std::path::Path;

use crate::prelude::*;

impl Interpreter {
    /// `use "path";` runs the file in an interpreter of its own and copies
    /// every global it declared into the current scope.
    pub(super) fn load_module(&mut self, path: &str, line: i32) -> Result<(), RuntimeError> {
        let io_error = |e: std::io::Error| RuntimeError::IoError {
            line,
            path: path.to_owned(),
            msg: e.to_string(),
        };

        let location = self.module_root.join(path).canonicalize().map_err(io_error)?;
        if self.module_stack.contains(&location) {
            return Err(RuntimeError::CircularModule { line, path: path.to_owned() });
        }

        let source = std::fs::read_to_string(&location).map_err(io_error)?;
        tracing::debug!(module = %location.display(), "loading module");

        let reporter = self.error_reporter();
        let errors_before = reporter.borrow().error_count();

        let mut module = Interpreter::new()
            .with_error_reporting(reporter.clone())
            .with_module_root(location.parent().unwrap_or(Path::new(".")));
        module.module_stack = self.module_stack.clone();
        module.module_stack.push(location);

        crate::run_source(&mut module, &source);

        let failed = reporter.borrow().error_count() > errors_before;
        if failed && module.get_flag(PANIC_FLAG) {
            return Err(RuntimeError::ModulePanic { line, path: path.to_owned() });
        }

        if module.was_return_triggered() {
            self.result = module.last_result();
        }

        let globals = module.globals();
        let globals = globals.borrow();
        self.environment.borrow_mut().absorb(&globals, line)
    }
}
