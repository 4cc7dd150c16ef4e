use super::itpr::ensure_sufficient_stack;
use crate::prelude::*;

impl Interpreter {
    /// Run `statements` inside `environment`. The previous scope is restored
    /// whether the block finishes, is interrupted or fails.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Shared<Environment>,
    ) -> Result<(), RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = self.execute_statements(statements);
        self.environment = previous;
        result
    }

    fn execute_statements(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            self.execute_stmt(stmt)?;

            if self.signals.interrupted() {
                break;
            }
        }

        Ok(())
    }

    pub(super) fn execute_stmt(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        ensure_sufficient_stack(|| self.execute_stmt_inner(stmt))
    }

    fn execute_stmt_inner(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        match stmt {
            Stmt::Expression { expr } => {
                self.result = self.evaluate_expr(expr)?;
            }
            Stmt::Print { exprs } => {
                let mut line = String::new();
                for expr in exprs {
                    let value = self.evaluate_expr(expr)?;
                    line.push_str(&value.to_string());
                }

                println!("{line}");
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate_expr(expr)?,
                    None => Value::Undefined,
                };

                self.environment.borrow_mut().define(name, value)?;
            }
            Stmt::Block { statements } => {
                // Create a new environment for executing the block
                let new_env =
                    Environment::new().with_enclosing(self.environment.clone()).as_shared();

                self.execute_block(statements, new_env)?;
            }
            Stmt::If { condition, then_branch, else_branch } => {
                let value = self.evaluate_expr(condition)?;

                if self.is_truthy(value, condition.line())? {
                    self.execute_stmt(then_branch)?;
                } else if let Some(stmt) = else_branch {
                    self.execute_stmt(stmt)?;
                }
            }
            Stmt::While { condition, body, increment } => {
                self.signals.loop_depth += 1;
                let result = self.execute_loop(condition, body, increment.as_ref());
                self.signals.loop_depth -= 1;

                result?;
            }
            Stmt::Break { token } => {
                self.check_loop_depth("Break", token)?;
                self.signals.break_requested = true;
            }
            Stmt::Continue { token } => {
                self.check_loop_depth("Continue", token)?;
                self.signals.continue_requested = true;
            }
            Stmt::Return { value, .. } => {
                self.result = match value {
                    Some(expr) => self.evaluate_expr(expr)?,
                    None => Value::Undefined,
                };
                self.signals.return_requested = true;
            }
            Stmt::Use { command } => self.execute_use(command)?,
        }

        Ok(())
    }

    fn execute_loop(
        &mut self,
        condition: &Expr,
        body: &Stmt,
        increment: Option<&Expr>,
    ) -> Result<(), RuntimeError> {
        loop {
            if self.signals.break_requested {
                self.signals.break_requested = false;
                break;
            }

            // Leave the flag set, the enclosing call consumes it
            if self.signals.return_requested {
                break;
            }

            self.signals.continue_requested = false;

            let value = self.evaluate_expr(condition)?;
            if !self.is_truthy(value, condition.line())? {
                break;
            }

            self.execute_stmt(body)?;

            if let Some(increment) = increment {
                if !self.signals.break_requested && !self.signals.return_requested {
                    self.evaluate_expr(increment)?;
                }
            }
        }

        Ok(())
    }

    fn check_loop_depth(&self, keyword: &str, token: &Token) -> Result<(), RuntimeError> {
        if self.signals.loop_depth == 0 {
            return Err(RuntimeError::ControlFlowError {
                line: token.line,
                keyword: keyword.to_owned(),
                depth: self.signals.loop_depth,
            });
        }

        Ok(())
    }

    fn execute_use(&mut self, command: &Token) -> Result<(), RuntimeError> {
        match (&command.token_type, &command.literal) {
            (TokenType::Identifier, _) => {
                tracing::debug!(flag = %command.lexeme, "flag set");
                self.set_flag(&command.lexeme, true);
                Ok(())
            }
            (TokenType::StringLiteral, Some(Value::String(path))) => {
                self.load_module(path, command.line)
            }
            _ => Err(RuntimeError::type_error(
                command.line,
                format!("Can't use '{}'", command.lexeme),
            )),
        }
    }
}
