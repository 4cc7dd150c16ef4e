use std::fmt::Display;
use std::rc::Rc;

use crate::prelude::*;

/// Name under which every function can reach itself.
pub const RECURSE: &str = "recurse";
pub const THIS: &str = "this";

/// A function value. It owns its own duplicate of the body it was created
/// from, never a pointer into the parsed program.
#[derive(Debug, Clone, PartialEq)]
pub struct ToyFunction {
    params: Vec<String>,
    body: Vec<Stmt>,
}

impl ToyFunction {
    pub fn new(params: Vec<String>, body: &[Stmt]) -> Self {
        Self { params, body: body.to_vec() }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    /// Run the function in a fresh scope with no enclosing scope. `this` is
    /// the slot of the receiver when called as a method; binding it to the
    /// slot itself lets the body mutate the receiver.
    pub fn call(
        self: &Rc<Self>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        this: Option<Shared<Value>>,
        line: i32,
    ) -> Result<Value, RuntimeError> {
        if arguments.len() != self.arity() {
            return Err(RuntimeError::ArityMismatch {
                line,
                expected: self.arity(),
                received: arguments.len(),
            });
        }

        let mut environment = Environment::new();
        for (param, argument) in self.params.iter().zip(arguments) {
            environment.define(&Token::identifier(param, line), argument)?;
        }

        if let Some(this) = this {
            environment.define_slot(&Token::identifier(THIS, line), this)?;
        }

        environment.define(&Token::identifier(RECURSE, line), Value::Function(self.clone()))?;

        tracing::trace!(arity = self.arity(), line, "calling function");

        let returned = interpreter.execute_call(&self.body, environment.as_shared(), line)?;
        Ok(returned.unwrap_or_default())
    }
}

impl Display for ToyFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "function({}) {{...}}", self.params.join(","))
    }
}
