use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::prelude::*;

/// One lexical scope. Each binding lives in its own shared slot so that a
/// `Reference` taken with `&` stays valid after the scope is dropped.
#[derive(Debug, Default)]
pub struct Environment {
    pub enclosing: Option<Shared<Environment>>,
    values: HashMap<String, Shared<Value>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(self, enclosing: Shared<Environment>) -> Self {
        Self { enclosing: Some(enclosing), ..self }
    }

    pub fn as_shared(self) -> Shared<Self> {
        Rc::new(RefCell::new(self))
    }

    /// Redeclaration is checked against this scope only; shadowing a name
    /// from an enclosing scope is allowed.
    pub fn define(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        self.define_slot(name, new_slot(value))
    }

    /// Bind `name` to an existing slot, so the binding aliases it.
    pub fn define_slot(&mut self, name: &Token, slot: Shared<Value>) -> Result<(), RuntimeError> {
        if self.values.contains_key(&name.lexeme) {
            return Err(RuntimeError::DuplicateName { line: name.line, name: name.lexeme.clone() });
        }

        self.values.insert(name.lexeme.clone(), slot);
        Ok(())
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get(&name.lexeme) {
            *slot.borrow_mut() = value;
            return Ok(());
        }

        // Ask one level above if possible
        match self.enclosing {
            Some(ref enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(undeclared(name)),
        }
    }

    /// Returns a copy of the bound value, never the slot itself.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        self.get_location(name).map(|slot| slot.borrow().clone())
    }

    /// Returns the storage slot bound to `name`, for `&`.
    pub fn get_location(&self, name: &Token) -> Result<Shared<Value>, RuntimeError> {
        if let Some(slot) = self.values.get(&name.lexeme) {
            return Ok(slot.clone());
        }

        match self.enclosing {
            Some(ref enclosing) => enclosing.borrow().get_location(name),
            None => Err(undeclared(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Copy every binding of `other` into this scope. If any name already
    /// exists here nothing is copied.
    pub fn absorb(&mut self, other: &Environment, line: i32) -> Result<(), RuntimeError> {
        let mut names = other.values.keys().collect::<Vec<_>>();
        names.sort();

        if let Some(name) = names.iter().find(|name| self.values.contains_key(name.as_str())) {
            return Err(RuntimeError::DuplicateName { line, name: name.to_string() });
        }

        for name in names {
            let value = other.values[name].borrow().clone();
            self.define(&Token::identifier(name, line), value)?;
        }

        Ok(())
    }

    /// Copies of this scope's own bindings, without the enclosing scopes.
    pub fn bindings(&self) -> Members {
        self.values.iter().map(|(name, slot)| (name.clone(), slot.borrow().clone())).collect()
    }
}

fn undeclared(name: &Token) -> RuntimeError {
    RuntimeError::UndeclaredName { line: name.line, name: name.lexeme.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Token {
        Token::identifier(s, 1)
    }

    #[test]
    fn redeclaration_in_the_same_scope_fails() {
        let mut env = Environment::new();
        env.define(&name("a"), Value::Number(1.0)).unwrap();

        let err = env.define(&name("a"), Value::Number(2.0)).unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateName { .. }));
    }

    #[test]
    fn shadowing_an_enclosing_name_is_allowed() {
        let globals = Environment::new().as_shared();
        globals.borrow_mut().define(&name("x"), Value::Number(1.0)).unwrap();

        let mut inner = Environment::new().with_enclosing(globals.clone());
        inner.define(&name("x"), Value::Number(2.0)).unwrap();

        assert_eq!(inner.get(&name("x")).unwrap(), Value::Number(2.0));
        assert_eq!(globals.borrow().get(&name("x")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_walks_the_chain() {
        let globals = Environment::new().as_shared();
        globals.borrow_mut().define(&name("x"), Value::Number(1.0)).unwrap();

        let mut inner = Environment::new().with_enclosing(globals.clone());
        inner.assign(&name("x"), Value::Number(5.0)).unwrap();

        assert!(!inner.contains("x"));
        assert_eq!(globals.borrow().get(&name("x")).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn undeclared_names_fail() {
        let mut env = Environment::new().with_enclosing(Environment::new().as_shared());
        assert!(matches!(env.get(&name("nope")), Err(RuntimeError::UndeclaredName { .. })));
        assert!(matches!(
            env.assign(&name("nope"), Value::Undefined),
            Err(RuntimeError::UndeclaredName { .. })
        ));
        assert!(matches!(env.get_location(&name("nope")), Err(RuntimeError::UndeclaredName { .. })));
    }

    #[test]
    fn get_returns_a_copy() {
        let mut env = Environment::new();
        env.define(&name("a"), Value::Array(vec![Value::Number(1.0)])).unwrap();

        let mut copy = env.get(&name("a")).unwrap();
        if let Value::Array(items) = &mut copy {
            items.push(Value::Number(2.0));
        }

        assert_eq!(env.get(&name("a")).unwrap(), Value::Array(vec![Value::Number(1.0)]));
    }

    #[test]
    fn location_outlives_its_scope() {
        let slot = {
            let mut env = Environment::new();
            env.define(&name("a"), Value::Number(3.0)).unwrap();
            env.get_location(&name("a")).unwrap()
        };

        assert_eq!(*slot.borrow(), Value::Number(3.0));
    }

    #[test]
    fn absorb_copies_bindings_and_rejects_collisions() {
        let mut module = Environment::new();
        module.define(&name("a"), Value::Number(1.0)).unwrap();
        module.define(&name("b"), Value::Number(2.0)).unwrap();

        let mut importer = Environment::new();
        importer.absorb(&module, 4).unwrap();
        assert_eq!(importer.get(&name("b")).unwrap(), Value::Number(2.0));

        let err = importer.absorb(&module, 4).unwrap_err();
        assert_eq!(err, RuntimeError::DuplicateName { line: 4, name: "a".to_owned() });
    }

    #[test]
    fn failed_absorb_leaves_the_scope_unchanged() {
        let mut module = Environment::new();
        module.define(&name("a"), Value::Number(1.0)).unwrap();
        module.define(&name("z"), Value::Number(2.0)).unwrap();

        let mut importer = Environment::new();
        importer.define(&name("z"), Value::Number(9.0)).unwrap();

        let err = importer.absorb(&module, 3).unwrap_err();
        assert_eq!(err, RuntimeError::DuplicateName { line: 3, name: "z".to_owned() });
        assert!(!importer.contains("a"));
        assert_eq!(importer.get(&name("z")).unwrap(), Value::Number(9.0));
    }
}
