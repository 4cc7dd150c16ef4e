use std::collections::BTreeMap;
use std::rc::Rc;

use crate::prelude::*;

pub type Members = BTreeMap<String, Value>;

/// Name of the member that, when it holds a function, runs on every new
/// object before the object is handed to the caller.
pub const CONSTRUCTOR: &str = "create";

/// Snapshot of the bindings a `class { ... }` body declared.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTemplate {
    members: Members,
}

impl ClassTemplate {
    pub fn new(members: Members) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &Members {
        &self.members
    }

    /// Build a new object from the template and run its constructor, if it
    /// has one, with `this` bound to the object. The result is the object,
    /// not whatever the constructor returned.
    pub fn construct(
        class: Rc<ClassTemplate>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: i32,
    ) -> Result<Value, RuntimeError> {
        let constructor = match class.members.get(CONSTRUCTOR) {
            Some(Value::Function(function)) => Some(function.clone()),
            _ => None,
        };

        let slot = new_slot(Value::Object(Object::new(class)));

        match constructor {
            Some(constructor) => {
                constructor.call(interpreter, arguments, Some(slot.clone()), line)?;
            }
            None if !arguments.is_empty() => {
                return Err(RuntimeError::ArityMismatch {
                    line,
                    expected: 0,
                    received: arguments.len(),
                });
            }
            None => {}
        }

        let object = slot.borrow().clone();
        Ok(object)
    }
}

/// A per-instance copy of a class template's members.
#[derive(Debug, Clone)]
pub struct Object {
    class: Option<Rc<ClassTemplate>>,
    pub members: Members,
}

impl Object {
    pub fn new(class: Rc<ClassTemplate>) -> Self {
        Self { members: class.members.clone(), class: Some(class) }
    }

    pub fn class(&self) -> Option<&Rc<ClassTemplate>> {
        self.class.as_ref()
    }

    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        self.members.get(&name.lexeme).cloned().ok_or_else(|| undefined_member(name))
    }

    pub fn get_mut(&mut self, name: &Token) -> Result<&mut Value, RuntimeError> {
        self.members.get_mut(&name.lexeme).ok_or_else(|| undefined_member(name))
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.members.insert(name.lexeme.clone(), value);
    }
}

fn undefined_member(name: &Token) -> RuntimeError {
    RuntimeError::UndefinedMember { line: name.line, name: name.lexeme.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_copy_the_template() {
        let mut members = Members::new();
        members.insert("value".to_owned(), Value::Number(1.0));
        let class = Rc::new(ClassTemplate::new(members));

        let mut object = Object::new(class.clone());
        object.set(&Token::identifier("value", 1), Value::Number(2.0));

        assert_eq!(class.members()["value"], Value::Number(1.0));
        assert_eq!(object.get(&Token::identifier("value", 1)).unwrap(), Value::Number(2.0));
        assert!(Rc::ptr_eq(object.class().unwrap(), &class));
    }

    #[test]
    fn missing_member() {
        let object = Object::new(Rc::new(ClassTemplate::new(Members::new())));
        let err = object.get(&Token::identifier("nope", 9)).unwrap_err();
        assert_eq!(err, RuntimeError::UndefinedMember { line: 9, name: "nope".to_owned() });
    }
}
