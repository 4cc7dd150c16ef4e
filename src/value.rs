use std::cell::RefCell;
use std::fmt::{Debug, Display};
use std::rc::Rc;

use crate::prelude::*;

/// Longest chain of references followed before giving up. Only reachable
/// through a cycle such as `a = &a`.
pub const MAX_REFERENCE_DEPTH: usize = 1024;

const MAX_DISPLAY_DEPTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Reference(Reference),
    Function(Rc<ToyFunction>),
    Class(Rc<ClassTemplate>),
    Object(Object),
}

/// A handle to a storage slot. Cloning a reference aliases the slot, it
/// never copies the value behind it.
#[derive(Clone)]
pub struct Reference(Shared<Value>);

impl Reference {
    pub fn new(slot: Shared<Value>) -> Self {
        Self(slot)
    }

    pub fn target(&self) -> Shared<Value> {
        self.0.clone()
    }

    /// Copy of the value the slot currently holds.
    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = value;
    }

    pub fn points_to(&self, slot: &Shared<Value>) -> bool {
        Rc::ptr_eq(&self.0, slot)
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reference({:p})", Rc::as_ptr(&self.0))
    }
}

pub fn new_slot(value: Value) -> Shared<Value> {
    Rc::new(RefCell::new(value))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Boolean(left), Self::Boolean(right)) => left == right,
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::String(left), Self::String(right)) => left == right,
            (Self::Array(left), Self::Array(right)) => left == right,
            (Self::Reference(left), Self::Reference(right)) => left == right,
            (Self::Function(left), Self::Function(right)) => {
                Rc::ptr_eq(left, right) || left == right
            }
            (Self::Class(left), Self::Class(right)) => Rc::ptr_eq(left, right) || left == right,
            (Self::Object(left), Self::Object(right)) => left.members == right.members,
            _ => false,
        }
    }
}

impl Value {
    pub fn number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// `undefined` and `false` are falsy, everything else is truthy.
    /// Callers dereference first.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Undefined | Self::Boolean(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Reference(_) => "reference",
            Self::Function(_) => "function",
            Self::Class(_) => "class",
            Self::Object(_) => "object",
        }
    }
}

/// Follow references until a non-reference value is reached.
pub fn dereference(value: Value, line: i32) -> Result<Value, RuntimeError> {
    let mut value = value;
    for _ in 0..MAX_REFERENCE_DEPTH {
        match value {
            Value::Reference(reference) => value = reference.get(),
            other => return Ok(other),
        }
    }

    Err(RuntimeError::ReferenceDepth { line })
}

/// Follow references starting at a slot and return the last slot in the
/// chain, the one holding a non-reference value.
pub fn resolve_slot(slot: Shared<Value>, line: i32) -> Result<Shared<Value>, RuntimeError> {
    let mut slot = slot;
    for _ in 0..MAX_REFERENCE_DEPTH {
        let next = match &*slot.borrow() {
            Value::Reference(reference) => Some(reference.target()),
            _ => None,
        };

        match next {
            Some(next) => slot = next,
            None => return Ok(slot),
        }
    }

    Err(RuntimeError::ReferenceDepth { line })
}

fn write_value(f: &mut std::fmt::Formatter<'_>, value: &Value, depth: usize) -> std::fmt::Result {
    if depth > MAX_DISPLAY_DEPTH {
        return write!(f, "...");
    }

    match value {
        Value::Undefined => write!(f, "undefined"),
        Value::Boolean(b) => write!(f, "{b}"),
        Value::Number(n) => write!(f, "{n}"),
        Value::String(s) => write!(f, "{s}"),
        Value::Array(items) => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write_value(f, item, depth + 1)?;
            }
            write!(f, "]")
        }
        Value::Reference(reference) => {
            write!(f, "&")?;
            write_value(f, &reference.get(), depth + 1)
        }
        Value::Function(function) => write!(f, "{function}"),
        Value::Class(class) => {
            write!(f, "class {{")?;
            write_members(f, class.members(), depth)?;
            write!(f, "}}")
        }
        Value::Object(object) => {
            write!(f, "object {{")?;
            write_members(f, &object.members, depth)?;
            write!(f, "}}")
        }
    }
}

fn write_members(f: &mut std::fmt::Formatter<'_>, members: &Members, depth: usize) -> std::fmt::Result {
    for (i, (name, value)) in members.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{name}:")?;
        write_value(f, value, depth + 1)?;
    }
    Ok(())
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_value(f, self, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_numbers_without_trailing_zeroes() {
        assert_eq!(Value::Number(42.0).to_string(), "42");
        assert_eq!(Value::Number(42.5).to_string(), "42.5");
    }

    #[test]
    fn display_arrays_and_references() {
        let array = Value::Array(vec![
            Value::Number(1.0),
            Value::String("two".to_owned()),
            Value::Undefined,
        ]);
        assert_eq!(array.to_string(), "[1,two,undefined]");

        let slot = new_slot(Value::Number(42.0));
        let reference = Value::Reference(Reference::new(slot.clone()));
        assert_eq!(reference.to_string(), "&42");

        let double = Value::Reference(Reference::new(new_slot(reference)));
        assert_eq!(double.to_string(), "&&42");
    }

    #[test]
    fn display_of_a_reference_cycle_terminates() {
        let slot = new_slot(Value::Undefined);
        *slot.borrow_mut() = Value::Reference(Reference::new(slot.clone()));
        let text = slot.borrow().to_string();
        assert!(text.ends_with("..."));
    }

    #[test]
    fn cloning_a_reference_aliases_the_slot() {
        let slot = new_slot(Value::Number(1.0));
        let reference = Reference::new(slot.clone());
        let alias = reference.clone();

        alias.set(Value::Number(2.0));

        assert_eq!(reference.get(), Value::Number(2.0));
        assert!(reference.points_to(&slot));
    }

    #[test]
    fn cloning_an_array_copies_it() {
        let original = Value::Array(vec![Value::Number(1.0)]);
        let mut copy = original.clone();
        if let Value::Array(items) = &mut copy {
            items[0] = Value::Number(9.0);
        }
        assert_eq!(original, Value::Array(vec![Value::Number(1.0)]));
    }

    #[test]
    fn dereference_walks_chains() {
        let inner = new_slot(Value::Boolean(true));
        let outer = new_slot(Value::Reference(Reference::new(inner)));
        let value = Value::Reference(Reference::new(outer));
        assert_eq!(dereference(value, 1).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn dereference_of_a_cycle_fails() {
        let slot = new_slot(Value::Undefined);
        *slot.borrow_mut() = Value::Reference(Reference::new(slot.clone()));
        let value = slot.borrow().clone();
        assert!(matches!(dereference(value, 3), Err(RuntimeError::ReferenceDepth { line: 3 })));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
    }
}
