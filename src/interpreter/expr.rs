use std::rc::Rc;

use super::itpr::{ensure_sufficient_stack, InterpreterResult};
use crate::prelude::*;

impl Interpreter {
    pub fn evaluate_expr(&mut self, expr: &Expr) -> InterpreterResult {
        ensure_sufficient_stack(|| self.evaluate_expr_inner(expr))
    }

    fn evaluate_expr_inner(&mut self, expr: &Expr) -> InterpreterResult {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Grouping { expr: inner } => self.evaluate_expr(inner),
            Expr::Variable { name } => self.environment.borrow().get(name),
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),
            Expr::Binary { left, operator, right } => self.evaluate_binary(left, operator, right),
            Expr::Logical { left, operator, right } => {
                let left_val = self.evaluate_expr(left)?;
                let truthy = self.is_truthy(left_val.clone(), operator.line)?;

                if operator.token_type == TokenType::Or {
                    if truthy {
                        return Ok(left_val);
                    }
                } else if !truthy {
                    // TokenType::And
                    return Ok(left_val);
                }

                self.evaluate_expr(right)
            }
            Expr::Assignment { target, equals, value } => {
                self.evaluate_assignment(target, equals, value)
            }
            Expr::Array { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate_expr(element)?);
                }
                Ok(Value::Array(items))
            }
            Expr::Index { array, bracket, index } => self.evaluate_index(array, bracket, index),
            Expr::Call { callee, paren, arguments } => self.evaluate_call(callee, paren, arguments),
            Expr::Function { params, body, .. } => {
                let params = params.iter().map(|p| p.lexeme.clone()).collect();
                Ok(Value::Function(Rc::new(ToyFunction::new(params, body))))
            }
            Expr::Class { body, .. } => {
                // The body runs in a scope of its own, cut off from the caller
                let environment = Environment::new().as_shared();
                self.execute_isolated(body, environment.clone())?;

                let members = environment.borrow().bindings();
                Ok(Value::Class(Rc::new(ClassTemplate::new(members))))
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> InterpreterResult {
        match operator.token_type {
            TokenType::Ampersand => match right {
                Expr::Variable { name } => {
                    let slot = self.environment.borrow().get_location(name)?;
                    Ok(Value::Reference(Reference::new(slot)))
                }
                _ => Err(RuntimeError::InvalidTarget {
                    line: operator.line,
                    msg: "Can only take the address of a variable".to_owned(),
                }),
            },
            TokenType::Star => {
                let value = self.evaluate_expr(right)?;
                self.follow_references(value, operator, right)
            }
            TokenType::Minus => match dereference(self.evaluate_expr(right)?, operator.line)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::type_error(operator.line, "Can only negate a number")),
            },
            TokenType::Bang => {
                let value = self.evaluate_expr(right)?;
                Ok(Value::Boolean(!self.is_truthy(value, operator.line)?))
            }
            _ => Err(RuntimeError::type_error(
                operator.line,
                format!("Unexpected unary operator '{}'", operator.lexeme),
            )),
        }
    }

    /// Strip exactly as many references as the operator has stars.
    fn follow_references(&self, value: Value, operator: &Token, right: &Expr) -> InterpreterResult {
        let mut value = value;
        for level in 1..=Expr::star_count(operator) {
            value = match value {
                Value::Reference(reference) => reference.get(),
                _ => return Err(not_a_reference(operator.line, level, right)),
            };
        }

        Ok(value)
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> InterpreterResult {
        if operator.token_type == TokenType::Dot {
            let object = dereference(self.evaluate_expr(left)?, operator.line)?;
            return read_member(&object, operator, right);
        }

        let left_value = dereference(self.evaluate_expr(left)?, operator.line)?;
        let right_value = dereference(self.evaluate_expr(right)?, operator.line)?;

        match operator.token_type {
            TokenType::Plus => match (&left_value, &right_value) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                (Value::String(l), Value::String(r)) => Ok(Value::String(format!("{l}{r}"))),
                _ => Err(RuntimeError::type_error(
                    operator.line,
                    "Operands of '+' must be both numbers or both strings",
                )),
            },
            TokenType::Minus => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Value::Number(l - r)),
            TokenType::Star => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Value::Number(l * r)),
            TokenType::Slash => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Value::Number(l / r)),
            TokenType::Greater => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Value::Boolean(l > r)),
            TokenType::GreaterEqual => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Value::Boolean(l >= r)),
            TokenType::Less => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Value::Boolean(l < r)),
            TokenType::LessEqual => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Value::Boolean(l <= r)),

            TokenType::EqualEqual => Ok(Value::Boolean(is_equal(&left_value, &right_value))),
            TokenType::BangEqual => Ok(Value::Boolean(!is_equal(&left_value, &right_value))),

            _ => Err(RuntimeError::type_error(
                operator.line,
                format!("Unexpected binary operator '{}'", operator.lexeme),
            )),
        }
    }

    fn evaluate_index(&mut self, array: &Expr, bracket: &Token, index: &Expr) -> InterpreterResult {
        let mut items = match dereference(self.evaluate_expr(array)?, bracket.line)? {
            Value::Array(items) => items,
            other => return Err(not_an_array(bracket.line, &other)),
        };

        let index = dereference(self.evaluate_expr(index)?, bracket.line)?;
        let position = check_index(&index, items.len(), bracket.line)?;

        Ok(items.swap_remove(position))
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> InterpreterResult {
        // `recv.m(...)` binds `this` to the receiver's storage
        let (callee, this) = match callee {
            Expr::Binary { left, operator, right } if operator.token_type == TokenType::Dot => {
                let receiver = self.receiver_slot(left, operator.line)?;
                let member = read_member(&receiver.borrow(), operator, right)?;
                (member, Some(receiver))
            }
            _ => (self.evaluate_expr(callee)?, None),
        };

        // Evaluate all arguments
        let mut args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate_expr(arg)?);
        }

        match dereference(callee, paren.line)? {
            Value::Function(function) => function.call(self, args, this, paren.line),
            Value::Class(class) => ClassTemplate::construct(class, self, args, paren.line),
            other => Err(RuntimeError::NotCallable { line: paren.line, value: other.to_string() }),
        }
    }

    /// The slot a method call operates on. Named receivers are followed
    /// through references to the storage they alias; anything else gets a
    /// temporary slot.
    fn receiver_slot(&mut self, receiver: &Expr, line: i32) -> Result<Shared<Value>, RuntimeError> {
        match receiver {
            Expr::Variable { name } => {
                let slot = self.environment.borrow().get_location(name)?;
                resolve_slot(slot, line)
            }
            _ => Ok(new_slot(dereference(self.evaluate_expr(receiver)?, line)?)),
        }
    }

    fn evaluate_assignment(&mut self, target: &Expr, equals: &Token, value: &Expr) -> InterpreterResult {
        match target {
            Expr::Variable { name } => {
                let value = self.evaluate_expr(value)?;
                self.environment.borrow_mut().assign(name, value.clone())?;
                Ok(value)
            }
            Expr::Unary { operator, right } if operator.token_type == TokenType::Star => {
                self.assign_through_reference(operator, right, value)
            }
            Expr::Index { .. } => self.assign_to_place(target, equals, value),
            Expr::Binary { operator, .. } if operator.token_type == TokenType::Dot => {
                self.assign_to_place(target, equals, value)
            }
            _ => Err(RuntimeError::InvalidTarget {
                line: equals.line,
                msg: "Invalid assignment target".to_owned(),
            }),
        }
    }

    /// `a[i].m[j] = v`: walk from the storage of `a` down to the element or
    /// member and overwrite it there.
    fn assign_to_place(&mut self, target: &Expr, equals: &Token, value: &Expr) -> InterpreterResult {
        let mut path = vec![];
        let mut base = target;
        loop {
            match base {
                Expr::Index { array, bracket, index } => {
                    path.push(Place::Element { line: bracket.line, index: index.as_ref() });
                    base = array;
                }
                Expr::Binary { left, operator, right } if operator.token_type == TokenType::Dot => {
                    let Expr::Variable { name } = right.as_ref() else {
                        return Err(RuntimeError::type_error(operator.line, "Expect member name after '.'"));
                    };
                    path.push(Place::Member { line: operator.line, name });
                    base = left;
                }
                _ => break,
            }
        }

        let Expr::Variable { name } = base else {
            return Err(RuntimeError::InvalidTarget {
                line: equals.line,
                msg: "Can only assign to elements and members of a variable".to_owned(),
            });
        };
        let slot = self.environment.borrow().get_location(name)?;

        let mut resolved = Vec::with_capacity(path.len());
        for place in path.into_iter().rev() {
            resolved.push(match place {
                Place::Element { line, index } => {
                    Place::Element { line, index: dereference(self.evaluate_expr(index)?, line)? }
                }
                Place::Member { line, name } => Place::Member { line, name },
            });
        }

        let value = self.evaluate_expr(value)?;
        write_place(slot, &resolved, &value)?;
        Ok(value)
    }

    /// `*p = v`: overwrite the slot `p` points to, `**p = v` one further.
    fn assign_through_reference(
        &mut self,
        operator: &Token,
        right: &Expr,
        value: &Expr,
    ) -> InterpreterResult {
        let Expr::Variable { name } = right else {
            return Err(RuntimeError::InvalidTarget {
                line: operator.line,
                msg: "Can only assign through a dereferenced variable".to_owned(),
            });
        };

        let mut slot = self.environment.borrow().get_location(name)?;
        for level in 1..=Expr::star_count(operator) {
            let next = match &*slot.borrow() {
                Value::Reference(reference) => Some(reference.target()),
                _ => None,
            };

            slot = next.ok_or_else(|| not_a_reference(operator.line, level, right))?;
        }

        let value = self.evaluate_expr(value)?;
        *slot.borrow_mut() = value.clone();
        Ok(value)
    }
}

/// One step from a variable's storage towards the place being assigned.
/// `I` is the index expression until it is evaluated, then its value.
enum Place<'a, I> {
    Element { line: i32, index: I },
    Member { line: i32, name: &'a Token },
}

impl<I> Place<'_, I> {
    fn line(&self) -> i32 {
        match self {
            Place::Element { line, .. } | Place::Member { line, .. } => *line,
        }
    }
}

/// Store `value` at the end of `path`, starting at `slot`. A reference met on
/// the way continues the walk in the slot it points to.
fn write_place(slot: Shared<Value>, path: &[Place<Value>], value: &Value) -> Result<(), RuntimeError> {
    let mut slot = slot;
    let mut start = 0;

    loop {
        let line = path.get(start).map_or(0, Place::line);
        slot = resolve_slot(slot, line)?;

        let redirect = write_in_value(&mut slot.borrow_mut(), &path[start..], value)?;
        match redirect {
            Some((target, taken)) => {
                slot = target;
                start += taken;
            }
            None => return Ok(()),
        }
    }
}

/// Walk `path` inside a single value and store `value` at its end. Stops at
/// a reference and returns its slot along with the number of steps taken.
fn write_in_value(
    storage: &mut Value,
    path: &[Place<Value>],
    value: &Value,
) -> Result<Option<(Shared<Value>, usize)>, RuntimeError> {
    let mut current = storage;

    for (taken, place) in path.iter().enumerate() {
        if let Value::Reference(reference) = &*current {
            return Ok(Some((reference.target(), taken)));
        }

        let last = taken + 1 == path.len();
        current = match (place, current) {
            (Place::Element { line, index }, Value::Array(items)) => {
                let position = check_index(index, items.len(), *line)?;
                &mut items[position]
            }
            (Place::Member { name, .. }, Value::Object(object)) if last => {
                object.set(name, value.clone());
                return Ok(None);
            }
            (Place::Member { name, .. }, Value::Object(object)) => object.get_mut(name)?,
            (Place::Element { line, .. }, other) => return Err(not_an_array(*line, other)),
            (Place::Member { line, .. }, other) => {
                return Err(RuntimeError::type_error(
                    *line,
                    format!("Can only assign to members of objects, not {}", other.type_name()),
                ))
            }
        };
    }

    *current = value.clone();
    Ok(None)
}

fn read_member(object: &Value, operator: &Token, member: &Expr) -> InterpreterResult {
    let Expr::Variable { name } = member else {
        return Err(RuntimeError::type_error(operator.line, "Expect member name after '.'"));
    };

    match object {
        Value::Object(object) => object.get(name),
        other => Err(RuntimeError::type_error(
            operator.line,
            format!("Can only access members of objects, not {}", other.type_name()),
        )),
    }
}

fn check_number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64), RuntimeError> {
    if let (Some(l), Some(r)) = (left.number(), right.number()) {
        Ok((l, r))
    } else {
        Err(RuntimeError::type_error(
            operator.line,
            format!("Operands of '{}' must be numbers", operator.lexeme),
        ))
    }
}

/// Undefined equals only itself. A boolean on either side compares against
/// the truthiness of the other side. Numbers and strings compare by value;
/// nothing else is ever equal.
fn is_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Undefined, _) | (_, Value::Undefined) => false,
        (Value::Boolean(l), other) | (other, Value::Boolean(l)) => *l == other.is_truthy(),
        (Value::Number(l), Value::Number(r)) => l == r,
        (Value::String(l), Value::String(r)) => l == r,
        _ => false,
    }
}

fn check_index(index: &Value, length: usize, line: i32) -> Result<usize, RuntimeError> {
    let Some(n) = index.number() else {
        return Err(RuntimeError::type_error(line, format!("Array index '{index}' is not a number")));
    };

    if n.fract() != 0.0 {
        return Err(RuntimeError::type_error(line, format!("Array index {n} is not an integer")));
    }

    if n < 0.0 || n >= length as f64 {
        return Err(RuntimeError::IndexOutOfBounds { line, index: n, length });
    }

    Ok(n as usize)
}

fn not_an_array(line: i32, value: &Value) -> RuntimeError {
    RuntimeError::type_error(line, format!("Can only index arrays, not {}", value.type_name()))
}

fn not_a_reference(line: i32, level: usize, expr: &Expr) -> RuntimeError {
    RuntimeError::NotAReference {
        line,
        expr: format!("{}{}", "*".repeat(level - 1), AstPrinter::to_string(expr)),
    }
}
