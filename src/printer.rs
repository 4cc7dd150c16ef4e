use crate::prelude::*;

/// Prints the tree in a parenthesized prefix form. Used for tracing and for
/// naming the offending expression in error messages.
pub struct AstPrinter;

impl AstPrinter {
    pub fn to_string(expr: &Expr) -> String {
        match expr {
            Expr::Binary { left, operator, right } | Expr::Logical { left, operator, right } => {
                format!(
                    "({} {} {})",
                    operator.lexeme,
                    Self::to_string(left),
                    Self::to_string(right)
                )
            }
            Expr::Grouping { expr } => format!("(group {})", Self::to_string(expr)),
            Expr::Literal { value: Value::String(s), .. } => format!("\"{s}\""),
            Expr::Literal { value, .. } => format!("{value}"),
            Expr::Unary { operator, right } => {
                // `*a` rather than `(* a)`, it is how the user wrote it
                if operator.token_type == TokenType::Star {
                    format!("{}{}", operator.lexeme, Self::to_string(right))
                } else {
                    format!("({} {})", operator.lexeme, Self::to_string(right))
                }
            }
            Expr::Variable { name } => name.lexeme.clone(),
            Expr::Assignment { target, value, .. } => {
                format!("(= {} {})", Self::to_string(target), Self::to_string(value))
            }
            Expr::Call { callee, arguments, .. } => {
                format!("(call {}{})", Self::to_string(callee), Self::list(arguments))
            }
            Expr::Array { elements, .. } => format!("(array{})", Self::list(elements)),
            Expr::Index { array, index, .. } => {
                format!("(index {} {})", Self::to_string(array), Self::to_string(index))
            }
            Expr::Function { params, body, .. } => {
                let params = params.iter().map(|p| p.lexeme.as_str()).collect::<Vec<_>>();
                format!("(function ({}){})", params.join(" "), Self::block(body))
            }
            Expr::Class { body, .. } => format!("(class{})", Self::block(body)),
        }
    }

    pub fn stmt_to_string(stmt: &Stmt) -> String {
        match stmt {
            Stmt::Block { statements } => format!("(block{})", Self::block(statements)),
            Stmt::Break { .. } => "(break)".to_owned(),
            Stmt::Continue { .. } => "(continue)".to_owned(),
            Stmt::Expression { expr } => format!("(; {})", Self::to_string(expr)),
            Stmt::If { condition, then_branch, else_branch } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    Self::to_string(condition),
                    Self::stmt_to_string(then_branch),
                    Self::stmt_to_string(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    Self::to_string(condition),
                    Self::stmt_to_string(then_branch)
                ),
            },
            Stmt::Print { exprs } => format!("(print{})", Self::list(exprs)),
            Stmt::Return { value: Some(value), .. } => format!("(return {})", Self::to_string(value)),
            Stmt::Return { value: None, .. } => "(return)".to_owned(),
            Stmt::Use { command } => format!("(use {})", command.lexeme),
            Stmt::Var { name, initializer: Some(init) } => {
                format!("(var {} {})", name.lexeme, Self::to_string(init))
            }
            Stmt::Var { name, initializer: None } => format!("(var {})", name.lexeme),
            Stmt::While { condition, body, increment } => {
                let increment =
                    increment.as_ref().map(|e| format!(" {}", Self::to_string(e))).unwrap_or_default();
                format!(
                    "(while {} {}{increment})",
                    Self::to_string(condition),
                    Self::stmt_to_string(body)
                )
            }
        }
    }

    fn list(exprs: &[Expr]) -> String {
        exprs.iter().map(|e| format!(" {}", Self::to_string(e))).collect()
    }

    fn block(statements: &[Stmt]) -> String {
        statements.iter().map(|s| format!(" {}", Self::stmt_to_string(s))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    #[test]
    fn print_an_ast() {
        // This is '-123 * (45.67)'
        let expr = Expr::Binary {
            left: Box::new(Expr::Unary {
                operator: Token::new(TokenType::Minus, "-", None, 1),
                right: Box::new(Expr::literal(Value::Number(123.0), 1)),
            }),
            operator: Token::new(TokenType::Star, "*", None, 1),
            right: Box::new(Expr::Grouping { expr: Box::new(Expr::literal(Value::Number(45.67), 1)) }),
        };

        let res = AstPrinter::to_string(&expr);
        assert_eq!(res, "(* (- 123) (group 45.67))".to_owned());
    }

    #[test]
    fn print_dereference_and_statements() {
        let deref = Expr::Unary {
            operator: Token::new(TokenType::Star, "**", Some(Value::Number(2.0)), 1),
            right: Box::new(Expr::Variable { name: Token::identifier("p", 1) }),
        };
        assert_eq!(AstPrinter::to_string(&deref), "**p");

        let stmt = Stmt::Print { exprs: vec![deref, Expr::literal(Value::String("x".to_owned()), 1)] };
        assert_eq!(AstPrinter::stmt_to_string(&stmt), "(print **p \"x\")");
    }
}
