use crate::prelude::*;

/// Expression nodes. Every node owns its children, so cloning a node is a
/// full structural duplicate that shares nothing with the original.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Array {
        bracket: Token,
        elements: Vec<Expr>,
    },
    Assignment {
        target: Box<Expr>,
        equals: Token,
        value: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },
    Class {
        keyword: Token,
        body: Vec<Stmt>,
    },
    Function {
        keyword: Token,
        params: Vec<Token>,
        body: Vec<Stmt>,
    },
    Grouping {
        expr: Box<Expr>,
    },
    Index {
        array: Box<Expr>,
        bracket: Token,
        index: Box<Expr>,
    },
    Literal {
        value: Value,
        line: i32,
    },
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    Variable {
        name: Token,
    },
}

impl Expr {
    pub fn literal(value: Value, line: i32) -> Expr {
        Expr::Literal { value, line }
    }

    pub fn line(&self) -> i32 {
        match self {
            Expr::Array { bracket, .. } | Expr::Index { bracket, .. } => bracket.line,
            Expr::Assignment { equals, .. } => equals.line,
            Expr::Binary { operator, .. }
            | Expr::Logical { operator, .. }
            | Expr::Unary { operator, .. } => operator.line,
            Expr::Call { paren, .. } => paren.line,
            Expr::Class { keyword, .. } | Expr::Function { keyword, .. } => keyword.line,
            Expr::Grouping { expr } => expr.line(),
            Expr::Literal { line, .. } => *line,
            Expr::Variable { name } => name.line,
        }
    }

    /// Number of `*` in a dereference operator. The parser stores it as the
    /// operator token's literal payload.
    pub fn star_count(operator: &Token) -> usize {
        match operator.literal {
            Some(Value::Number(n)) if n >= 1.0 => n as usize,
            _ => operator.lexeme.len().max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block {
        statements: Vec<Stmt>,
    },
    Break {
        token: Token,
    },
    Continue {
        token: Token,
    },
    Expression {
        expr: Expr,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    Print {
        exprs: Vec<Expr>,
    },
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Use {
        command: Token,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    /// `increment` is only set by the `for` desugaring; it runs after every
    /// iteration that was not cut short by `break` or `return`.
    While {
        condition: Expr,
        body: Box<Stmt>,
        increment: Option<Expr>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> Vec<Stmt> {
        // { var a = 1; return a + 2; }
        vec![
            Stmt::Var {
                name: Token::identifier("a", 1),
                initializer: Some(Expr::literal(Value::Number(1.0), 1)),
            },
            Stmt::Return {
                keyword: Token::new(TokenType::Return, "return", None, 2),
                value: Some(Expr::Binary {
                    left: Box::new(Expr::Variable { name: Token::identifier("a", 2) }),
                    operator: Token::new(TokenType::Plus, "+", None, 2),
                    right: Box::new(Expr::literal(Value::Number(2.0), 2)),
                }),
            },
        ]
    }

    #[test]
    fn duplicate_is_structurally_equal() {
        let original = body();
        let duplicate = original.clone();
        assert_eq!(original, duplicate);
    }

    #[test]
    fn mutating_a_duplicate_leaves_the_original_alone() {
        let original = body();
        let mut duplicate = original.clone();

        if let Stmt::Var { initializer: Some(Expr::Literal { value, .. }), .. } = &mut duplicate[0]
        {
            *value = Value::String("changed".to_owned());
        }
        duplicate.pop();

        assert_eq!(original, body());
        assert_ne!(original, duplicate);
    }

    #[test]
    fn line_of_nested_expression() {
        let expr = Expr::Grouping { expr: Box::new(Expr::Variable { name: Token::identifier("x", 7) }) };
        assert_eq!(expr.line(), 7);
    }
}
