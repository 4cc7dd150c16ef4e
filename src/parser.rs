use crate::prelude::*;

const MAX_ARGUMENTS: usize = 255;

#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub token: Token,
    pub message: String,
}

type ParseResult<T> = Result<T, ParserError>;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ParserError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0, errors: vec![] }
    }

    /// Parse the whole token stream. On a syntax error the parser skips to
    /// the next statement boundary and keeps going, so every error in the
    /// input is reported at once.
    pub fn parse(&mut self) -> Result<Vec<Stmt>, Vec<ParserError>> {
        let mut statements = vec![];
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        if self.errors.is_empty() {
            Ok(statements)
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_tt(&[TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect variable name")?;

        let initializer =
            if self.match_tt(&[TokenType::Equal]) { Some(self.expression()?) } else { None };

        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration")?;

        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_tt(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_tt(&[TokenType::While]) {
            self.while_statement()
        } else if self.match_tt(&[TokenType::For]) {
            self.for_statement()
        } else if self.match_tt(&[TokenType::Return]) {
            self.return_statement()
        } else if self.match_tt(&[TokenType::Break]) {
            let token = self.previous();
            self.consume(TokenType::Semicolon, "Expect ';' after 'break'")?;
            Ok(Stmt::Break { token })
        } else if self.match_tt(&[TokenType::Continue]) {
            let token = self.previous();
            self.consume(TokenType::Semicolon, "Expect ';' after 'continue'")?;
            Ok(Stmt::Continue { token })
        } else if self.match_tt(&[TokenType::Use]) {
            self.use_statement()
        } else if self.match_tt(&[TokenType::Print]) {
            self.print_statement()
        } else if self.match_tt(&[TokenType::LeftBrace]) {
            Ok(Stmt::Block { statements: self.block()? })
        } else {
            self.expression_statement()
        }
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_tt(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous();
        let value = if !self.check(TokenType::Semicolon) { Some(self.expression()?) } else { None };

        self.consume(TokenType::Semicolon, "Expect ';' after return value")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after while condition")?;

        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body, increment: None })
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous();
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'")?;

        let initializer = if self.match_tt(&[TokenType::Semicolon]) {
            None
        } else if self.match_tt(&[TokenType::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) {
            self.expression()?
        } else {
            Expr::literal(Value::Boolean(true), keyword.line)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after 'for' condition")?;

        let increment =
            if !self.check(TokenType::RightParen) { Some(self.expression()?) } else { None };
        self.consume(TokenType::RightParen, "Expect ')' after 'for' clauses")?;

        let body = self.statement()?;

        // Now reconstruct all those parts as a while loop
        let mut desugared = Stmt::While { condition, body: Box::new(body), increment };

        if let Some(initializer) = initializer {
            desugared = Stmt::Block { statements: vec![initializer, desugared] };
        }

        Ok(desugared)
    }

    fn use_statement(&mut self) -> ParseResult<Stmt> {
        if !self.match_tt(&[TokenType::Identifier, TokenType::StringLiteral]) {
            return Err(self.error(self.peek().clone(), "Expect a flag name or a module path after 'use'"));
        }

        let command = self.previous();
        self.consume(TokenType::Semicolon, "Expect ';' after 'use' command")?;
        Ok(Stmt::Use { command })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let mut exprs = vec![self.expression()?];
        while self.match_tt(&[TokenType::Comma]) {
            exprs.push(self.expression()?);
        }

        self.consume(TokenType::Semicolon, "Expect ';' after the print statement")?;
        Ok(Stmt::Print { exprs })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = vec![];

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression")?;
        Ok(Stmt::Expression { expr })
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if self.match_tt(&[TokenType::Equal]) {
            let equals = self.previous();
            let value = self.assignment()?;

            if !is_assignment_target(&expr) {
                return Err(self.error(equals, "Invalid assignment target"));
            }

            return Ok(Expr::Assignment { target: Box::new(expr), equals, value: Box::new(value) });
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while self.match_tt(&[TokenType::Or]) {
            let operator = self.previous();
            let right = self.and()?;
            expr = Expr::Logical { left: Box::new(expr), operator, right: Box::new(right) };
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_tt(&[TokenType::And]) {
            let operator = self.previous();
            let right = self.equality()?;
            expr = Expr::Logical { left: Box::new(expr), operator, right: Box::new(right) };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.binary(&[TokenType::BangEqual, TokenType::EqualEqual], Self::comparison)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.binary(
            &[TokenType::GreaterEqual, TokenType::Greater, TokenType::LessEqual, TokenType::Less],
            Self::term,
        )
    }

    fn term(&mut self) -> ParseResult<Expr> {
        self.binary(&[TokenType::Minus, TokenType::Plus], Self::factor)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        self.binary(&[TokenType::Slash, TokenType::Star], Self::unary)
    }

    /// Left-associative binary level: `operand ( op operand )*`.
    fn binary(
        &mut self,
        operators: &[TokenType],
        operand: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut expr = operand(self)?;

        while self.match_tt(operators) {
            let operator = self.previous();
            let right = operand(self)?;
            expr = Expr::Binary { left: Box::new(expr), operator, right: Box::new(right) };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_tt(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous();
            let right = self.unary()?;
            return Ok(Expr::Unary { operator, right: Box::new(right) });
        }

        if self.match_tt(&[TokenType::Ampersand]) {
            let operator = self.previous();
            let name = self.consume(TokenType::Identifier, "Can only take the address of a variable")?;
            return Ok(Expr::Unary { operator, right: Box::new(Expr::Variable { name }) });
        }

        if self.match_tt(&[TokenType::Star]) {
            // Fold a run of stars into one operator that carries the depth
            let first = self.previous();
            let mut depth = 1;
            while self.match_tt(&[TokenType::Star]) {
                depth += 1;
            }

            let operator = Token::new(
                TokenType::Star,
                &"*".repeat(depth),
                Some(Value::Number(depth as f64)),
                first.line,
            );
            let right = self.unary()?;
            return Ok(Expr::Unary { operator, right: Box::new(right) });
        }

        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_tt(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tt(&[TokenType::LeftBracket]) {
                let bracket = self.previous();
                let index = self.expression()?;
                self.consume(TokenType::RightBracket, "Expect ']' after index")?;
                expr = Expr::Index { array: Box::new(expr), bracket, index: Box::new(index) };
            } else if self.match_tt(&[TokenType::Dot]) {
                let operator = self.previous();
                let name = self.consume(TokenType::Identifier, "Expect member name after '.'")?;
                expr = Expr::Binary {
                    left: Box::new(expr),
                    operator,
                    right: Box::new(Expr::Variable { name }),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let arguments = self.comma_separated(TokenType::RightParen, "arguments", Self::expression)?;
        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments")?;
        Ok(Expr::Call { callee: Box::new(callee), paren, arguments })
    }

    fn comma_separated<T>(
        &mut self,
        closing: TokenType,
        what: &str,
        item: fn(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        let mut items = vec![];

        if !self.check(closing) {
            loop {
                if items.len() >= MAX_ARGUMENTS {
                    // Just report the error, the list itself is still well formed
                    let e = self.error(self.peek().clone(), &format!("Can't have more than 255 {what}"));
                    self.errors.push(e);
                }

                items.push(item(self)?);

                if !self.match_tt(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        Ok(items)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.match_tt(&[TokenType::False]) {
            return Ok(self.literal(Value::Boolean(false)));
        }
        if self.match_tt(&[TokenType::True]) {
            return Ok(self.literal(Value::Boolean(true)));
        }
        if self.match_tt(&[TokenType::Undefined]) {
            return Ok(self.literal(Value::Undefined));
        }
        if self.match_tt(&[TokenType::Number, TokenType::StringLiteral]) {
            let token = self.previous();
            return Ok(Expr::literal(token.literal.unwrap_or_default(), token.line));
        }
        if self.match_tt(&[TokenType::Identifier]) {
            return Ok(Expr::Variable { name: self.previous() });
        }
        if self.match_tt(&[TokenType::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression")?;
            return Ok(Expr::Grouping { expr: Box::new(expr) });
        }
        if self.match_tt(&[TokenType::LeftBracket]) {
            let bracket = self.previous();
            let elements =
                self.comma_separated(TokenType::RightBracket, "elements", Self::expression)?;
            self.consume(TokenType::RightBracket, "Expect ']' after array elements")?;
            return Ok(Expr::Array { bracket, elements });
        }
        if self.match_tt(&[TokenType::Function]) {
            return self.function_literal();
        }
        if self.match_tt(&[TokenType::Class]) {
            return self.class_literal();
        }

        Err(self.error(self.peek().clone(), "Expect expression"))
    }

    fn function_literal(&mut self) -> ParseResult<Expr> {
        let keyword = self.previous();
        self.consume(TokenType::LeftParen, "Expect '(' after 'function'")?;
        let params =
            self.comma_separated(TokenType::RightParen, "parameters", |parser: &mut Parser| {
                parser.consume(TokenType::Identifier, "Expect parameter name")
            })?;
        self.consume(TokenType::RightParen, "Expect ')' after parameters")?;
        self.consume(TokenType::LeftBrace, "Expect '{' before function body")?;

        let body = self.block()?;
        Ok(Expr::Function { keyword, params, body })
    }

    fn class_literal(&mut self) -> ParseResult<Expr> {
        let keyword = self.previous();
        self.consume(TokenType::LeftBrace, "Expect '{' after 'class'")?;

        let mut body = vec![];
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if !self.match_tt(&[TokenType::Var]) {
                let message = "Only variable declarations are allowed in a class body";
                return Err(self.error(self.peek().clone(), message));
            }
            body.push(self.var_declaration()?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body")?;
        Ok(Expr::Class { keyword, body })
    }

    fn literal(&self, value: Value) -> Expr {
        Expr::literal(value, self.tokens[self.current - 1].line)
    }

    /// Return the next token if its `token_type` matches the given type as input.
    /// Otherwise, return an error carrying the message.
    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(token_type) {
            return Ok(self.advance());
        }

        Err(self.error(self.peek().clone(), message))
    }

    fn error(&self, token: Token, message: &str) -> ParserError {
        ParserError { token, message: message.to_owned() }
    }

    fn match_tt(&mut self, types: &[TokenType]) -> bool {
        for tt in types {
            if self.check(*tt) {
                self.advance();
                return true;
            }
        }

        false
    }

    /// Check to see if the next token's type matches the given `token_type`.
    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == token_type
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        // The scanner always terminates the stream with EOF
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> Token {
        self.tokens[self.current.saturating_sub(1)].clone()
    }

    fn synchronize(&mut self) {
        self.advance();

        // Move and discard tokens until we find a statement boundary
        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return
                | TokenType::Break
                | TokenType::Continue
                | TokenType::Use => return,
                _ => {}
            }

            self.advance();
        }
    }
}

fn is_assignment_target(expr: &Expr) -> bool {
    match expr {
        Expr::Variable { .. } | Expr::Index { .. } => true,
        Expr::Unary { operator, right } => {
            operator.token_type == TokenType::Star && matches!(right.as_ref(), Expr::Variable { .. })
        }
        Expr::Binary { left, operator, .. } => {
            operator.token_type == TokenType::Dot && matches!(left.as_ref(), Expr::Variable { .. })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Vec<Stmt>, Vec<ParserError>> {
        let tokens = Scanner::new(source).scan_tokens().expect("source should scan");
        Parser::new(tokens).parse()
    }

    #[test]
    fn star_runs_fold_into_one_operator() {
        let stmts = parse("**a;").unwrap();
        match &stmts[0] {
            Stmt::Expression { expr: Expr::Unary { operator, right } } => {
                assert_eq!(operator.lexeme, "**");
                assert_eq!(Expr::star_count(operator), 2);
                assert!(matches!(right.as_ref(), Expr::Variable { .. }));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn for_desugars_into_a_while_with_increment() {
        let stmts = parse("for (var i = 0; i < 3; i = i + 1) print i;").unwrap();
        match &stmts[0] {
            Stmt::Block { statements } => {
                assert!(matches!(statements[0], Stmt::Var { .. }));
                assert!(matches!(statements[1], Stmt::While { increment: Some(_), .. }));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn member_access_is_a_dot_binary() {
        let stmts = parse("a.b;").unwrap();
        assert!(matches!(
            &stmts[0],
            Stmt::Expression { expr: Expr::Binary { operator, .. } } if operator.token_type == TokenType::Dot
        ));
    }

    #[test]
    fn invalid_assignment_target() {
        let errors = parse("1 + 2 = 3;").unwrap_err();
        assert_eq!(errors[0].message, "Invalid assignment target");
    }

    #[test]
    fn address_of_requires_a_variable() {
        let errors = parse("var a = &1;").unwrap_err();
        assert_eq!(errors[0].message, "Can only take the address of a variable");
    }

    #[test]
    fn class_bodies_only_hold_var_declarations() {
        assert!(parse("var C = class { var a = 1; var b; };").is_ok());
        let errors = parse("var C = class { print 1; };").unwrap_err();
        assert_eq!(errors[0].message, "Only variable declarations are allowed in a class body");
    }

    #[test]
    fn reports_every_error() {
        let errors = parse("var = 1;\nvar b = ;\nvar c = 3;").unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].token.line, 2);
    }

    #[test]
    fn use_accepts_flags_and_paths() {
        let stmts = parse("use panic; use \"lib.toy\";").unwrap();
        assert!(matches!(&stmts[0], Stmt::Use { command } if command.token_type == TokenType::Identifier));
        assert!(matches!(&stmts[1], Stmt::Use { command } if command.token_type == TokenType::StringLiteral));
    }
}
