use pretty_assertions::assert_eq;
use toy::prelude::{Scanner, TokenType, Value};

fn token_types(input: &str) -> Vec<TokenType> {
    let tokens = Scanner::new(input).scan_tokens().expect("input should scan");
    tokens.into_iter().map(|t| t.token_type).collect()
}

#[test]
fn scanner_works() {
    let input = "2 and 3";
    let tokens = Scanner::new(input).scan_tokens().unwrap();
    assert_eq!(tokens.len(), 4);
}

#[test]
fn keywords_and_identifiers() {
    assert_eq!(
        token_types("function class use undefined recurse"),
        vec![
            TokenType::Function,
            TokenType::Class,
            TokenType::Use,
            TokenType::Undefined,
            TokenType::Identifier,
            TokenType::EOF,
        ]
    );
}

#[test]
fn brackets_references_and_comments() {
    assert_eq!(
        token_types("a[0] = &b; // trailing\n**c;"),
        vec![
            TokenType::Identifier,
            TokenType::LeftBracket,
            TokenType::Number,
            TokenType::RightBracket,
            TokenType::Equal,
            TokenType::Ampersand,
            TokenType::Identifier,
            TokenType::Semicolon,
            TokenType::Star,
            TokenType::Star,
            TokenType::Identifier,
            TokenType::Semicolon,
            TokenType::EOF,
        ]
    );
}

#[test]
fn literals_carry_their_value() {
    let tokens = Scanner::new(r#"12.5 "text""#).scan_tokens().unwrap();
    assert_eq!(tokens[0].literal, Some(Value::Number(12.5)));
    assert_eq!(tokens[1].literal, Some(Value::String("text".to_owned())));
}

#[test]
fn lines_are_counted() {
    let tokens = Scanner::new("a\n/* one\ntwo */\nb").scan_tokens().unwrap();
    assert_eq!(tokens[0].line, 1);
    assert_eq!(tokens[1].line, 4);
}

#[test]
fn every_error_is_returned() {
    let errors = Scanner::new("a # b $").scan_tokens().unwrap_err();
    assert_eq!(errors.len(), 2);
}
