//! Tokenizer and recursive-descent parser for rule expressions.

use std::fmt;

use serde_json::{Number, Value};

/// Maximum nesting depth accepted by the parser.
const MAX_NESTING: usize = 32;

/// Parsed form of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Literal(Value),
    /// Dotted variable path
    Variable(String),
    Not(Box<Ast>),
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
    Compare(CompareOp, Box<Ast>, Box<Ast>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Syntax error with the byte offset it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(Number),
    Str(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Op(CompareOp),
    LParen,
    RParen,
}

/// Removes a surrounding `${ ... }` wrapper if the whole input is wrapped.
fn unwrap_template(input: &str) -> (&str, usize) {
    let trimmed = input.trim();
    let offset = input.len() - input.trim_start().len();
    match trimmed
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        Some(inner) => (inner, offset + 2),
        None => (trimmed, offset),
    }
}

fn tokenize(input: &str, base: usize) -> Result<Vec<(usize, Token)>, ParseError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let position = base + pos;
        let next = chars.get(i + 1).map(|&(_, c)| c);

        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '(' => {
                tokens.push((position, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((position, Token::RParen));
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push((position, Token::And));
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push((position, Token::Or));
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push((position, Token::Op(CompareOp::Eq)));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push((position, Token::Op(CompareOp::Ne)));
                i += 2;
            }
            '!' => {
                tokens.push((position, Token::Not));
                i += 1;
            }
            '<' | '>' => {
                let op = match (c, next == Some('=')) {
                    ('<', true) => CompareOp::Le,
                    ('<', false) => CompareOp::Lt,
                    (_, true) => CompareOp::Ge,
                    (_, false) => CompareOp::Gt,
                };
                tokens.push((position, Token::Op(op)));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    let Some(&(_, ch)) = chars.get(i) else {
                        return Err(ParseError {
                            position,
                            message: "unterminated string literal".to_string(),
                        });
                    };
                    i += 1;
                    if ch == quote {
                        break;
                    }
                    if ch == '\\' {
                        if let Some(&(_, escaped)) = chars.get(i) {
                            value.push(escaped);
                            i += 1;
                            continue;
                        }
                    }
                    value.push(ch);
                }
                tokens.push((position, Token::Str(value)));
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                let number = parse_number(&text).ok_or_else(|| ParseError {
                    position,
                    message: format!("invalid number '{text}'"),
                })?;
                tokens.push((position, Token::Number(number)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                let token = match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => {
                        if word.ends_with('.') || word.contains("..") {
                            return Err(ParseError {
                                position,
                                message: format!("invalid variable path '{word}'"),
                            });
                        }
                        Token::Ident(word)
                    }
                };
                tokens.push((position, token));
            }
            other => {
                return Err(ParseError {
                    position,
                    message: format!("unexpected character '{other}'"),
                });
            }
        }
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Number::from(int));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(p, _)| *p)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            position: self.position(),
            message: message.into(),
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Ast::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Ast::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Ast, ParseError> {
        let left = self.parse_unary()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.parse_unary()?;
            return Ok(Ast::Compare(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Ast, ParseError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            self.enter()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Ast::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING}")));
        }
        Ok(())
    }

    fn parse_primary(&mut self) -> Result<Ast, ParseError> {
        let position = self.position();
        match self.advance() {
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                if self.advance() != Some(Token::RParen) {
                    self.pos -= 1;
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            Some(Token::True) => Ok(Ast::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Ast::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Ast::Literal(Value::Null)),
            Some(Token::Number(n)) => Ok(Ast::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Ast::Literal(Value::String(s))),
            Some(Token::Ident(name)) => Ok(Ast::Variable(name)),
            Some(other) => Err(ParseError {
                position,
                message: format!("unexpected token {other:?}"),
            }),
            None => Err(ParseError {
                position,
                message: "unexpected end of expression".to_string(),
            }),
        }
    }
}

/// Parses an expression, accepting an optional `${ ... }` wrapper.
///
/// # Errors
///
/// Returns a [`ParseError`] for empty input, unknown characters, unbalanced
/// parentheses or trailing tokens.
pub fn parse(input: &str) -> Result<Ast, ParseError> {
    let (body, base) = unwrap_template(input);
    let tokens = tokenize(body, base)?;
    if tokens.is_empty() {
        return Err(ParseError {
            position: base,
            message: "empty expression".to_string(),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: base + body.len(),
        depth: 0,
    };
    let ast = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Ast> {
        Box::new(Ast::Variable(name.to_string()))
    }

    #[test]
    fn test_template_wrapper_is_optional() {
        assert_eq!(parse("${required}").unwrap(), Ast::Variable("required".to_string()));
        assert_eq!(parse("required").unwrap(), Ast::Variable("required".to_string()));
        assert_eq!(parse("  ${ a }  ").unwrap(), Ast::Variable("a".to_string()));
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or() {
        let ast = parse("a || b && c").unwrap();
        assert_eq!(ast, Ast::Or(var("a"), Box::new(Ast::And(var("b"), var("c")))));
    }

    #[test]
    fn test_keywords_and_negation() {
        let ast = parse("not a and !b").unwrap();
        assert_eq!(
            ast,
            Ast::And(Box::new(Ast::Not(var("a"))), Box::new(Ast::Not(var("b"))))
        );
    }

    #[test]
    fn test_comparison_literals() {
        let ast = parse("order.total >= 100").unwrap();
        assert_eq!(
            ast,
            Ast::Compare(
                CompareOp::Ge,
                var("order.total"),
                Box::new(Ast::Literal(Value::Number(Number::from(100))))
            )
        );
        let ast = parse("status == 'open'").unwrap();
        assert!(matches!(ast, Ast::Compare(CompareOp::Eq, _, _)));
    }

    #[test]
    fn test_errors_report_position() {
        let err = parse("a &&").unwrap_err();
        assert_eq!(err.message, "unexpected end of expression");
        assert_eq!(err.position, 4);

        let err = parse("(a").unwrap_err();
        assert_eq!(err.message, "expected ')'");

        let err = parse("a b").unwrap_err();
        assert_eq!(err.message, "unexpected trailing input");

        let err = parse("a # b").unwrap_err();
        assert!(err.message.contains("unexpected character"));

        assert!(parse("${}").is_err());
        assert!(parse("'open").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}a{}", "(".repeat(40), ")".repeat(40));
        let err = parse(&deep).unwrap_err();
        assert!(err.message.contains("nesting"));
    }
}
