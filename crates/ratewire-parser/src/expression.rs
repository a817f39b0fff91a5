//! Expression parser
//!
//! Parses formula strings into Expression AST nodes.
//!
//! Supported syntax:
//! - Field access: `value`, `policy.limit`, `drivers[0].age`
//! - Literals: `42`, `3.14`, `"string"`, `'string'`, `true`, `false`, `null`, `[1, 2]`
//! - Binary operators: `==`, `!=`, `<`, `<=`, `>`, `>=`, `+`, `-`, `*`, `/`, `%`,
//!   `&&`/`and`, `||`/`or`
//! - Keyword operators: `in`, `not in`, `contains`, `starts_with`, `ends_with`
//! - Unary operators: `!`/`not`, `-`
//! - Ternary: `cond ? a : b`
//! - Function calls: `round(value * 1.05, 2)`
//! - Parentheses for grouping: `(a + b) * c`
//!
//! Precedence, lowest first: ternary, `||`, `&&`, comparison/membership,
//! additive, multiplicative, unary.

use crate::error::{ParseError, Result};
use ratewire_core::ast::{Expression, Operator, UnaryOperator};
use ratewire_core::Value;

/// Maximum nesting depth accepted by the parser
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Ident(s) => format!("'{}'", s),
            Token::Op(op) => format!("'{}'", op),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Question => "'?'".to_string(),
            Token::Colon => "':'".to_string(),
        }
    }
}

const SYMBOLS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!",
];

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                i += 1;
            }
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
            let number = text
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidExpression(format!("bad number '{}'", text)))?;
            tokens.push((start, Token::Number(number)));
            continue;
        }

        if c == '"' || c == '\'' {
            i += 1;
            let mut text = String::new();
            loop {
                match chars.get(i) {
                    None => {
                        return Err(ParseError::InvalidExpression(format!(
                            "unterminated string starting at {}",
                            start
                        )))
                    }
                    Some('\\') => {
                        let escaped = chars.get(i + 1).copied().unwrap_or('\\');
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                        i += 2;
                    }
                    Some(ch) if *ch == c => {
                        i += 1;
                        break;
                    }
                    Some(ch) => {
                        text.push(*ch);
                        i += 1;
                    }
                }
            }
            tokens.push((start, Token::Str(text)));
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
            continue;
        }

        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            ',' => Some(Token::Comma),
            '.' => Some(Token::Dot),
            '?' => Some(Token::Question),
            ':' => Some(Token::Colon),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push((start, token));
            i += 1;
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
        match SYMBOLS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push((start, Token::Op(op)));
                i += op.chars().count();
            }
            None => {
                return Err(ParseError::InvalidExpression(format!(
                    "unexpected character '{}' at position {}",
                    c, start
                )))
            }
        }
    }

    Ok(tokens)
}

/// Expression parser
pub struct ExpressionParser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl ExpressionParser {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> Result<Expression> {
        let input = input.trim();

        if input.is_empty() {
            return Err(ParseError::InvalidExpression("Empty expression".to_string()));
        }

        let mut parser = ExpressionParser {
            tokens: tokenize(input)?,
            pos: 0,
            depth: 0,
            end: input.chars().count(),
        };

        let expr = parser.parse_ternary()?;
        if let Some((position, token)) = parser.tokens.get(parser.pos) {
            return Err(ParseError::UnexpectedToken {
                position: *position,
                found: token.describe(),
                expected: "end of expression".to_string(),
            });
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some((position, token)) => ParseError::UnexpectedToken {
                position: *position,
                found: token.describe(),
                expected: expected.to_string(),
            },
            None => ParseError::UnexpectedToken {
                position: self.end,
                found: "end of expression".to_string(),
                expected: expected.to_string(),
            },
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<()> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == keyword)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn parse_ternary(&mut self) -> Result<Expression> {
        self.enter()?;
        let condition = self.parse_or()?;
        let expr = if self.peek() == Some(&Token::Question) {
            self.pos += 1;
            let true_expr = self.parse_ternary()?;
            self.expect(Token::Colon, "':' in ternary expression")?;
            let false_expr = self.parse_ternary()?;
            Expression::ternary(condition, true_expr, false_expr)
        } else {
            condition
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expression> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Op("||")) || self.is_keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expression::binary(left, Operator::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::Op("&&")) || self.is_keyword("and") {
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expression::binary(left, Operator::And, right);
        }
        Ok(left)
    }

    fn comparison_operator(&self) -> Option<(Operator, usize)> {
        match self.peek()? {
            Token::Op(op) => Operator::comparison_from_token(op).map(|op| (op, 1)),
            Token::Ident(word)
                if word == "not"
                    && matches!(self.peek_at(1), Some(Token::Ident(next)) if next == "in") =>
            {
                Some((Operator::NotIn, 2))
            }
            Token::Ident(word) => Operator::comparison_from_token(word).map(|op| (op, 1)),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let mut left = self.parse_additive()?;
        while let Some((op, width)) = self.comparison_operator() {
            self.pos += width;
            let right = self.parse_additive()?;
            left = Expression::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => Operator::Add,
                Some(Token::Op("-")) => Operator::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expression::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => Operator::Mul,
                Some(Token::Op("/")) => Operator::Div,
                Some(Token::Op("%")) => Operator::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expression::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let op = match self.peek() {
            Some(Token::Op("!")) => Some(UnaryOperator::Not),
            Some(Token::Op("-")) => Some(UnaryOperator::Negate),
            Some(Token::Ident(word))
                if word == "not"
                    && !matches!(self.peek_at(1), Some(Token::Ident(next)) if next == "in") =>
            {
                Some(UnaryOperator::Not)
            }
            _ => None,
        };

        match op {
            Some(op) => {
                self.pos += 1;
                self.enter()?;
                let operand = self.parse_unary()?;
                self.depth -= 1;
                Ok(match (op, operand) {
                    (UnaryOperator::Negate, Expression::Literal(Value::Number(n))) => {
                        Expression::literal(Value::Number(-n))
                    }
                    (op, operand) => Expression::unary(op, operand),
                })
            }
            None => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expression::literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expression::literal(Value::String(s))),
            Some(Token::LParen) => {
                let inner = self.parse_ternary()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let items = self.parse_list(Token::RBracket, "']'")?;
                Ok(Expression::List(items))
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expression::literal(Value::Bool(true))),
                "false" => Ok(Expression::literal(Value::Bool(false))),
                "null" => Ok(Expression::literal(Value::Null)),
                _ if self.peek() == Some(&Token::LParen) => {
                    self.pos += 1;
                    let args = self.parse_list(Token::RParen, "')'")?;
                    Ok(Expression::function_call(name, args))
                }
                _ => self.parse_field_path(name),
            },
            _ => {
                self.pos -= 1;
                Err(self.unexpected("a value"))
            }
        }
    }

    /// Comma-separated expressions up to `close`
    fn parse_list(&mut self, close: Token, expected: &str) -> Result<Vec<Expression>> {
        self.enter()?;
        let mut items = Vec::new();
        if self.peek() == Some(&close) {
            self.pos += 1;
            self.depth -= 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_ternary()?);
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(t) if *t == close => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unexpected(expected)),
            }
        }
        self.depth -= 1;
        Ok(items)
    }

    /// `a.b[0].c` after the first identifier
    fn parse_field_path(&mut self, first: String) -> Result<Expression> {
        let mut segments = vec![first];
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Ident(key)) => segments.push(key),
                        Some(Token::Number(n)) if n.fract() == 0.0 && n >= 0.0 => {
                            segments.push(format!("{}", n as u64))
                        }
                        _ => {
                            self.pos -= 1;
                            return Err(self.unexpected("field name after '.'"));
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Number(n)) if n.fract() == 0.0 && n >= 0.0 => {
                            segments.push(format!("{}", n as u64))
                        }
                        Some(Token::Str(key)) => segments.push(key),
                        _ => {
                            self.pos -= 1;
                            return Err(self.unexpected("index or quoted key"));
                        }
                    }
                    self.expect(Token::RBracket, "']'")?;
                }
                _ => break,
            }
        }
        if segments[0] == "$" {
            segments.remove(0);
            if segments.is_empty() {
                return Err(ParseError::InvalidExpression(
                    "'$' must be followed by a field".to_string(),
                ));
            }
        }
        Ok(Expression::field_access(segments))
    }
}
