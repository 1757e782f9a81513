//! Evaluation of free-text ingredient quantities.
//!
//! Quantities are typed by users (`"2"`, `"1/2"`, `"2+1/4"`), so they are
//! evaluated by a small recursive-descent parser that only understands
//! numeric literals, `+ - * /` and parentheses. Anything else is rejected.
//! Arithmetic is exact decimal, so `0.1 + 0.2` is `0.3`.

use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};

const MAX_DEPTH: usize = 32;
const MAX_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("unexpected character {ch:?} at position {position}")]
    UnexpectedChar { ch: char, position: usize },
    #[error("quantity ended before the expression was complete")]
    UnexpectedEnd,
    #[error("invalid number {literal:?}")]
    InvalidNumber { literal: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("expression is nested too deeply")]
    TooDeep,
    #[error("quantity is longer than {MAX_LEN} characters")]
    TooLong,
}

pub fn parse_quantity(input: &str) -> Result<BigDecimal, QuantityError> {
    if input.trim().is_empty() {
        return Err(QuantityError::Empty);
    }
    if input.chars().count() > MAX_LEN {
        return Err(QuantityError::TooLong);
    }

    let mut parser = Parser {
        chars: input.chars().collect(),
        position: 0,
        depth: 0,
    };

    let value = parser.expr()?;
    parser.skip_whitespace();
    if let Some(ch) = parser.peek() {
        return Err(QuantityError::UnexpectedChar {
            ch,
            position: parser.position,
        });
    }

    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.position += 1;
        }
    }

    fn next_operator(&mut self, operators: &[char]) -> Option<char> {
        self.skip_whitespace();
        let ch = self.peek().filter(|c| operators.contains(c))?;
        self.position += 1;
        Some(ch)
    }

    fn expr(&mut self) -> Result<BigDecimal, QuantityError> {
        let mut value = self.term()?;
        while let Some(op) = self.next_operator(&['+', '-']) {
            let rhs = self.term()?;
            if op == '+' {
                value += rhs;
            } else {
                value -= rhs;
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<BigDecimal, QuantityError> {
        let mut value = self.factor()?;
        while let Some(op) = self.next_operator(&['*', '/']) {
            let rhs = self.factor()?;
            if op == '*' {
                value = value * rhs;
            } else {
                if rhs.is_zero() {
                    return Err(QuantityError::DivisionByZero);
                }
                value = value / rhs;
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<BigDecimal, QuantityError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(QuantityError::TooDeep);
        }
        let value = self.factor_inner();
        self.depth -= 1;
        value
    }

    fn factor_inner(&mut self) -> Result<BigDecimal, QuantityError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(QuantityError::UnexpectedEnd),
            Some('+') => {
                self.position += 1;
                self.factor()
            }
            Some('-') => {
                self.position += 1;
                Ok(-self.factor()?)
            }
            Some('(') => {
                self.position += 1;
                let value = self.expr()?;
                self.skip_whitespace();
                match self.peek() {
                    Some(')') => {
                        self.position += 1;
                        Ok(value)
                    }
                    Some(ch) => Err(QuantityError::UnexpectedChar {
                        ch,
                        position: self.position,
                    }),
                    None => Err(QuantityError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(ch) => Err(QuantityError::UnexpectedChar {
                ch,
                position: self.position,
            }),
        }
    }

    fn number(&mut self) -> Result<BigDecimal, QuantityError> {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
        {
            self.position += 1;
        }
        let literal: String = self.chars[start..self.position].iter().collect();

        if literal == "." || literal.matches('.').count() > 1 {
            return Err(QuantityError::InvalidNumber { literal });
        }

        // ".5" and "3." are written by hand often enough to accept.
        let mut digits = String::with_capacity(literal.len() + 2);
        if literal.starts_with('.') {
            digits.push('0');
        }
        digits.push_str(&literal);
        if literal.ends_with('.') {
            digits.push('0');
        }

        BigDecimal::from_str(&digits).map_err(|_| QuantityError::InvalidNumber { literal })
    }
}
