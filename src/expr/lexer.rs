//! Lexer for mathematical expressions.
//!
//! Converts source text into a stream of [`Token`]s. Positions are character
//! offsets, so errors point at the exact column of a single-line expression.

use super::error::{ParseError, ParseErrorKind};
use super::token::{Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            if self.is_at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos: self.pos,
                });
                break;
            }

            let ch = self.peek();
            let token = match ch {
                '+' => self.single_char(TokenKind::Plus),
                '-' => self.single_char(TokenKind::Minus),
                '*' => self.single_char(TokenKind::Star),
                '/' => self.single_char(TokenKind::Slash),
                '^' => self.single_char(TokenKind::Caret),
                '(' => self.single_char(TokenKind::LParen),
                ')' => self.single_char(TokenKind::RParen),
                ',' => self.single_char(TokenKind::Comma),
                '0'..='9' => self.lex_number()?,
                '.' if self.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                    self.lex_number()?
                }
                'a'..='z' | 'A'..='Z' | '_' => self.lex_ident(),
                _ => return Err(ParseError::unexpected_char(ch, self.pos)),
            };

            tokens.push(token);
        }

        Ok(tokens)
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        ch
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.advance();
        }
    }

    fn single_char(&mut self, kind: TokenKind) -> Token {
        let pos = self.pos;
        self.advance();
        Token { kind, pos }
    }

    fn take_digits(&mut self, s: &mut String) {
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            s.push(self.advance());
        }
    }

    fn lex_number(&mut self) -> Result<Token, ParseError> {
        let pos = self.pos;
        let mut s = String::new();

        self.take_digits(&mut s);
        if !self.is_at_end() && self.peek() == '.' {
            s.push(self.advance());
            self.take_digits(&mut s);
        }

        // Exponent: 1e3, 2.5E-4
        if !self.is_at_end() && matches!(self.peek(), 'e' | 'E') {
            let sign = self.peek_next().filter(|c| *c == '+' || *c == '-');
            let digit_at = if sign.is_some() { 2 } else { 1 };
            let has_digit = self
                .chars
                .get(self.pos + digit_at)
                .is_some_and(|c| c.is_ascii_digit());
            if has_digit {
                s.push(self.advance());
                if sign.is_some() {
                    s.push(self.advance());
                }
                self.take_digits(&mut s);
            }
        }

        let val: f64 = s.parse().map_err(|_| {
            ParseError::new(
                ParseErrorKind::InvalidNumber,
                format!("invalid number: {s}"),
                pos,
            )
        })?;
        if !val.is_finite() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidNumber,
                format!("number out of range: {s}"),
                pos,
            ));
        }

        Ok(Token {
            kind: TokenKind::Number(val),
            pos,
        })
    }

    fn lex_ident(&mut self) -> Token {
        let pos = self.pos;
        let mut s = String::new();

        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == '_') {
            s.push(self.advance());
        }

        Token {
            kind: TokenKind::Ident(s),
            pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn empty_input_is_just_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("   "), vec![TokenKind::Eof]);
    }

    #[test]
    fn operators_and_parens() {
        assert_eq!(
            kinds("+-*/^(),"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Caret,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Comma,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("3 2.5 .5 1e3 2E-2"),
            vec![
                TokenKind::Number(3.0),
                TokenKind::Number(2.5),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.02),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn exponent_without_digits_is_an_identifier() {
        // `2e` lexes as 2 followed by identifier `e`; the parser rejects it.
        assert_eq!(
            kinds("2e"),
            vec![
                TokenKind::Number(2.0),
                TokenKind::Ident("e".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn minus_is_never_folded_into_a_number() {
        assert_eq!(
            kinds("-2"),
            vec![TokenKind::Minus, TokenKind::Number(2.0), TokenKind::Eof]
        );
    }

    #[test]
    fn identifiers() {
        assert_eq!(
            kinds("sin x_1"),
            vec![
                TokenKind::Ident("sin".into()),
                TokenKind::Ident("x_1".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn positions_are_char_offsets() {
        let tokens = Lexer::new("sin( x )").tokenize().unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.pos).collect();
        assert_eq!(positions, vec![0, 3, 5, 7, 8]);
    }

    #[test]
    fn unexpected_character() {
        let err = Lexer::new("x % 2").tokenize().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedChar);
        assert_eq!(err.pos, 2);
    }

    #[test]
    fn rejects_code_like_input() {
        let err = Lexer::new("__import__('os')").tokenize().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedChar);
    }

    #[test]
    fn huge_literal_is_invalid() {
        let err = Lexer::new("1e999").tokenize().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidNumber);
    }
}
