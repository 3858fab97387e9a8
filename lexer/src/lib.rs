pub mod token;

use std::rc::Rc;
use token::{Token, TokenType};

/// Lazy tokenizer: `next_token()` pulls exactly one token from the source buffer, with a
/// one-character lookahead. Whitespace (space, tab, CR, LF) and `#`-to-end-of-line comments are
/// skipped between tokens; LF increments the line counter.
pub struct Scanner {
    source: Rc<str>,
    start: usize,
    current: usize,
    line: u32,
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

impl Scanner {
    pub fn new(source: impl Into<Rc<str>>) -> Self {
        Self {
            source: source.into(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.source.as_bytes().get(offset).copied()
    }

    fn peek(&self) -> Option<u8> {
        self.byte_at(self.current)
    }

    fn peek_next(&self) -> Option<u8> {
        self.byte_at(self.current + 1)
    }

    fn at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.source.as_bytes()[self.current];
        self.current += 1;
        c
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn make_token(&self, typ: TokenType) -> Token {
        Token::new(
            typ,
            Rc::clone(&self.source),
            self.start,
            self.current - self.start,
            self.line,
        )
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.current += 1;
                }
                Some(b'\n') => {
                    self.current += 1;
                    self.line += 1;
                }
                Some(b'#') => {
                    while !self.at_end() && self.peek() != Some(b'\n') {
                        self.current += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn string(&mut self) -> Token {
        // No escape-sequence interpretation: bytes between quotes are copied verbatim,
        // including literal newlines (which still advance the line counter).
        while let Some(c) = self.peek() {
            if c == b'"' {
                break;
            }
            if c == b'\n' {
                self.line += 1;
            }
            self.current += 1;
        }

        if self.at_end() {
            return self.make_token(TokenType::UnterminatedString);
        }

        self.current += 1; // closing quote
        self.make_token(TokenType::String)
    }

    fn number(&mut self) -> Token {
        while self.peek().map(is_digit).unwrap_or(false) {
            self.current += 1;
        }

        if self.peek() == Some(b'.') && self.peek_next().map(is_digit).unwrap_or(false) {
            self.current += 1;
            while self.peek().map(is_digit).unwrap_or(false) {
                self.current += 1;
            }
        }

        if self.peek().map(is_alpha).unwrap_or(false) {
            while self.peek().map(|c| is_alpha(c) || is_digit(c)).unwrap_or(false) {
                self.current += 1;
            }
            return self.make_token(TokenType::InvalidNumber);
        }

        self.make_token(TokenType::Number)
    }

    fn identifier(&mut self) -> Token {
        while self.peek().map(|c| is_alpha(c) || is_digit(c)).unwrap_or(false) {
            self.current += 1;
        }

        let lexeme = &self.source[self.start..self.current];
        let typ = keyword_type(lexeme).unwrap_or(TokenType::Identifier);
        self.make_token(typ)
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start = self.current;

        if self.at_end() {
            return self.make_token(TokenType::Eof);
        }

        let c = self.advance();

        if is_alpha(c) {
            return self.identifier();
        }
        if is_digit(c) {
            return self.number();
        }

        match c {
            b'(' => self.make_token(TokenType::OParen),
            b')' => self.make_token(TokenType::CParen),
            b'{' => self.make_token(TokenType::OBrace),
            b'}' => self.make_token(TokenType::CBrace),
            b'[' => self.make_token(TokenType::OBracket),
            b']' => self.make_token(TokenType::CBracket),
            b';' => self.make_token(TokenType::Semicolon),
            b',' => self.make_token(TokenType::Comma),
            b'+' => self.make_token(TokenType::Plus),
            b'-' => self.make_token(TokenType::Minus),
            b'*' => self.make_token(TokenType::Star),
            b'/' => self.make_token(TokenType::Slash),
            b'%' => self.make_token(TokenType::Percent),
            b'!' => {
                let typ = if self.matches(b'=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.make_token(typ)
            }
            b'=' => {
                let typ = if self.matches(b'=') {
                    TokenType::DEqual
                } else {
                    TokenType::Equal
                };
                self.make_token(typ)
            }
            b'>' => {
                let typ = if self.matches(b'=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.make_token(typ)
            }
            b'<' => {
                let typ = if self.matches(b'=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.make_token(typ)
            }
            b'&' if self.matches(b'&') => self.make_token(TokenType::And),
            b'|' if self.matches(b'|') => self.make_token(TokenType::Or),
            b'"' => self.string(),
            _ => self.make_token(TokenType::Unknown),
        }
    }
}

fn keyword_type(lexeme: &str) -> Option<TokenType> {
    Some(match lexeme {
        "class" => TokenType::Class,
        "const" => TokenType::Const,
        "def" => TokenType::Def,
        "else" => TokenType::Else,
        "false" => TokenType::False,
        "if" => TokenType::If,
        "let" => TokenType::Let,
        "null" => TokenType::Null,
        "return" => TokenType::Return,
        "super" => TokenType::Super,
        "this" => TokenType::This,
        "true" => TokenType::True,
        "while" => TokenType::While,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &str) -> Vec<TokenType> {
        let mut scanner = Scanner::new(source);
        let mut types = vec![];
        loop {
            let token = scanner.next_token();
            let typ = token.typ();
            types.push(typ);
            if typ == TokenType::Eof {
                break;
            }
        }
        types
    }

    #[test]
    fn skips_whitespace_and_comments() {
        let types = scan_all("  # a comment\n  1");
        assert_eq!(types, vec![TokenType::Number, TokenType::Eof]);
    }

    #[test]
    fn two_char_operators() {
        let types = scan_all("== != >= <= && ||");
        assert_eq!(
            types,
            vec![
                TokenType::DEqual,
                TokenType::BangEqual,
                TokenType::GreaterEqual,
                TokenType::LessEqual,
                TokenType::And,
                TokenType::Or,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        let types = scan_all("let const def class super this pi");
        assert_eq!(
            types,
            vec![
                TokenType::Let,
                TokenType::Const,
                TokenType::Def,
                TokenType::Class,
                TokenType::Super,
                TokenType::This,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn numbers_require_trailing_digit_for_fraction() {
        let mut scanner = Scanner::new("123.456 7.x");
        let first = scanner.next_token();
        assert_eq!(first.typ(), TokenType::Number);
        assert_eq!(first.lexeme(), "123.456");
    }

    #[test]
    fn string_has_no_escape_interpretation_and_spans_lines() {
        let mut scanner = Scanner::new("\"a\\nb\nc\"");
        let token = scanner.next_token();
        assert_eq!(token.typ(), TokenType::String);
        assert_eq!(token.lexeme(), "\"a\\nb\nc\"");
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let types = scan_all("\"oops");
        assert_eq!(types, vec![TokenType::UnterminatedString, TokenType::Eof]);
    }

    #[test]
    fn lone_ampersand_is_unknown() {
        let types = scan_all("&");
        assert_eq!(types, vec![TokenType::Unknown, TokenType::Eof]);
    }
}
