//! sql/lexer — общий токенизатор DDL/DML и курсор парсера.
//!
//! Токены: идентификаторы ([A-Za-z_][A-Za-z0-9_]*), числа (цифры с
//! необязательной дробной частью), строки в одинарных кавычках с
//! экранированием '' и символы; двухсимвольные операторы != <> <= >=
//! лексируются целиком. Ключевые слова сравниваются по upper-копии.

use crate::errors::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Symbol,
    End,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub upper: String,
    pub position: usize,
}

impl Token {
    fn end(position: usize) -> Self {
        Self {
            kind: TokenKind::End,
            text: String::new(),
            upper: String::new(),
            position,
        }
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_part(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let ch = bytes[pos];

        if ch.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if is_ident_start(ch) {
            let start = pos;
            pos += 1;
            while pos < bytes.len() && is_ident_part(bytes[pos]) {
                pos += 1;
            }
            let text = input[start..pos].to_string();
            tokens.push(Token {
                kind: TokenKind::Ident,
                upper: text.to_ascii_uppercase(),
                text,
                position: start,
            });
            continue;
        }

        if ch.is_ascii_digit() {
            let start = pos;
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            // дробная часть
            if pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit() {
                pos += 2;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let text = input[start..pos].to_string();
            tokens.push(Token {
                kind: TokenKind::Number,
                upper: text.clone(),
                text,
                position: start,
            });
            continue;
        }

        if ch == b'\'' {
            let start = pos;
            pos += 1;
            let mut literal = String::new();
            let mut closed = false;
            while pos < bytes.len() {
                let curr = bytes[pos];
                pos += 1;
                if curr == b'\'' {
                    if pos < bytes.len() && bytes[pos] == b'\'' {
                        literal.push('\'');
                        pos += 1;
                    } else {
                        closed = true;
                        break;
                    }
                } else {
                    literal.push(curr as char);
                }
            }
            tokens.push(Token {
                kind: TokenKind::Str,
                upper: literal.clone(),
                text: literal,
                position: start,
            });
            if !closed {
                break;
            }
            continue;
        }

        // двухсимвольные операторы
        if pos + 1 < bytes.len() {
            let pair = &input[pos..pos + 2];
            if pair == "!=" || pair == "<>" || pair == "<=" || pair == ">=" {
                tokens.push(Token {
                    kind: TokenKind::Symbol,
                    text: pair.to_string(),
                    upper: pair.to_string(),
                    position: pos,
                });
                pos += 2;
                continue;
            }
        }

        let text = (ch as char).to_string();
        tokens.push(Token {
            kind: TokenKind::Symbol,
            upper: text.clone(),
            text,
            position: pos,
        });
        pos += 1;
    }

    tokens.push(Token::end(input.len()));
    tokens
}

/// Курсор по токенам с примитивами ожидания; общая основа обоих парсеров.
pub struct Cursor<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            tokens: tokenize(input),
            pos: 0,
        }
    }

    pub fn peek(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub fn syntax_error(&self, expected: &str) -> DbError {
        DbError::syntax_error(self.input, self.peek().position, expected)
    }

    pub fn match_symbol(&mut self, symbol: &str) -> bool {
        if self.peek().kind == TokenKind::Symbol && self.peek().text == symbol {
            self.pos += 1;
            return true;
        }
        false
    }

    pub fn expect_symbol(&mut self, symbol: &str) -> DbResult<()> {
        if self.match_symbol(symbol) {
            Ok(())
        } else {
            Err(self.syntax_error(&format!("'{}'", symbol)))
        }
    }

    pub fn match_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().kind == TokenKind::Ident && self.peek().upper == keyword {
            self.pos += 1;
            return true;
        }
        false
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> DbResult<()> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            Err(self.syntax_error(keyword))
        }
    }

    pub fn expect_identifier(&mut self, what: &str) -> DbResult<String> {
        if self.peek().kind == TokenKind::Ident {
            Ok(self.advance().text)
        } else {
            Err(self.syntax_error(what))
        }
    }

    /// Один необязательный `;` в конце.
    pub fn consume_semicolon(&mut self) {
        let _ = self.match_symbol(";");
    }

    pub fn expect_end(&mut self) -> DbResult<()> {
        if self.peek().kind == TokenKind::End {
            Ok(())
        } else {
            Err(self.syntax_error("end of statement"))
        }
    }
}
