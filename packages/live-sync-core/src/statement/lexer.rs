//! Statement lexer.
//!
//! Tokenizes statement text into tokens tagged with their byte offset.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Result, SyncError};

/// Token types
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    // Keywords
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    Join,
    Inner,
    Left,
    Outer,
    On,
    Order,
    By,
    Asc,
    Desc,
    Null,
    Is,
    In,
    Between,
    Like,
    True,
    False,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,

    /// Bare or quoted identifier
    Identifier(String),
    /// `'text'` literal
    String(String),
    Integer(i64),
    Float(f64),
    /// `@name` placeholder
    Param(String),
    /// `@@names` insert shorthand
    ParamNames,
    /// `@@values` insert shorthand
    ParamValues,

    // Punctuation and operators
    LeftParen,
    RightParen,
    Comma,
    Dot,
    Semicolon,
    Star,
    Plus,
    Minus,
    Slash,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    Eof,
}

impl Token {
    /// Returns true for reserved words; quoted identifiers never are.
    pub fn is_keyword(&self) -> bool {
        !matches!(
            self,
            Token::Identifier(_)
                | Token::String(_)
                | Token::Integer(_)
                | Token::Float(_)
                | Token::Param(_)
                | Token::ParamNames
                | Token::ParamValues
                | Token::LeftParen
                | Token::RightParen
                | Token::Comma
                | Token::Dot
                | Token::Semicolon
                | Token::Star
                | Token::Plus
                | Token::Minus
                | Token::Slash
                | Token::Equal
                | Token::NotEqual
                | Token::LessThan
                | Token::LessThanOrEqual
                | Token::GreaterThan
                | Token::GreaterThanOrEqual
                | Token::Eof
        )
    }
}

/// A token paired with the byte offset where it starts.
#[derive(Clone, Debug)]
pub struct SpannedToken {
    pub token: Token,
    pub offset: usize,
}

/// Statement lexer
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
            position: 0,
        }
    }

    /// Tokenizes the entire input. The last token is always `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let offset = self.position;
            let token = self.next_token()?;
            let is_eof = token == Token::Eof;
            tokens.push(SpannedToken { token, offset });
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let c = match self.peek() {
            None => return Ok(Token::Eof),
            Some(c) => c,
        };
        let single = |lexer: &mut Self, token: Token| {
            lexer.advance();
            Ok(token)
        };
        match c {
            '(' => single(self, Token::LeftParen),
            ')' => single(self, Token::RightParen),
            ',' => single(self, Token::Comma),
            '.' => single(self, Token::Dot),
            ';' => single(self, Token::Semicolon),
            '*' => single(self, Token::Star),
            '+' => single(self, Token::Plus),
            '-' => single(self, Token::Minus),
            '/' => single(self, Token::Slash),
            '=' => single(self, Token::Equal),
            '<' => {
                self.advance();
                match self.peek() {
                    Some('=') => single(self, Token::LessThanOrEqual),
                    Some('>') => single(self, Token::NotEqual),
                    _ => Ok(Token::LessThan),
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    single(self, Token::GreaterThanOrEqual)
                } else {
                    Ok(Token::GreaterThan)
                }
            }
            '!' => {
                let offset = self.position;
                self.advance();
                if self.peek() == Some('=') {
                    single(self, Token::NotEqual)
                } else {
                    Err(SyncError::syntax("unexpected character '!'", offset))
                }
            }
            '@' => self.scan_parameter(),
            '\'' => self.scan_string(),
            '"' => self.scan_quoted_identifier('"'),
            '`' => self.scan_quoted_identifier('`'),
            '[' => self.scan_quoted_identifier(']'),
            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.scan_word()),
            c => Err(SyncError::syntax(
                format!("unexpected character '{}'", c),
                self.position,
            )),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.input.next();
        if let Some(c) = ch {
            self.position += c.len_utf8();
        }
        ch
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('-') if self.lookahead(1) == Some('-') => {
                    while let Some(c) = self.advance() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.lookahead(1) == Some('*') => {
                    let offset = self.position;
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(SyncError::syntax("unterminated block comment", offset))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lookahead(&self, n: usize) -> Option<char> {
        self.input.clone().nth(n)
    }

    fn scan_string(&mut self) -> Result<Token> {
        let offset = self.position;
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('\'') => {
                    if self.peek() == Some('\'') {
                        self.advance();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some(c) => value.push(c),
                None => return Err(SyncError::syntax("unterminated string literal", offset)),
            }
        }
        Ok(Token::String(value))
    }

    fn scan_quoted_identifier(&mut self, close: char) -> Result<Token> {
        let offset = self.position;
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == close => break,
                Some(c) => value.push(c),
                None => return Err(SyncError::syntax("unterminated quoted identifier", offset)),
            }
        }
        if value.is_empty() {
            return Err(SyncError::syntax("empty quoted identifier", offset));
        }
        Ok(Token::Identifier(value))
    }

    fn scan_number(&mut self) -> Result<Token> {
        let offset = self.position;
        let mut value = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                value.push(c);
                self.advance();
            } else if c == '.' && !is_float && self.lookahead(1).is_some_and(|n| n.is_ascii_digit()) {
                is_float = true;
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if is_float {
            value
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| SyncError::syntax(format!("invalid number '{}'", value), offset))
        } else {
            value
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| SyncError::syntax(format!("invalid integer '{}'", value), offset))
        }
    }

    fn read_word(&mut self) -> String {
        let mut value = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }
        value
    }

    fn scan_word(&mut self) -> Token {
        let value = self.read_word();
        match value.to_ascii_uppercase().as_str() {
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "AS" => Token::As,
            "JOIN" => Token::Join,
            "INNER" => Token::Inner,
            "LEFT" => Token::Left,
            "OUTER" => Token::Outer,
            "ON" => Token::On,
            "ORDER" => Token::Order,
            "BY" => Token::By,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "NULL" => Token::Null,
            "IS" => Token::Is,
            "IN" => Token::In,
            "BETWEEN" => Token::Between,
            "LIKE" => Token::Like,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            "INSERT" => Token::Insert,
            "INTO" => Token::Into,
            "VALUES" => Token::Values,
            "UPDATE" => Token::Update,
            "SET" => Token::Set,
            "DELETE" => Token::Delete,
            "CREATE" => Token::Create,
            "TABLE" => Token::Table,
            _ => Token::Identifier(value),
        }
    }

    fn scan_parameter(&mut self) -> Result<Token> {
        let offset = self.position;
        self.advance();
        if self.peek() == Some('@') {
            self.advance();
            let word = self.read_word();
            return match word.to_ascii_lowercase().as_str() {
                "names" => Ok(Token::ParamNames),
                "values" => Ok(Token::ParamValues),
                _ => Err(SyncError::syntax(format!("unknown shorthand '@@{}'", word), offset)),
            };
        }
        let name = self.read_word();
        if name.is_empty() {
            return Err(SyncError::syntax("expected parameter name after '@'", offset));
        }
        Ok(Token::Param(name))
    }
}
