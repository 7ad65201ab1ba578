use phf::{phf_map, Map};
use tracing::debug;

use crate::error::Error;
use crate::token::{Literal, Token, Type};

pub struct Scanner;

impl Scanner {
    const KEYWORDS: Map<&'static str, Type> = phf_map! {
        "and" => Type::And,
        "else" => Type::Else,
        "for" => Type::For,
        "if" => Type::If,
        "or" => Type::Or,
        "return" => Type::Return,
        "this" => Type::This,
        "var" => Type::Var,
        "class" => Type::Class,
        "false" => Type::False,
        "fun" => Type::Fun,
        "nil" => Type::Nil,
        "print" => Type::Print,
        "super" => Type::Super,
        "true" => Type::True,
        "while" => Type::While,
    };

    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Scanner
    }

    pub fn scan_tokens<'a, 'b>(&'a mut self, src: &'b str) -> TokenStream<'b> {
        TokenStream::new(src)
    }

    /// Scans the whole source eagerly, returning every token (always ending with `Eof`) along
    /// with the diagnostics that were reported on the way.
    pub fn scan(src: &str) -> (Vec<Token>, Vec<Error>) {
        let mut stream = TokenStream::new(src);
        let tokens = stream.by_ref().collect();
        (tokens, stream.errors)
    }
}

pub struct TokenStream<'a> {
    src: &'a str,
    line: usize,

    // `start` and `current` are byte offsets to the start and end of the token being scanned
    start: usize,
    current: usize,

    // This represents a token's index in the token stream
    index: usize,

    // This flag is set to `true` if the eof is reached and the eof token has been emitted.
    // This is required because the iterator needs to distinguish between when eof is reached but
    // the token is not emitted, and eof is reached and token has been emitted.
    eof: bool,

    // Malformed fragments are reported here and skipped, the stream keeps going after them
    errors: Vec<Error>,
}

impl<'a> TokenStream<'a> {
    pub fn new(src: &'a str) -> Self {
        TokenStream {
            src,
            line: 1,
            start: 0,
            current: 0,
            index: 0,
            eof: false,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    fn scan_token(&mut self) -> Result<Option<Token>, Error> {
        let c = self.advance();

        let token = match c {
            '(' => Some(self.make_token(Type::LeftParen)),
            ')' => Some(self.make_token(Type::RightParen)),
            '{' => Some(self.make_token(Type::LeftBrace)),
            '}' => Some(self.make_token(Type::RightBrace)),
            ',' => Some(self.make_token(Type::Comma)),
            '.' => Some(self.make_token(Type::Dot)),
            '-' => Some(self.make_token(Type::Minus)),
            '+' => Some(self.make_token(Type::Plus)),
            ';' => Some(self.make_token(Type::SemiColon)),
            '*' => Some(self.make_token(Type::Star)),

            '!' => Some(self.make_either('=', Type::BangEqual, Type::Bang)),
            '=' => Some(self.make_either('=', Type::EqualEqual, Type::Equal)),
            '<' => Some(self.make_either('=', Type::LessEqual, Type::Less)),
            '>' => Some(self.make_either('=', Type::GreaterEqual, Type::Greater)),

            '/' => {
                if self.match_char('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                    None
                } else if self.match_char('*') {
                    self.block_comment()?;
                    None
                } else {
                    Some(self.make_token(Type::Slash))
                }
            }

            '"' => Some(self.string()?),

            // White spaces, do nothing
            ' ' | '\t' | '\r' => None,

            // Increment for new line
            '\n' => {
                self.line += 1;
                None
            }

            _ => {
                if c.is_ascii_digit() {
                    Some(self.number())
                } else if c.is_alphabetic() {
                    Some(self.identifier())
                } else {
                    return Err(Error::UnexpectedCharacter {
                        ch: c,
                        line: self.line,
                    });
                }
            }
        };

        Ok(token)
    }

    fn block_comment(&mut self) -> Result<(), Error> {
        while !self.is_at_end() {
            // `advance()` doesn't track lines, multi-line comments have to do it themselves
            let now = self.advance();
            if now == '\n' {
                self.line += 1;
            } else if now == '*' && self.peek() == '/' {
                self.advance();
                return Ok(());
            }
        }

        Err(Error::UnterminatedBlockComment { line: self.line })
    }

    fn string(&mut self) -> Result<Token, Error> {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }

            self.advance();
        }

        if self.is_at_end() {
            return Err(Error::UnterminatedString { line: self.line });
        }

        // consume the closing "
        self.advance();
        let content = &self.src[self.start + 1..self.current - 1];
        Ok(self.make_token_with_val(Type::String, Literal::from(content)))
    }

    fn number(&mut self) -> Token {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A trailing '.' is left alone so `1.` scans as a number followed by a dot
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        // Digits with an optional fraction always make a valid f64
        let num = self.src[self.start..self.current]
            .parse::<f64>()
            .unwrap_or_default();
        self.make_token_with_val(Type::Number, Literal::Num(num))
    }

    fn identifier(&mut self) -> Token {
        while self.peek().is_alphanumeric() {
            self.advance();
        }

        let text = &self.src[self.start..self.current];

        match Scanner::KEYWORDS.get(text) {
            None => self.make_token(Type::Identifier),
            Some(Type::True) => self.make_token_with_val(Type::True, Literal::Bool(true)),
            Some(Type::False) => self.make_token_with_val(Type::False, Literal::Bool(false)),
            Some(keyword) => self.make_token(*keyword),
        }
    }

    fn current(&self) -> char {
        self.src[self.current..].chars().next().unwrap_or('\0')
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.current()
        }
    }

    fn peek_next(&self) -> char {
        let mut chars = self.src[self.current..].chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let res = self.current();
        self.current += res.len_utf8();
        res
    }

    fn match_char(&mut self, c: char) -> bool {
        if self.is_at_end() || self.current() != c {
            false
        } else {
            self.current += c.len_utf8();
            true
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.src.len()
    }

    fn make_either(&mut self, expected: char, matched: Type, otherwise: Type) -> Token {
        if self.match_char(expected) {
            self.make_token(matched)
        } else {
            self.make_token(otherwise)
        }
    }

    fn make_token(&mut self, ty: Type) -> Token {
        self.make_token_with_val(ty, Literal::Nil)
    }

    fn make_token_with_val(&mut self, ty: Type, val: Literal) -> Token {
        let lexeme = match ty {
            Type::Eof => String::new(),
            _ => String::from(&self.src[self.start..self.current]),
        };

        let token = Token::new(ty, lexeme, self.line, self.start, self.index, val);
        self.index += 1;
        token
    }
}

impl<'a> Iterator for TokenStream<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof {
            return None;
        }

        while !self.is_at_end() {
            self.start = self.current;

            match self.scan_token() {
                Ok(None) => continue,
                Ok(Some(token)) => return Some(token),
                Err(err) => {
                    debug!(line = err.line(), "scanner error: {}", err);
                    self.errors.push(err);
                }
            }
        }

        self.start = self.current;
        self.eof = true;
        Some(self.make_token(Type::Eof))
    }
}
