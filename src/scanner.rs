//! On-demand tokenizer. The parser pulls one token at a time; nothing is
//! buffered and the source is never rescanned.

#[derive(Debug)]
pub struct Scanner<'a> {
    /// Remaining input from the start of the token being scanned.
    start: &'a str,
    /// Remaining input after everything consumed so far.
    current: &'a str,
    line: usize,
    finished: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Scanner<'a> {
        Scanner {
            start: source,
            current: source,
            line: 1,
            finished: false,
        }
    }

    /// Scans the next token. Once the input is exhausted every call returns
    /// an `Eof` token.
    pub fn token(&mut self) -> Token<'a> {
        use Kind::*;

        self.skip_trivia();
        self.start = self.current;

        let c = match self.advance() {
            Some(c) => c,
            None => return self.make(Eof),
        };

        if is_alpha(c) {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        let kind = match c {
            '(' => LeftParen,
            ')' => RightParen,
            '{' => LeftBrace,
            '}' => RightBrace,
            ';' => Semicolon,
            ',' => Comma,
            '.' => Dot,
            '-' => Minus,
            '+' => Plus,
            '/' => Slash,
            '*' => Star,
            '!' => self.either('=', BangEqual, Bang),
            '=' => self.either('=', EqualEqual, Equal),
            '<' => self.either('=', LessEqual, Less),
            '>' => self.either('=', GreaterEqual, Greater),
            '"' => return self.string(),
            _ => return self.error("Unexpected character."),
        };

        self.make(kind)
    }

    fn peek(&self) -> Option<char> {
        self.current.chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        self.current.chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let mut chars = self.current.chars();
        let c = chars.next();
        self.current = chars.as_str();
        c
    }

    fn either(&mut self, wanted: char, matched: Kind, otherwise: Kind) -> Kind {
        if self.peek() == Some(wanted) {
            self.advance();
            matched
        } else {
            otherwise
        }
    }

    /// Skips blanks, newlines and `//` comments, counting lines as it goes.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\r') | Some('\t') => {
                    self.advance();
                }
                Some('\n') => {
                    self.line += 1;
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    // leave the newline for the next iteration to count
                    while !matches!(self.peek(), Some('\n') | None) {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn string(&mut self) -> Token<'a> {
        loop {
            match self.advance() {
                Some('"') => return self.make(Kind::String),
                Some('\n') => self.line += 1,
                Some(_) => {}
                None => return self.error("Unterminated string."),
            }
        }
    }

    fn number(&mut self) -> Token<'a> {
        self.digits();

        let fraction = matches!(self.peek_next(), Some(c) if c.is_ascii_digit());
        if self.peek() == Some('.') && fraction {
            self.advance();
            self.digits();
        }

        self.make(Kind::Number)
    }

    fn digits(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn identifier(&mut self) -> Token<'a> {
        while matches!(self.peek(), Some(c) if is_alpha(c) || c.is_ascii_digit())
        {
            self.advance();
        }

        self.make(self.identifier_kind())
    }

    /// Keywords are told apart from identifiers by switching on the leading
    /// characters and comparing only the remainder.
    fn identifier_kind(&self) -> Kind {
        let lexeme = self.lexeme();
        let bytes = lexeme.as_bytes();

        match bytes[0] {
            b'a' => check_keyword(lexeme, 1, "nd", Kind::And),
            b'c' => check_keyword(lexeme, 1, "lass", Kind::Class),
            b'd' => check_keyword(lexeme, 1, "ef", Kind::Def),
            b'e' => check_keyword(lexeme, 1, "lse", Kind::Else),
            b'f' if bytes.len() > 1 => match bytes[1] {
                b'a' => check_keyword(lexeme, 2, "lse", Kind::False),
                b'o' => check_keyword(lexeme, 2, "r", Kind::For),
                b'u' => check_keyword(lexeme, 2, "n", Kind::Fun),
                _ => Kind::Identifier,
            },
            b'i' => check_keyword(lexeme, 1, "f", Kind::If),
            b'n' => check_keyword(lexeme, 1, "il", Kind::Nil),
            b'o' => check_keyword(lexeme, 1, "r", Kind::Or),
            b'p' if bytes.len() > 1 => match bytes[1] {
                b'a' => check_keyword(lexeme, 2, "rent", Kind::Parent),
                b'r' => check_keyword(lexeme, 2, "int", Kind::Print),
                _ => Kind::Identifier,
            },
            b'r' => check_keyword(lexeme, 1, "eturn", Kind::Return),
            b't' if bytes.len() > 1 => match bytes[1] {
                b'h' => check_keyword(lexeme, 2, "is", Kind::This),
                b'r' => check_keyword(lexeme, 2, "ue", Kind::True),
                _ => Kind::Identifier,
            },
            b'w' => check_keyword(lexeme, 1, "hile", Kind::While),
            _ => Kind::Identifier,
        }
    }

    fn lexeme(&self) -> &'a str {
        let length = self.start.len() - self.current.len();
        &self.start[..length]
    }

    /// Error tokens carry the message in place of a lexeme.
    fn error(&self, message: &'static str) -> Token<'a> {
        Token {
            kind: Kind::Error,
            lexeme: message,
            line: self.line,
        }
    }

    fn make(&self, kind: Kind) -> Token<'a> {
        Token {
            kind,
            lexeme: self.lexeme(),
            line: self.line,
        }
    }
}

/// Yields every token up to and including the first `Eof`.
impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.finished {
            return None;
        }

        let token = self.token();
        self.finished = token.kind == Kind::Eof;
        Some(token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub kind: Kind,
    pub lexeme: &'a str,
    pub line: usize,
}

impl<'a> Token<'a> {
    /// Placeholder used before the parser has read anything.
    pub const fn synthetic() -> Token<'a> {
        Token {
            kind: Kind::Error,
            lexeme: "<none>",
            line: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals.
    Identifier,
    String,
    Number,

    // Keywords.
    And,
    Class,
    Def,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Parent,
    Print,
    Return,
    This,
    True,
    While,

    Error,
    Eof,
}

// like char::is_ascii_alphabetic, plus '_'
fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn check_keyword(lexeme: &str, start: usize, rest: &str, kind: Kind) -> Kind {
    if lexeme.get(start..) == Some(rest) {
        kind
    } else {
        Kind::Identifier
    }
}
