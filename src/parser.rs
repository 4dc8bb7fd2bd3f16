use crate::{
    error::{Diagnostic, Location},
    scanner::{Kind, Scanner, Token},
};

/// Token cursor plus error state for a single compile.
#[derive(Debug)]
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    pub current: Token<'a>,
    pub previous: Token<'a>,
    pub panic_mode: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(scanner: Scanner<'a>) -> Parser<'a> {
        Parser {
            scanner,
            current: Token::synthetic(),
            previous: Token::synthetic(),
            panic_mode: false,
            diagnostics: Vec::new(),
        }
    }

    /// Moves to the next non-error token, reporting any error tokens skipped.
    pub fn advance(&mut self) {
        self.previous = self.current;

        loop {
            self.current = self.scanner.token();

            if self.current.kind != Kind::Error {
                break;
            }

            self.error_at_current(self.current.lexeme);
        }
    }

    pub fn consume(&mut self, kind: Kind, message: &str) {
        if self.current.kind == kind {
            self.advance();
        } else {
            self.error_at_current(message)
        }
    }

    pub fn check(&self, kind: Kind) -> bool {
        self.current.kind == kind
    }

    pub fn matches(&mut self, kind: Kind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    pub fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message)
    }

    pub fn error(&mut self, message: &str) {
        self.error_at(self.previous, message)
    }

    fn error_at(&mut self, token: Token<'a>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;

        let location = match token.kind {
            Kind::Eof => Location::End,
            Kind::Error => Location::Unknown,
            _ => Location::Lexeme(token.lexeme.to_owned()),
        };

        let diagnostic = Diagnostic {
            line: token.line,
            location,
            message: message.to_owned(),
        };
        log::debug!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub fn had_error(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Leaves panic mode and skips ahead to something that looks like the
    /// start of a statement.
    pub fn synchronize(&mut self) {
        use Kind::*;

        self.panic_mode = false;

        while self.current.kind != Eof {
            if self.previous.kind == Semicolon {
                return;
            }

            match self.current.kind {
                Class | Fun | Def | For | If | While | Print | Return => return,
                _ => self.advance(),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum Precedence {
    None = 0,
    Assignment = 1,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    /// One level tighter; used for the right operand of left-associative
    /// binary operators.
    pub fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

/// Parse actions the compiler knows how to run for a token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParseFn {
    Grouping,
    Unary,
    Binary,
    Number,
    String,
    Literal,
    Variable,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule(pub Option<ParseFn>, pub Option<ParseFn>, pub Precedence);

impl Rule {
    pub fn prefix(&self) -> Option<ParseFn> {
        self.0
    }

    pub fn infix(&self) -> Option<ParseFn> {
        self.1
    }

    pub fn precedence(&self) -> Precedence {
        self.2
    }

    pub fn get(kind: Kind) -> Rule {
        use ParseFn as F;
        use Precedence as P;
        use std::option::Option::{None as N, Some as S};

        #[rustfmt::skip]
        let rule = match kind {
            Kind::LeftParen    => Rule(S(F::Grouping), N,              P::None),
            Kind::Minus        => Rule(S(F::Unary),    S(F::Binary),   P::Term),
            Kind::Plus         => Rule(N,              S(F::Binary),   P::Term),
            Kind::Slash        => Rule(N,              S(F::Binary),   P::Factor),
            Kind::Star         => Rule(N,              S(F::Binary),   P::Factor),
            Kind::Bang         => Rule(S(F::Unary),    N,              P::None),
            Kind::BangEqual    => Rule(N,              S(F::Binary),   P::Equality),
            Kind::EqualEqual   => Rule(N,              S(F::Binary),   P::Equality),
            Kind::Greater      => Rule(N,              S(F::Binary),   P::Comparison),
            Kind::GreaterEqual => Rule(N,              S(F::Binary),   P::Comparison),
            Kind::Less         => Rule(N,              S(F::Binary),   P::Comparison),
            Kind::LessEqual    => Rule(N,              S(F::Binary),   P::Comparison),
            Kind::Identifier   => Rule(S(F::Variable), N,              P::None),
            Kind::String       => Rule(S(F::String),   N,              P::None),
            Kind::Number       => Rule(S(F::Number),   N,              P::None),
            Kind::And          => Rule(N,              S(F::And),      P::And),
            Kind::Or           => Rule(N,              S(F::Or),       P::Or),
            Kind::False
            | Kind::Nil
            | Kind::True       => Rule(S(F::Literal),  N,              P::None),
            _                  => Rule(N,              N,              P::None),
        };

        rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(source: &str) -> Parser<'_> {
        let mut parser = Parser::new(Scanner::new(source));
        parser.advance();
        parser
    }

    #[test]
    fn error_tokens_are_reported_and_skipped() {
        let mut parser = parser("@ 1");

        assert_eq!(parser.current.kind, Kind::Number);
        assert!(parser.had_error());

        let diagnostics = parser.into_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].location, Location::Unknown);
        assert_eq!(diagnostics[0].message, "Unexpected character.");
    }

    #[test]
    fn panic_mode_suppresses_cascades() {
        let mut parser = parser("x");
        parser.error_at_current("first");
        parser.error_at_current("second");

        assert_eq!(parser.into_diagnostics().len(), 1);
    }

    #[test]
    fn synchronize_stops_at_statement_boundary() {
        let mut parser = parser("a b c ; d");
        parser.error_at_current("boom");
        parser.synchronize();

        assert!(!parser.panic_mode);
        assert_eq!(parser.current.lexeme, "d");

        let mut parser = self::parser("a b print 1;");
        parser.error_at_current("boom");
        parser.synchronize();
        assert_eq!(parser.current.kind, Kind::Print);
    }

    #[test]
    fn rule_table() {
        assert_eq!(
            Rule::get(Kind::Plus),
            Rule(None, Some(ParseFn::Binary), Precedence::Term)
        );
        assert_eq!(Rule::get(Kind::Minus).prefix(), Some(ParseFn::Unary));
        assert_eq!(Rule::get(Kind::Star).precedence(), Precedence::Factor);
        assert_eq!(Rule::get(Kind::Equal), Rule(None, None, Precedence::None));
        assert_eq!(Rule::get(Kind::Eof).prefix(), None);
        assert!(Precedence::Factor > Precedence::Term);
        assert_eq!(Precedence::Term.next(), Precedence::Factor);
    }
}
