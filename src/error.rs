use std::fmt::{self, Display, Formatter};

/// Where in the source a compile error points.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// At the end of input.
    End,
    /// At a token, holding its lexeme.
    Lexeme(String),
    /// Scanner errors, whose message already describes the problem.
    Unknown,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Location::End => write!(f, " at end"),
            Location::Lexeme(lexeme) => write!(f, " at '{}'", lexeme),
            Location::Unknown => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[line {line}] Error{location}: {message}")]
pub struct Diagnostic {
    pub line: usize,
    pub location: Location,
    pub message: String,
}

/// Every diagnostic reported while compiling one source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", render(.diagnostics))]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(Diagnostic::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}\n[line {line}] in script")]
pub struct RuntimeError {
    pub message: String,
    pub line: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl InterpretError {
    /// Process exit status for a script that failed this way.
    pub fn exit_code(&self) -> i32 {
        match self {
            InterpretError::Compile(_) => 65,
            InterpretError::Runtime(_) => 70,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format() {
        let at_token = Diagnostic {
            line: 3,
            location: Location::Lexeme("=".into()),
            message: "Invalid assignment target.".into(),
        };
        let at_end = Diagnostic {
            line: 4,
            location: Location::End,
            message: "Expect expression.".into(),
        };

        assert_eq!(
            at_token.to_string(),
            "[line 3] Error at '=': Invalid assignment target."
        );
        assert_eq!(
            CompileError {
                diagnostics: vec![at_token, at_end]
            }
            .to_string(),
            "[line 3] Error at '=': Invalid assignment target.\n\
             [line 4] Error at end: Expect expression."
        );
    }

    #[test]
    fn exit_codes() {
        let runtime = InterpretError::from(RuntimeError {
            message: "Operand must be a number.".into(),
            line: 1,
        });
        let compile = InterpretError::from(CompileError {
            diagnostics: Vec::new(),
        });

        assert_eq!(runtime.exit_code(), 70);
        assert_eq!(compile.exit_code(), 65);
        assert_eq!(runtime.to_string(), "Operand must be a number.\n[line 1] in script");
    }
}
