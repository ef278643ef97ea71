//! Script errors with source positions.

use std::fmt;

/// Line/column position in a script (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Phase in which a script failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// Text that is not a token
    Lex,
    /// Tokens that do not form a program
    Parse,
    /// A well-formed program that failed while running
    Eval,
}

/// Failure to lex, parse, or evaluate a parameter script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub pos: Pos,
    pub message: String,
}

impl ScriptError {
    pub fn lex(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            kind: ScriptErrorKind::Lex,
            pos,
            message: message.into(),
        }
    }

    pub fn parse(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            kind: ScriptErrorKind::Parse,
            pos,
            message: message.into(),
        }
    }

    pub fn eval(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            kind: ScriptErrorKind::Eval,
            pos,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

impl std::error::Error for ScriptError {}
