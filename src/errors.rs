//! Lex/parse error types.
//!
//! Each layer boundary gets its own small, `Display`-able enum (see also
//! `fs::types::FsError`) rather than a stringly-typed error.

use thiserror::Error;

use crate::ast::Position;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unterminated single quote at line {line}, column {column}")]
    UnterminatedSingleQuote { line: usize, column: usize },

    #[error("unterminated double quote at line {line}, column {column}")]
    UnterminatedDoubleQuote { line: usize, column: usize },

    #[error("unterminated `$(' at line {line}, column {column}")]
    UnterminatedSubstitution { line: usize, column: usize },

    #[error("unterminated `${{' at line {line}, column {column}")]
    UnterminatedVariableBrace { line: usize, column: usize },

    #[error("unterminated `$((' at line {line}, column {column}")]
    UnterminatedArithmetic { line: usize, column: usize },

    #[error("unexpected end of file looking for matching `{delimiter}'")]
    UnterminatedHeredoc { delimiter: String },

    #[error("unexpected character {character:?} at line {line}, column {column}")]
    UnexpectedCharacter { character: char, line: usize, column: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("syntax error near {found:?} at line {}, column {}", position.line, position.column)]
pub struct ParseError {
    pub found: String,
    pub position: Position,
}

impl ParseError {
    pub fn new(found: impl Into<String>, position: Position) -> Self {
        Self { found: found.into(), position }
    }
}
