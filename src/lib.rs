//! An in-process POSIX-shell interpreter library.
//!
//! Scripts are lexed, parsed into an AST, then interpreted against a
//! pluggable virtual [`fs::FileSystem`] and a byte-stream [`streams`]
//! capability set — no subprocesses, no real filesystem access unless a
//! host explicitly wires one up.

pub mod ast;
pub mod commands;
pub mod errors;
pub mod fs;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod shell;
pub mod streams;

pub use commands::{Command, CommandContext, CommandResult};
pub use errors::{LexError, ParseError};
pub use fs::{FileSystem, InMemoryFs};
pub use lexer::lex;
pub use parser::parse;
pub use shell::{ExecOptions, ExecResult, Interpolated, Shell, ShellError, ShellOptions};
