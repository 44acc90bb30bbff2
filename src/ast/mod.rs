//! Abstract syntax: lexer tokens and the parser's output tree.
//!
//! Tokens and AST nodes are produced by the lexer/parser, consumed by the
//! interpreter, then discarded — immutable after creation. `Substitution`
//! nodes hold a fully parsed, owned sub-`AstNode`; there are no cycles, so
//! a sum-type-plus-`Box` layout (rather than an arena) is sufficient here.

mod arith;
mod node;
mod token;

pub use arith::{ArithBinOp, ArithExpr, ArithUnOp};
pub use node::{AstNode, Redirect, RedirectTarget, WordNode};
pub use token::{DoubleQuotedPart, Position, RedirectMode, Token};
