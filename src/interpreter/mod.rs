//! The interpreter: an AST walker over cooperatively-concurrent `tokio`
//! tasks, built around the streaming `Command` contract with genuine
//! pipeline concurrency rather than a synchronous walk.

mod engine;
mod errors;
mod expansion;
mod types;

pub use engine::Engine;
pub use errors::InterpreterError;
pub use expansion::ExpansionError;
pub use types::{ExecutionContext, ExecutionLimits, LoopSignal};
