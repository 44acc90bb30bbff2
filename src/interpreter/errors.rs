//! Interpreter-internal error type. Only the `ExecutionLimit` variant
//! ever escapes [`crate::Shell::exec`]; everything else is resolved into
//! an exit code and stderr text before the façade returns — most errors
//! are locally reported and exit-coded, not thrown.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum InterpreterError {
    /// A defensive limit (`ExecutionLimits`) was exceeded — the one case
    /// the façade still treats as an abort rather than a reported exit
    /// code, since it indicates a runaway script rather than a normal
    /// command failure.
    #[error("{message}")]
    ExecutionLimit { message: String },
}
