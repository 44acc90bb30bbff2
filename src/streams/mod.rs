//! Byte-stream primitives
//!
//! Stdin/Stdout/Stderr are modeled as a small capability set rather than a
//! class hierarchy: read-bytes, read-text, read-line-iterator,
//! write-bytes, write-text, `is_tty`. Pipes, collectors, and static buffers
//! all implement the same capabilities, so the interpreter never has to
//! know which concrete backing a command's streams have.

mod pipe;
mod sink;
mod source;

pub use pipe::{pipe, PipeReader, PipeWriter, PIPE_HIGH_WATER_MARK};
pub use sink::{OutputCollector, Sink, Stderr, Stdout};
pub use source::Stdin;
